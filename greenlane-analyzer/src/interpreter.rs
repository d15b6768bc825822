//! Recovers a structured verdict from generated text.
//!
//! Generated text is handed to an ordered chain of strategies. The first two
//! look for a JSON record carrying a score; the last one reads free-form prose
//! and never fails, so interpretation always ends with a verdict.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::types::{
    truncate_chars, InterpretedResult, Recommendation, Verdict, MAX_OBSERVATIONS,
    OBSERVATION_PREVIEW_CHARS,
};

/// Length of the generated-text excerpt kept for provenance.
const EXCERPT_CHARS: usize = 200;

/// Number of leading sentences inspected for observations.
const SENTENCES_INSPECTED: usize = 6;

/// Sentences of this many characters or fewer are ignored.
const MIN_SENTENCE_CHARS: usize = 10;

const POSITIVE_PLACEHOLDER: &str = "Analyzed by Llama 3.2 on-device";
const NEGATIVE_PLACEHOLDER: &str = "Further research recommended";

const POSITIVE_SIGNALS: &[&str] = &[
    "sustainable",
    "organic",
    "eco-friendly",
    "recyclable",
    "renewable",
    "biodegradable",
    "natural",
    "ethical",
    "fair trade",
    "great",
    "excellent",
    "environmentally friendly",
    "durable",
    "compostable",
    "certified",
    "responsible",
    "green",
    "clean",
    "safe",
    "good choice",
];

const NEGATIVE_SIGNALS: &[&str] = &[
    "plastic",
    "toxic",
    "harmful",
    "pollut",
    "waste",
    "chemical",
    "synthetic",
    "non-recyclable",
    "disposable",
    "cheap",
    "poor",
    "unsustainable",
    "bad",
    "concern",
    "problem",
    "damage",
    "non-renewable",
    "petroleum",
    "not recyclable",
    "not biodegradable",
];

static FRACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)\s*(?:out of|/)\s*([0-9]+)").expect("valid regex"));

static FRAGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]+\}").expect("valid regex"));

/// One way of turning generated text into a verdict.
pub trait InterpretationStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns a verdict if this strategy recognises the text.
    fn attempt(&self, text: &str) -> Option<InterpretedResult>;
}

/// The outcome of running the chain: a verdict and the strategy that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interpretation {
    pub result: InterpretedResult,
    pub strategy: &'static str,
}

/// Ordered strategy chain with an infallible free-text tail.
pub struct ResponseInterpreter {
    strategies: Vec<Box<dyn InterpretationStrategy>>,
    fallback: FreeTextHeuristic,
}

impl Default for ResponseInterpreter {
    fn default() -> Self {
        Self::new(vec![Box::new(StrictStructured), Box::new(EmbeddedFragment)])
    }
}

impl ResponseInterpreter {
    /// Builds a chain trying `strategies` in order before falling back to free text.
    pub fn new(strategies: Vec<Box<dyn InterpretationStrategy>>) -> Self {
        Self {
            strategies,
            fallback: FreeTextHeuristic,
        }
    }

    pub fn interpret(&self, text: &str) -> Interpretation {
        for strategy in &self.strategies {
            if let Some(result) = strategy.attempt(text) {
                return Interpretation {
                    result,
                    strategy: strategy.name(),
                };
            }
        }
        Interpretation {
            result: self.fallback.extract(text),
            strategy: self.fallback.name(),
        }
    }
}

/// The whole trimmed text is a JSON record with a score field.
pub struct StrictStructured;

impl InterpretationStrategy for StrictStructured {
    fn name(&self) -> &'static str {
        "strict-structured"
    }

    fn attempt(&self, text: &str) -> Option<InterpretedResult> {
        parse_structured(text.trim(), text)
    }
}

/// The first brace-delimited fragment inside the text is such a record.
pub struct EmbeddedFragment;

impl InterpretationStrategy for EmbeddedFragment {
    fn name(&self) -> &'static str {
        "embedded-fragment"
    }

    fn attempt(&self, text: &str) -> Option<InterpretedResult> {
        let fragment = FRAGMENT_RE.find(text)?;
        parse_structured(fragment.as_str(), text)
    }
}

/// Lexical extraction from free-form prose.
pub struct FreeTextHeuristic;

impl InterpretationStrategy for FreeTextHeuristic {
    fn name(&self) -> &'static str {
        "free-text"
    }

    fn attempt(&self, text: &str) -> Option<InterpretedResult> {
        Some(self.extract(text))
    }
}

impl FreeTextHeuristic {
    pub fn extract(&self, text: &str) -> InterpretedResult {
        let lower = text.to_lowercase();
        let score = fraction_score(&lower).unwrap_or_else(|| signal_score(&lower));

        let mut positives = Vec::new();
        let mut negatives = Vec::new();
        let sentences = text
            .split(['.', '!', '?', '\n'])
            .map(str::trim)
            .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
            .take(SENTENCES_INSPECTED);
        for sentence in sentences {
            let sentence_lower = sentence.to_lowercase();
            // A sentence mentioning any concern counts as a negative even if it also praises
            if contains_any(&sentence_lower, NEGATIVE_SIGNALS) {
                negatives.push(truncate_chars(sentence, OBSERVATION_PREVIEW_CHARS));
            } else if contains_any(&sentence_lower, POSITIVE_SIGNALS) {
                positives.push(truncate_chars(sentence, OBSERVATION_PREVIEW_CHARS));
            }
        }

        InterpretedResult {
            verdict: finish_verdict(score, positives, negatives),
            excerpt: Some(truncate_chars(text, EXCERPT_CHARS)),
        }
    }
}

/// `<n> out of <d>` or `<n>/<d>`, scaled to a percentage and clamped to `[5, 95]`.
fn fraction_score(lower: &str) -> Option<u8> {
    let captures = FRACTION_RE.captures(lower)?;
    let numerator: f64 = captures[1].parse().ok()?;
    let denominator: f64 = captures[2].parse().ok()?;
    if denominator == 0.0 {
        return None;
    }
    Some((100.0 * numerator / denominator).round().clamp(5.0, 95.0) as u8)
}

/// `50 + 8·positives − 10·negatives`, clamped to `[15, 95]`.
fn signal_score(lower: &str) -> u8 {
    let positives = count_present(lower, POSITIVE_SIGNALS);
    let negatives = count_present(lower, NEGATIVE_SIGNALS);
    (50 + 8 * positives - 10 * negatives).clamp(15, 95) as u8
}

fn count_present(text: &str, signals: &[&str]) -> i64 {
    signals.iter().filter(|s| text.contains(*s)).count() as i64
}

fn contains_any(text: &str, signals: &[&str]) -> bool {
    signals.iter().any(|s| text.contains(s))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuredResponse {
    #[serde(alias = "score")]
    green_score: serde_json::Number,
    #[serde(default)]
    positives: Value,
    #[serde(default)]
    negatives: Value,
}

fn parse_structured(candidate: &str, original: &str) -> Option<InterpretedResult> {
    let response: StructuredResponse = serde_json::from_str(candidate).ok()?;
    let score = response.green_score.as_f64()?;
    if !score.is_finite() {
        return None;
    }
    let score = score.round().clamp(0.0, 100.0) as u8;
    Some(InterpretedResult {
        verdict: finish_verdict(
            score,
            observations(&response.positives),
            observations(&response.negatives),
        ),
        excerpt: Some(truncate_chars(original, EXCERPT_CHARS)),
    })
}

/// Non-blank strings from a JSON string or array of strings.
fn observations(value: &Value) -> Vec<String> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::String(_) => vec![value],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(s, OBSERVATION_PREVIEW_CHARS))
        .collect()
}

fn finish_verdict(score: u8, mut positives: Vec<String>, mut negatives: Vec<String>) -> Verdict {
    if positives.is_empty() {
        positives.push(POSITIVE_PLACEHOLDER.to_string());
    }
    if negatives.is_empty() {
        negatives.push(NEGATIVE_PLACEHOLDER.to_string());
    }
    positives.truncate(MAX_OBSERVATIONS);
    negatives.truncate(MAX_OBSERVATIONS);
    Verdict {
        score,
        positives,
        negatives,
        recommendation: Recommendation::for_generated_score(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpret(text: &str) -> Interpretation {
        ResponseInterpreter::default().interpret(text)
    }

    #[test]
    fn test_strict_json_is_parsed_by_first_tier() {
        let text = r#"  {"greenScore": 72, "positives": ["Uses bamboo"], "negatives": ["Ships far", "Plastic cap"], "recommendation": "Buy it"}  "#;
        let interpretation = interpret(text);
        assert_eq!(interpretation.strategy, "strict-structured");
        let verdict = interpretation.result.verdict;
        assert_eq!(verdict.score, 72);
        assert_eq!(verdict.positives, vec!["Uses bamboo"]);
        assert_eq!(verdict.negatives, vec!["Ships far", "Plastic cap"]);
        assert_eq!(verdict.recommendation, Recommendation::GeneratedGood);
    }

    #[test]
    fn test_strict_json_without_score_falls_through() {
        let interpretation = interpret(r#"{"positives": ["great"]}"#);
        assert_ne!(interpretation.strategy, "strict-structured");
        assert_ne!(interpretation.strategy, "embedded-fragment");
    }

    #[test]
    fn test_score_alias_and_clamping() {
        let interpretation = interpret(r#"{"score": 140.4}"#);
        assert_eq!(interpretation.strategy, "strict-structured");
        let verdict = interpretation.result.verdict;
        assert_eq!(verdict.score, 100);
        assert_eq!(verdict.positives, vec![POSITIVE_PLACEHOLDER]);
        assert_eq!(verdict.negatives, vec![NEGATIVE_PLACEHOLDER]);
    }

    #[test]
    fn test_embedded_fragment_is_found() {
        let text = "Sure! Here is the analysis: {\"greenScore\": 41, \"negatives\": \"Vinyl coating\"} Hope it helps.";
        let interpretation = interpret(text);
        assert_eq!(interpretation.strategy, "embedded-fragment");
        let verdict = interpretation.result.verdict;
        assert_eq!(verdict.score, 41);
        assert_eq!(verdict.negatives, vec!["Vinyl coating"]);
        assert_eq!(verdict.recommendation, Recommendation::GeneratedLow);
    }

    #[test]
    fn test_structured_lists_are_capped() {
        let text = r#"{"greenScore": 50, "positives": ["a1", "", "a2", "a3", "a4"], "negatives": [1, "b1"]}"#;
        let verdict = interpret(text).result.verdict;
        assert_eq!(verdict.positives, vec!["a1", "a2", "a3"]);
        assert_eq!(verdict.negatives, vec!["b1"]);
    }

    #[test]
    fn test_out_of_fraction() {
        let interpretation = interpret(" 8 out of 10 for sustainability");
        assert_eq!(interpretation.strategy, "free-text");
        assert_eq!(interpretation.result.verdict.score, 80);
    }

    #[test]
    fn test_slash_fraction_rounds() {
        assert_eq!(fraction_score("rated 2/3 overall"), Some(67));
    }

    #[test]
    fn test_zero_fraction_clamps_to_minimum() {
        let verdict = interpret("0 out of 10, avoid").result.verdict;
        assert_eq!(verdict.score, 5);
        assert_eq!(verdict.recommendation, Recommendation::GeneratedPoor);
    }

    #[test]
    fn test_fraction_requires_ascii_digits() {
        assert_eq!(fraction_score("rated ٨/١٠"), None);
        assert_eq!(fraction_score("٨/١٠, or 3 out of 4"), Some(75));
    }

    #[test]
    fn test_full_fraction_clamps_to_maximum() {
        assert_eq!(fraction_score("10 out of 10"), Some(95));
    }

    #[test]
    fn test_zero_denominator_uses_signal_counts() {
        // "great" and "safe" are positive signals
        let verdict = interpret("5/0 great and safe").result.verdict;
        assert_eq!(verdict.score, 66);
    }

    #[test]
    fn test_signal_counting() {
        assert_eq!(signal_score("a plain sentence"), 50);
        assert_eq!(signal_score("organic, natural and durable"), 74);
        assert_eq!(
            signal_score("plastic toxic harmful waste chemical synthetic"),
            15
        );
        assert_eq!(
            signal_score(
                "sustainable organic eco-friendly recyclable renewable biodegradable natural"
            ),
            95
        );
    }

    #[test]
    fn test_sentence_classification() {
        let text = "This bottle is made of sustainable bamboo fibres.\n\
                    However the lid uses plastic and is sustainable only in part.\n\
                    Short one.\n\
                    Packaging is fully compostable and certified.";
        let verdict = interpret(text).result.verdict;
        assert_eq!(
            verdict.positives,
            vec![
                "This bottle is made of sustainable bamboo fibres",
                "Packaging is fully compostable and certified"
            ]
        );
        assert_eq!(
            verdict.negatives,
            vec!["However the lid uses plastic and is sustainable only in part"]
        );
    }

    #[test]
    fn test_only_first_six_sentences_are_inspected() {
        let mut text = String::new();
        for _ in 0..6 {
            text.push_str("Nothing remarkable here at all. ");
        }
        text.push_str("This is a very sustainable product.");
        let verdict = interpret(&text).result.verdict;
        assert_eq!(verdict.positives, vec![POSITIVE_PLACEHOLDER]);
    }

    #[test]
    fn test_sentences_are_truncated() {
        let long = format!("Sustainable {}", "x".repeat(200));
        let verdict = interpret(&long).result.verdict;
        assert_eq!(verdict.positives[0].chars().count(), OBSERVATION_PREVIEW_CHARS);
    }

    #[test]
    fn test_free_text_always_produces_bounded_result() {
        for text in ["", "   ", "{", "}{", "{not json}", "no signals here whatsoever"] {
            let result = interpret(text).result;
            assert!(result.verdict.score <= 100);
            assert!((1..=3).contains(&result.verdict.positives.len()));
            assert!((1..=3).contains(&result.verdict.negatives.len()));
        }
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let text = "a".repeat(500);
        let result = interpret(&text).result;
        assert_eq!(result.excerpt.map(|e| e.len()), Some(EXCERPT_CHARS));
    }
}
