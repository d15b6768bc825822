use crate::{
    lexicon::{KeywordLexicon, LexiconMatches, BUILTIN_LEXICON},
    types::{AnalysisRequest, Recommendation, Verdict, MAX_OBSERVATIONS},
};

/// Neutral starting score before term weights are applied.
const BASE_SCORE: i32 = 50;

const SUSTAINABLE_MATERIAL_TRIGGERS: &[&str] = &["bamboo", "hemp", "cork", "organic", "recycled"];
const SUSTAINABLE_MATERIALS: &[&str] = &[
    "bamboo", "hemp", "cork", "organic", "recycled", "cotton", "linen", "wool",
];
const CONCERNING_MATERIAL_TRIGGERS: &[&str] = &["plastic", "synthetic", "polyester", "nylon", "pvc"];
const CONCERNING_MATERIALS: &[&str] = &["plastic", "synthetic", "polyester", "nylon", "pvc", "vinyl"];
const REUSE_TERMS: &[&str] = &["reusable", "refillable"];
const SINGLE_USE_TERMS: &[&str] = &["disposable", "single-use"];
const CERTIFICATION_TERMS: &[&str] = &["certified", "fair-trade", "b-corp"];
const END_OF_LIFE_TERMS: &[&str] = &["biodegradable", "compostable"];

/// Deterministic lexical scorer.
///
/// Holds no mutable state; the same text always yields the same verdict, so a
/// single scorer can be shared freely between threads.
#[derive(Clone, Copy, Debug)]
pub struct KeywordScorer<'a> {
    lexicon: &'a KeywordLexicon,
}

impl Default for KeywordScorer<'static> {
    fn default() -> Self {
        Self::new(&BUILTIN_LEXICON)
    }
}

impl<'a> KeywordScorer<'a> {
    pub fn new(lexicon: &'a KeywordLexicon) -> Self {
        Self { lexicon }
    }

    /// Scores every text field of the request.
    pub fn score(&self, request: &AnalysisRequest) -> Verdict {
        self.score_text(&request.searchable_text())
    }

    /// Scores arbitrary product text.
    pub fn score_text(&self, text: &str) -> Verdict {
        let text = text.to_lowercase();
        let matches = self.lexicon.matches(&text);
        let score = (BASE_SCORE + matches.total_weight).clamp(0, 100) as u8;

        let mut positives = positive_observations(&matches);
        let mut negatives = negative_observations(&matches);
        if positives.is_empty() {
            positives.push(if score < 50 {
                "Limited sustainability info available".to_string()
            } else {
                "Shows some sustainable attributes".to_string()
            });
        }
        if negatives.is_empty() {
            negatives.push(if score >= 50 {
                "Verify brand practices".to_string()
            } else {
                "Consider eco-friendly alternatives".to_string()
            });
        }
        positives.truncate(MAX_OBSERVATIONS);
        negatives.truncate(MAX_OBSERVATIONS);

        Verdict {
            score,
            positives,
            negatives,
            recommendation: Recommendation::for_keyword_score(score),
        }
    }
}

fn positive_observations(matches: &LexiconMatches<'_>) -> Vec<String> {
    let mut observations = Vec::new();
    if any_positive(matches, SUSTAINABLE_MATERIAL_TRIGGERS) {
        let materials = listed(&matches.positive, SUSTAINABLE_MATERIALS);
        observations.push(format!(
            "Made with sustainable materials: {}",
            materials.join(", ")
        ));
    }
    if any_positive(matches, REUSE_TERMS) {
        observations.push("Designed for long-term reuse".to_string());
    }
    if any_positive(matches, CERTIFICATION_TERMS) {
        observations.push("Has sustainability certifications".to_string());
    }
    if any_positive(matches, END_OF_LIFE_TERMS) {
        observations.push("Biodegradable/compostable end-of-life".to_string());
    }
    observations
}

fn negative_observations(matches: &LexiconMatches<'_>) -> Vec<String> {
    let mut observations = Vec::new();
    if any_negative(matches, CONCERNING_MATERIAL_TRIGGERS) {
        let materials = listed(&matches.negative, CONCERNING_MATERIALS);
        observations.push(format!(
            "Contains concerning materials: {}",
            materials.join(", ")
        ));
    }
    if any_negative(matches, SINGLE_USE_TERMS) {
        observations.push("Single-use design increases waste".to_string());
    }
    observations
}

fn any_positive(matches: &LexiconMatches<'_>, terms: &[&str]) -> bool {
    terms.iter().any(|term| matches.has_positive(term))
}

fn any_negative(matches: &LexiconMatches<'_>, terms: &[&str]) -> bool {
    terms.iter().any(|term| matches.has_negative(term))
}

/// Matched terms belonging to `group`, in match order, at most three.
fn listed<'m>(found: &[&'m str], group: &[&str]) -> Vec<&'m str> {
    found
        .iter()
        .copied()
        .filter(|term| group.contains(term))
        .take(MAX_OBSERVATIONS)
        .collect()
}
