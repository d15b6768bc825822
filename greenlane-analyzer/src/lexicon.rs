use std::sync::LazyLock;

/// Terms signalling a more sustainable product, with their score contribution.
const POSITIVE_TERMS: &[(&str, i32)] = &[
    ("bamboo", 20),
    ("organic", 15),
    ("recycled", 15),
    ("sustainable", 15),
    ("eco-friendly", 15),
    ("biodegradable", 18),
    ("compostable", 18),
    ("reusable", 12),
    ("solar", 15),
    ("renewable", 15),
    ("fair-trade", 12),
    ("vegan", 10),
    ("natural", 8),
    ("hemp", 15),
    ("cork", 12),
    ("linen", 10),
    ("cotton", 5),
    ("wool", 5),
    ("certified", 10),
    ("b-corp", 12),
    ("carbon-neutral", 18),
    ("zero-waste", 15),
    ("upcycled", 12),
    ("plant-based", 12),
    ("cruelty-free", 10),
    ("ethical", 10),
    ("handmade", 8),
    ("local", 8),
    ("durable", 10),
    ("refillable", 12),
];

/// Terms signalling a less sustainable product, with their score contribution.
const NEGATIVE_TERMS: &[(&str, i32)] = &[
    ("plastic", -15),
    ("synthetic", -12),
    ("disposable", -18),
    ("single-use", -20),
    ("petroleum", -15),
    ("chemical", -10),
    ("toxic", -18),
    ("non-recyclable", -15),
    ("polyester", -10),
    ("nylon", -8),
    ("acrylic", -10),
    ("pvc", -15),
    ("vinyl", -12),
    ("styrofoam", -20),
    ("fast-fashion", -15),
    ("cheap", -5),
    ("mass-produced", -8),
    ("imported", -3),
    ("bleached", -8),
];

/// The built-in lexicon, built on first use and shared read-only afterwards.
pub static BUILTIN_LEXICON: LazyLock<KeywordLexicon> = LazyLock::new(KeywordLexicon::builtin);

/// Static term to weight table driving the keyword scorer.
///
/// Terms are stored lowercase and kept in insertion order, which is the order
/// matched terms are reported in.
#[derive(Clone, Debug)]
pub struct KeywordLexicon {
    positive: Vec<(String, i32)>,
    negative: Vec<(String, i32)>,
}

/// Lexicon terms found in a piece of text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LexiconMatches<'a> {
    pub positive: Vec<&'a str>,
    pub negative: Vec<&'a str>,
    /// Sum of the weights of every matched term
    pub total_weight: i32,
}

impl LexiconMatches<'_> {
    pub fn has_positive(&self, term: &str) -> bool {
        self.positive.contains(&term)
    }

    pub fn has_negative(&self, term: &str) -> bool {
        self.negative.contains(&term)
    }
}

impl KeywordLexicon {
    pub fn builtin() -> Self {
        Self::new(POSITIVE_TERMS.iter().copied(), NEGATIVE_TERMS.iter().copied())
    }

    /// Builds a lexicon from positive and negative term lists. Terms are lowercased.
    pub fn new<'a>(
        positive: impl IntoIterator<Item = (&'a str, i32)>,
        negative: impl IntoIterator<Item = (&'a str, i32)>,
    ) -> Self {
        let lower = |(term, weight): (&str, i32)| (term.to_lowercase(), weight);
        Self {
            positive: positive.into_iter().map(lower).collect(),
            negative: negative.into_iter().map(lower).collect(),
        }
    }

    pub fn weight(&self, term: &str) -> Option<i32> {
        self.positive
            .iter()
            .chain(self.negative.iter())
            .find(|(t, _)| t == term)
            .map(|(_, w)| *w)
    }

    pub fn len(&self) -> usize {
        self.positive.len() + self.negative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds every term occurring as a substring of `text`, which must already be lowercase.
    pub fn matches(&self, text: &str) -> LexiconMatches<'_> {
        let mut matches = LexiconMatches::default();
        for (term, weight) in &self.positive {
            if text.contains(term.as_str()) {
                matches.positive.push(term.as_str());
                matches.total_weight += weight;
            }
        }
        for (term, weight) in &self.negative {
            if text.contains(term.as_str()) {
                matches.negative.push(term.as_str());
                matches.total_weight += weight;
            }
        }
        matches
    }
}
