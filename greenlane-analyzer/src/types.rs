use serde::{Serialize, Serializer};
use thiserror::Error;
use utoipa::ToSchema;

/// Maximum number of positive or negative observations carried by a verdict.
pub const MAX_OBSERVATIONS: usize = 3;

/// Maximum length, in characters, of a single observation.
pub const OBSERVATION_PREVIEW_CHARS: usize = 80;

/// A validated product description submitted for analysis.
///
/// The only way to build one is through [`AnalysisRequest::new`], which rejects
/// blank titles, so every instance handed to the analyzer carries a usable title.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisRequest {
    title: String,
    brand: String,
    materials: String,
    description: String,
}

impl AnalysisRequest {
    /// Creates a request for the given product title.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingTitle`] if the title is empty or whitespace only.
    pub fn new(title: impl Into<String>) -> Result<Self, ValidationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        Ok(Self {
            title,
            brand: String::new(),
            materials: String::new(),
            description: String::new(),
        })
    }

    #[must_use]
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = brand.into();
        self
    }

    #[must_use]
    pub fn with_materials(mut self, materials: impl Into<String>) -> Self {
        self.materials = materials.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn materials(&self) -> &str {
        &self.materials
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// All product fields joined by single spaces and lowercased.
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.title, self.brand, self.materials, self.description
        )
        .to_lowercase()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("productTitle is required")]
    MissingTitle,
}

/// The fixed set of recommendation sentences a verdict can carry.
///
/// Two independent tier tables feed this set: one for scores recovered from
/// generated text and one for the keyword scorer. Their cutoffs and wording
/// differ on purpose and are kept apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Recommendation {
    GeneratedGood,
    GeneratedModerate,
    GeneratedLow,
    GeneratedPoor,
    KeywordExcellent,
    KeywordGood,
    KeywordModerate,
    KeywordPoor,
}

impl Recommendation {
    /// Tier table for scores recovered from generated text.
    pub fn for_generated_score(score: u8) -> Self {
        match score {
            70.. => Self::GeneratedGood,
            45..=69 => Self::GeneratedModerate,
            25..=44 => Self::GeneratedLow,
            _ => Self::GeneratedPoor,
        }
    }

    /// Tier table for keyword scores.
    pub fn for_keyword_score(score: u8) -> Self {
        match score {
            80.. => Self::KeywordExcellent,
            60..=79 => Self::KeywordGood,
            40..=59 => Self::KeywordModerate,
            _ => Self::KeywordPoor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneratedGood => "Good sustainable choice based on AI analysis.",
            Self::GeneratedModerate => "Moderate sustainability. Consider greener alternatives.",
            Self::GeneratedLow => "Low sustainability. Look for eco-friendly options.",
            Self::GeneratedPoor => "Poor sustainability. Strongly consider alternatives.",
            Self::KeywordExcellent => "Excellent sustainable choice!",
            Self::KeywordGood => "Good option. Verify certifications.",
            Self::KeywordModerate => "Moderate. Look for better alternatives.",
            Self::KeywordPoor => "Consider more sustainable alternatives.",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Recommendation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Score plus rationale produced by either analysis path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub score: u8,
    pub positives: Vec<String>,
    pub negatives: Vec<String>,
    pub recommendation: Recommendation,
}

/// A verdict recovered from generated text, with an excerpt of that text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterpretedResult {
    pub verdict: Verdict,
    pub excerpt: Option<String>,
}

/// Which path produced a [`ScoreResult`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisMode {
    /// No usable engine; the keyword scorer ran alone.
    KeywordOnly,
    /// The engine was attempted and failed; the keyword scorer took over.
    HybridFallback,
    /// Engine output was interpreted and blended with the keyword score.
    LlmInference,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeywordOnly => "keyword",
            Self::HybridFallback => "hybrid",
            Self::LlmInference => "inference",
        }
    }

    /// Engine identifier reported to callers, e.g. `candle-llama-3.2-1b-hybrid`.
    pub fn engine_identifier(&self, engine_name: &str) -> String {
        format!("{engine_name}-{}", self.as_str())
    }
}

/// Final analysis result returned to callers.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    /// Sustainability score in `[0, 100]`
    pub green_score: u8,
    /// Between one and three positive observations
    pub positives: Vec<String>,
    /// Between one and three negative observations
    pub negatives: Vec<String>,
    /// One of a fixed set of recommendation sentences
    #[schema(value_type = String)]
    pub recommendation: Recommendation,
    /// Leading excerpt of the generated text, only when engine output was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_raw_output: Option<String>,
    /// Always true, the analysis never leaves the device
    pub local_analysis: bool,
    /// Engine identifier, suffixed with the analysis mode
    pub engine: String,
    pub model_loaded: bool,
    pub tokenizer_loaded: bool,
    #[serde(rename = "usedLLM")]
    pub used_llm: bool,
    /// Wall-clock analysis time in milliseconds
    pub inference_ms: f64,
}

/// Snapshot of the engine state and inference counters.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub model: String,
    pub model_path: String,
    #[serde(rename = "modelSizeGB")]
    pub model_size_gb: f64,
    pub model_loaded: bool,
    pub can_infer: bool,
    pub model_load_error: Option<String>,
    pub tokenizer_loaded: bool,
    pub tokenizer_backend: Option<String>,
    pub runtime: String,
    pub docker: bool,
    pub avg_inference_ms: f64,
    pub total_inferences: u64,
}

/// Returns at most `max_chars` characters of `text`.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Rounds `value` to the given number of decimals.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
