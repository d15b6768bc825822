use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::{
    generation::GenerationConfig,
    tokenizer::{DEFAULT_BOS_ID, DEFAULT_EOS_IDS},
};

/// Configuration for the sustainability analyzer.
///
/// Everything except the two artifact paths has a default, so a minimal
/// `greenlane_analyzer` section only names where the model and tokenizer live.
#[derive(Clone, Debug, Deserialize)]
pub struct AnalyzerConfig {
    /// Path to the quantized GGUF model artifact.
    pub model_path: PathBuf,

    /// Path to a Hugging Face `tokenizer.json`. When missing or unreadable the
    /// byte-level fallback tokenizer is used.
    pub tokenizer_path: PathBuf,

    /// Display name of the model reported in the status endpoints.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Base name for engine identifiers, suffixed with the analysis mode.
    #[serde(default = "default_engine_name")]
    pub engine_name: String,

    /// Context length shared by prompt and generated tokens.
    #[serde(default = "default_max_context_len")]
    pub max_context_len: usize,

    /// Positions reserved for generation when truncating the prompt.
    #[serde(default = "default_reserved_generation_tokens")]
    pub reserved_generation_tokens: usize,

    /// Upper bound on generated tokens per analysis.
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,

    /// Optional wall-clock limit for a single generation, in milliseconds.
    #[serde(default)]
    pub generation_deadline_ms: Option<u64>,

    /// Beginning-of-sequence token id.
    #[serde(default = "default_bos_id")]
    pub bos_id: u32,

    /// End-of-sequence token ids, suppressed during decoding.
    #[serde(default = "default_eos_ids")]
    pub eos_ids: Vec<u32>,

    /// Device the model is loaded on: `cpu`, `cuda[:n]` or `metal[:n]`.
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_model_name() -> String {
    "Llama 3.2 1B".to_string()
}

fn default_engine_name() -> String {
    "greenlane-llama".to_string()
}

fn default_max_context_len() -> usize {
    128
}

fn default_reserved_generation_tokens() -> usize {
    38
}

fn default_max_new_tokens() -> usize {
    48
}

fn default_bos_id() -> u32 {
    DEFAULT_BOS_ID
}

fn default_eos_ids() -> Vec<u32> {
    DEFAULT_EOS_IDS.to_vec()
}

fn default_device() -> String {
    "cpu".to_string()
}

impl AnalyzerConfig {
    /// Creates a configuration with default limits for the given artifacts.
    pub fn new(model_path: impl Into<PathBuf>, tokenizer_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            tokenizer_path: tokenizer_path.into(),
            model_name: default_model_name(),
            engine_name: default_engine_name(),
            max_context_len: default_max_context_len(),
            reserved_generation_tokens: default_reserved_generation_tokens(),
            max_new_tokens: default_max_new_tokens(),
            generation_deadline_ms: None,
            bos_id: default_bos_id(),
            eos_ids: default_eos_ids(),
            device: default_device(),
        }
    }

    /// Creates a new `AnalyzerConfig` instance from a configuration file.
    ///
    /// # Arguments
    ///
    /// * `config_file_path` - Path to the configuration file. The file should be in a format
    ///   supported by the `config` crate (e.g., YAML, JSON, TOML) and contain a
    ///   "greenlane_analyzer" section. Environment variables prefixed with
    ///   `GREENLANE_ANALYZER__` override file values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the section is missing
    /// or does not match the expected structure.
    pub fn from_file_path<P: AsRef<Path>>(config_file_path: P) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(config_file_path.as_ref()))
            .add_source(
                config::Environment::with_prefix("GREENLANE_ANALYZER")
                    .keep_prefix(true)
                    .separator("__"),
            );
        let config = builder.build()?;
        config.get::<Self>("greenlane_analyzer")
    }

    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            max_context_len: self.max_context_len,
            reserved_generation_tokens: self.reserved_generation_tokens,
            max_new_tokens: self.max_new_tokens,
            deadline: self.generation_deadline_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_section_uses_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[greenlane_analyzer]
model_path = "/models/llama.gguf"
tokenizer_path = "/models/tokenizer.json"
"#
        )
        .unwrap();
        let config = AnalyzerConfig::from_file_path(file.path()).unwrap();
        assert_eq!(config.model_path, PathBuf::from("/models/llama.gguf"));
        assert_eq!(config.max_context_len, 128);
        assert_eq!(config.reserved_generation_tokens, 38);
        assert_eq!(config.max_new_tokens, 48);
        assert_eq!(config.bos_id, 128_000);
        assert_eq!(config.eos_ids, vec![128_001, 128_008, 128_009]);
        assert_eq!(config.device, "cpu");
        assert!(config.generation_deadline_ms.is_none());
    }

    #[test]
    fn test_overrides_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[greenlane_analyzer]
model_path = "model.gguf"
tokenizer_path = "tokenizer.json"
engine_name = "edge"
max_new_tokens = 16
generation_deadline_ms = 2500
eos_ids = [2]
"#
        )
        .unwrap();
        let config = AnalyzerConfig::from_file_path(file.path()).unwrap();
        assert_eq!(config.engine_name, "edge");
        let generation = config.generation_config();
        assert_eq!(generation.max_new_tokens, 16);
        assert_eq!(generation.deadline, Some(Duration::from_millis(2500)));
        assert_eq!(config.eos_ids, vec![2]);
    }

    #[test]
    fn test_missing_section_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[other]\nkey = 1").unwrap();
        assert!(AnalyzerConfig::from_file_path(file.path()).is_err());
    }

    #[test]
    fn test_new_matches_serde_defaults() {
        let config = AnalyzerConfig::new("m.gguf", "t.json");
        assert_eq!(config.generation_config(), GenerationConfig::default());
    }
}
