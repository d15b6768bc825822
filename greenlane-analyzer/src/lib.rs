#![allow(clippy::module_name_repetitions)]

pub mod analyzer;
pub mod config;
pub mod engine;
pub mod generation;
pub mod interpreter;
pub mod keyword;
pub mod lexicon;
pub mod metrics;
pub mod status;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod tokenizer;
pub mod types;

pub use analyzer::SustainabilityAnalyzer;
pub use config::AnalyzerConfig;
pub use types::{AnalysisRequest, EngineStatus, ScoreResult, ValidationError};
