pub mod quantized;

use std::path::PathBuf;

use thiserror::Error;

/// Name of the single-step decode method every capable engine exposes.
pub const FORWARD_METHOD: &str = "forward";

/// A loaded model that can hand out decode sessions.
///
/// Decode state lives in the session, never in the engine, so each analysis
/// starts from a clean context by asking for a new session.
pub trait InferenceEngine: Send + Sync {
    /// Name of the runtime backing this engine, e.g. `candle`.
    fn runtime(&self) -> &'static str;

    /// Methods exposed by the loaded artifact.
    fn methods(&self) -> Vec<String>;

    /// Hard limit on the number of positions a session can address.
    fn max_context_len(&self) -> usize;

    /// Creates a session with empty decode state.
    fn new_session(&self) -> Result<Box<dyn DecodeSession>, EngineError>;

    /// Whether the artifact exposes the [`FORWARD_METHOD`] needed for generation.
    fn can_infer(&self) -> bool {
        self.methods().iter().any(|m| m == FORWARD_METHOD)
    }
}

/// Stateful decode context for a single generation sequence.
pub trait DecodeSession: Send {
    /// Feeds `token` at absolute `position` and returns next-token logits over the vocabulary.
    fn forward(&mut self, token: u32, position: usize) -> Result<Vec<f32>, EngineError>;
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Model not found at {}", .0.display())]
    ArtifactNotFound(PathBuf),
    #[error("Failed to load model artifact: `{0}`")]
    Load(String),
    #[error("Engine invocation failed: `{0}`")]
    Invocation(String),
    #[error("Position {position} exceeds the maximum context length {max_context_len}")]
    PositionOutOfRange {
        position: usize,
        max_context_len: usize,
    },
    #[error("Unsupported device: `{0}`")]
    UnsupportedDevice(String),
    #[error("IO error: `{0}`")]
    IoError(#[from] std::io::Error),
    #[error("Candle error: `{0}`")]
    CandleError(#[from] candle::Error),
}
