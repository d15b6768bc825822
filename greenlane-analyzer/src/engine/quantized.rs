use std::{path::Path, time::Instant};

use candle::{quantized::gguf_file, DType, Device, Tensor};
use candle_transformers::models::quantized_llama::{ModelWeights, MAX_SEQ_LEN};
use tracing::info;

use crate::engine::{DecodeSession, EngineError, InferenceEngine, FORWARD_METHOD};

const RUNTIME: &str = "candle";

/// Quantized llama model loaded from a GGUF artifact.
///
/// The loaded weights are kept pristine. Each session works on its own clone,
/// whose key/value cache starts empty, so stale context from a previous
/// request can never leak into the next one. Weight tensors are reference
/// counted, which keeps the clone cheap.
pub struct QuantizedLlamaEngine {
    weights: ModelWeights,
    device: Device,
    max_context_len: usize,
}

impl QuantizedLlamaEngine {
    /// Loads a GGUF artifact onto `device`.
    ///
    /// `max_context_len` is capped at the model's own sequence limit.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        device: Device,
        max_context_len: usize,
    ) -> Result<Self, EngineError> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(EngineError::ArtifactNotFound(model_path.to_path_buf()));
        }
        info!(
            target = "greenlane-analyzer",
            event = "engine_load",
            model_path = %model_path.display(),
            "Loading quantized llama model ..."
        );
        let start = Instant::now();
        let mut file = std::fs::File::open(model_path)?;
        let content =
            gguf_file::Content::read(&mut file).map_err(|e| e.with_path(model_path))?;
        let weights = ModelWeights::from_gguf(content, &mut file, &device)?;
        info!(
            target = "greenlane-analyzer",
            event = "engine_load",
            "Loaded quantized llama model in {:?}",
            start.elapsed()
        );
        Ok(Self {
            weights,
            device,
            max_context_len: max_context_len.min(MAX_SEQ_LEN),
        })
    }
}

impl InferenceEngine for QuantizedLlamaEngine {
    fn runtime(&self) -> &'static str {
        RUNTIME
    }

    fn methods(&self) -> Vec<String> {
        vec![FORWARD_METHOD.to_string()]
    }

    fn max_context_len(&self) -> usize {
        self.max_context_len
    }

    fn new_session(&self) -> Result<Box<dyn DecodeSession>, EngineError> {
        Ok(Box::new(QuantizedLlamaSession {
            weights: self.weights.clone(),
            device: self.device.clone(),
            max_context_len: self.max_context_len,
        }))
    }
}

struct QuantizedLlamaSession {
    weights: ModelWeights,
    device: Device,
    max_context_len: usize,
}

impl DecodeSession for QuantizedLlamaSession {
    fn forward(&mut self, token: u32, position: usize) -> Result<Vec<f32>, EngineError> {
        if position >= self.max_context_len {
            return Err(EngineError::PositionOutOfRange {
                position,
                max_context_len: self.max_context_len,
            });
        }
        let input = Tensor::new(&[token], &self.device)?.unsqueeze(0)?;
        let logits = self.weights.forward(&input, position)?;
        let logits = logits.squeeze(0)?.to_dtype(DType::F32)?;
        Ok(logits.to_vec1::<f32>()?)
    }
}

/// Parses a device specification: `cpu`, `cuda`, `cuda:<ordinal>`, `metal` or `metal:<ordinal>`.
pub fn device(spec: &str) -> Result<Device, EngineError> {
    let spec = spec.trim().to_lowercase();
    let (kind, ordinal) = match spec.split_once(':') {
        Some((kind, ordinal)) => {
            let ordinal = ordinal
                .parse::<usize>()
                .map_err(|_| EngineError::UnsupportedDevice(spec.clone()))?;
            (kind, ordinal)
        }
        None => (spec.as_str(), 0),
    };
    match kind {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Ok(Device::new_cuda(ordinal)?),
        "metal" => Ok(Device::new_metal(ordinal)?),
        _ => Err(EngineError::UnsupportedDevice(spec.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_device() {
        assert!(matches!(device("cpu"), Ok(Device::Cpu)));
        assert!(matches!(device(" CPU "), Ok(Device::Cpu)));
    }

    #[test]
    fn test_unknown_device_is_rejected() {
        assert!(matches!(
            device("tpu"),
            Err(EngineError::UnsupportedDevice(_))
        ));
        assert!(matches!(
            device("cuda:abc"),
            Err(EngineError::UnsupportedDevice(_))
        ));
    }

    #[test]
    fn test_missing_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.gguf");
        let result = QuantizedLlamaEngine::load(&path, Device::Cpu, 128);
        assert!(matches!(result, Err(EngineError::ArtifactNotFound(p)) if p == path));
    }

    #[test]
    fn test_garbage_artifact_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.gguf");
        std::fs::write(&path, b"definitely not a gguf file").unwrap();
        assert!(QuantizedLlamaEngine::load(&path, Device::Cpu, 128).is_err());
    }
}
