use std::{
    sync::{Mutex, PoisonError},
    time::Instant,
};

use opentelemetry::KeyValue;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::AnalyzerConfig,
    engine::{quantized, EngineError, InferenceEngine},
    generation::{GenerationController, GenerationError},
    interpreter::ResponseInterpreter,
    keyword::KeywordScorer,
    metrics::{ANALYSES_TOTAL, ANALYSIS_LATENCY, INFERENCE_FAILURES},
    status::InferenceStats,
    tokenizer::{ByteTokenizer, HfTokenizer, TextTokenizer},
    types::{
        round_to, truncate_chars, AnalysisMode, AnalysisRequest, EngineStatus, InterpretedResult,
        ScoreResult, Verdict,
    },
};

/// Characters of the title and materials kept in the prompt.
const PROMPT_FIELD_CHARS: usize = 30;
/// Generated text must be longer than this once trimmed to be interpreted.
const MIN_GENERATED_CHARS: usize = 5;
const RAW_OUTPUT_CHARS: usize = 150;
const LOAD_ERROR_CHARS: usize = 200;
const GENERATED_WEIGHT: f64 = 0.6;
const KEYWORD_WEIGHT: f64 = 0.4;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Reasons an engine attempt was abandoned in favour of keyword scoring.
#[derive(Debug, Error)]
pub enum InferenceAttemptError {
    #[error("Generation failed: `{0}`")]
    Generation(#[from] GenerationError),
    #[error("Generated text too short to interpret ({0} chars)")]
    InsufficientOutput(usize),
}

/// Builds the completion-style prompt for a request.
pub fn build_prompt(request: &AnalysisRequest) -> String {
    let title = truncate_chars(request.title(), PROMPT_FIELD_CHARS);
    let materials = match request.materials().trim() {
        "" => "Not specified".to_string(),
        _ => truncate_chars(request.materials(), PROMPT_FIELD_CHARS),
    };
    format!(
        "Product Review: {title}\nMaterials: {materials}\n\nSustainability Analysis:\nThis product scores"
    )
}

/// Weighted blend of an interpreted score and a keyword score.
pub fn blend_scores(generated: u8, keyword: u8) -> u8 {
    let blended = GENERATED_WEIGHT * f64::from(generated) + KEYWORD_WEIGHT * f64::from(keyword);
    blended.round().clamp(0.0, 100.0) as u8
}

/// Owns the engine, tokenizer and counters used to answer analysis requests.
///
/// Built once at startup and shared by reference with every request handler.
/// Construction never fails: a missing or broken model leaves the analyzer in
/// keyword-only mode with the load error kept for the status report.
pub struct SustainabilityAnalyzer {
    config: AnalyzerConfig,
    engine: Option<Box<dyn InferenceEngine>>,
    tokenizer: Box<dyn TextTokenizer>,
    load_error: Option<String>,
    model_size_gb: f64,
    docker: bool,
    interpreter: ResponseInterpreter,
    keyword_scorer: KeywordScorer<'static>,
    /// Serializes decode sessions on the single engine instance
    engine_lock: Mutex<()>,
    stats: Mutex<InferenceStats>,
}

impl SustainabilityAnalyzer {
    /// Loads the model and tokenizer named by `config`.
    ///
    /// A tokenizer that cannot be read is replaced by the byte-level fallback.
    pub fn from_config(config: AnalyzerConfig) -> Self {
        let engine = quantized::device(&config.device).and_then(|device| {
            quantized::QuantizedLlamaEngine::load(
                &config.model_path,
                device,
                config.max_context_len,
            )
            .map(|engine| Box::new(engine) as Box<dyn InferenceEngine>)
        });
        let tokenizer: Box<dyn TextTokenizer> = match HfTokenizer::from_file(
            &config.tokenizer_path,
            config.bos_id,
            config.eos_ids.iter().copied(),
        ) {
            Ok(tokenizer) => Box::new(tokenizer),
            Err(e) => {
                warn!(
                    target = "greenlane-analyzer",
                    event = "tokenizer_fallback",
                    tokenizer_path = %config.tokenizer_path.display(),
                    error = %e,
                    "Failed to load tokenizer, using byte-level fallback"
                );
                Box::new(ByteTokenizer::new(
                    config.bos_id,
                    config.eos_ids.iter().copied(),
                ))
            }
        };
        Self::new(config, engine, tokenizer)
    }

    /// Assembles an analyzer from an engine load outcome and a tokenizer.
    pub fn new(
        config: AnalyzerConfig,
        engine: Result<Box<dyn InferenceEngine>, EngineError>,
        tokenizer: Box<dyn TextTokenizer>,
    ) -> Self {
        let model_size_gb = std::fs::metadata(&config.model_path)
            .map(|metadata| metadata.len() as f64 / BYTES_PER_GB)
            .unwrap_or(0.0);
        let (engine, load_error) = match engine {
            Ok(engine) => {
                info!(
                    target = "greenlane-analyzer",
                    event = "engine_ready",
                    runtime = engine.runtime(),
                    can_infer = engine.can_infer(),
                    "Engine loaded"
                );
                (Some(engine), None)
            }
            Err(e) => {
                warn!(
                    target = "greenlane-analyzer",
                    event = "engine_unavailable",
                    error = %e,
                    "Engine unavailable, analyses use keyword scoring only"
                );
                (None, Some(truncate_chars(&e.to_string(), LOAD_ERROR_CHARS)))
            }
        };
        Self {
            config,
            engine,
            tokenizer,
            load_error,
            model_size_gb,
            docker: false,
            interpreter: ResponseInterpreter::default(),
            keyword_scorer: KeywordScorer::default(),
            engine_lock: Mutex::new(()),
            stats: Mutex::new(InferenceStats::default()),
        }
    }

    /// Marks the analyzer as running inside a container, as reported by the status endpoints.
    pub fn with_docker(mut self, docker: bool) -> Self {
        self.docker = docker;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn model_loaded(&self) -> bool {
        self.engine.is_some()
    }

    pub fn can_infer(&self) -> bool {
        self.engine.as_ref().is_some_and(|engine| engine.can_infer())
    }

    pub fn docker(&self) -> bool {
        self.docker
    }

    /// Runtime name of the loaded engine, `unavailable` without one.
    pub fn runtime(&self) -> &'static str {
        self.engine
            .as_ref()
            .map_or("unavailable", |engine| engine.runtime())
    }

    /// Produces a score result for `request`. Always succeeds.
    ///
    /// With a capable engine the generated continuation is interpreted and blended
    /// with the keyword score. Any failure on that path falls back to the keyword
    /// verdict, which is also used directly when no engine is available.
    #[instrument(level = "info", skip_all, fields(title = %request.title()))]
    pub fn analyze(&self, request: &AnalysisRequest) -> ScoreResult {
        let start = Instant::now();
        let keyword = self.keyword_scorer.score(request);

        let (mode, verdict, llm_raw_output) = match self.inference_engine() {
            None => (AnalysisMode::KeywordOnly, keyword, None),
            Some(engine) => match self.infer(engine, request) {
                Ok((interpreted, text)) => {
                    let verdict = Verdict {
                        score: blend_scores(interpreted.verdict.score, keyword.score),
                        ..interpreted.verdict
                    };
                    (
                        AnalysisMode::LlmInference,
                        verdict,
                        Some(truncate_chars(&text, RAW_OUTPUT_CHARS)),
                    )
                }
                Err(e) => {
                    INFERENCE_FAILURES.add(1, &[KeyValue::new("runtime", engine.runtime())]);
                    warn!(
                        target = "greenlane-analyzer",
                        event = "inference_fallback",
                        error = %e,
                        "Inference failed, using keyword fallback"
                    );
                    (AnalysisMode::HybridFallback, keyword, None)
                }
            },
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(elapsed_ms);
        let attributes = [KeyValue::new("mode", mode.as_str())];
        ANALYSES_TOTAL.add(1, &attributes);
        ANALYSIS_LATENCY.record(elapsed_ms / 1000.0, &attributes);
        info!(
            target = "greenlane-analyzer",
            event = "analysis_complete",
            mode = mode.as_str(),
            score = verdict.score,
            "Analysis complete in {elapsed_ms:.0}ms"
        );

        ScoreResult {
            green_score: verdict.score,
            positives: verdict.positives,
            negatives: verdict.negatives,
            recommendation: verdict.recommendation,
            llm_raw_output,
            local_analysis: true,
            engine: mode.engine_identifier(&self.config.engine_name),
            model_loaded: self.model_loaded(),
            tokenizer_loaded: true,
            used_llm: mode == AnalysisMode::LlmInference,
            inference_ms: round_to(elapsed_ms, 1),
        }
    }

    /// Snapshot of the engine state and inference counters.
    pub fn status(&self) -> EngineStatus {
        let stats = self
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        EngineStatus {
            model: self.config.model_name.clone(),
            model_path: self.config.model_path.display().to_string(),
            model_size_gb: round_to(self.model_size_gb, 2),
            model_loaded: self.model_loaded(),
            can_infer: self.can_infer(),
            model_load_error: self.load_error.clone(),
            tokenizer_loaded: true,
            tokenizer_backend: Some(self.tokenizer.backend().to_string()),
            runtime: self.runtime().to_string(),
            docker: self.docker,
            avg_inference_ms: round_to(stats.average_ms(), 1),
            total_inferences: stats.total(),
        }
    }

    fn inference_engine(&self) -> Option<&dyn InferenceEngine> {
        self.engine
            .as_deref()
            .filter(|engine| engine.can_infer())
    }

    fn infer(
        &self,
        engine: &dyn InferenceEngine,
        request: &AnalysisRequest,
    ) -> Result<(InterpretedResult, String), InferenceAttemptError> {
        let prompt = build_prompt(request);
        let generation_config = self.config.generation_config();
        let generated = {
            let _guard = self
                .engine_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            GenerationController::new(engine, self.tokenizer.as_ref(), &generation_config)
                .generate(&prompt)?
        };
        let trimmed_chars = generated.text.trim().chars().count();
        if trimmed_chars <= MIN_GENERATED_CHARS {
            return Err(InferenceAttemptError::InsufficientOutput(trimmed_chars));
        }
        let interpretation = self.interpreter.interpret(&generated.text);
        debug!(
            target = "greenlane-analyzer",
            event = "interpretation",
            strategy = interpretation.strategy,
            score = interpretation.result.verdict.score,
            excerpt = ?interpretation.result.excerpt,
            "Interpreted generated text"
        );
        Ok((interpretation.result, generated.text))
    }
}
