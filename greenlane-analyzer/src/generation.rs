//! Bounded greedy decoding against an [`InferenceEngine`].

use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use opentelemetry::KeyValue;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::{
    engine::{DecodeSession, EngineError, InferenceEngine},
    metrics::{DECODING_TIME, GENERATED_TOKENS, PROMPT_TOKENS},
    tokenizer::{TextTokenizer, TokenizerError},
};

/// Limits applied to a single generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Context length the prompt and generated tokens share
    pub max_context_len: usize,
    /// Positions kept free for generation; prompts longer than the rest are truncated
    pub reserved_generation_tokens: usize,
    /// Upper bound on generated tokens
    pub max_new_tokens: usize,
    /// Optional wall-clock limit for the whole decode
    pub deadline: Option<Duration>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_context_len: 128,
            reserved_generation_tokens: 38,
            max_new_tokens: 48,
            deadline: None,
        }
    }
}

impl GenerationConfig {
    /// Maximum number of prompt tokens, BOS included, that are fed to the engine.
    pub fn prompt_budget(&self, max_context_len: usize) -> usize {
        max_context_len
            .saturating_sub(self.reserved_generation_tokens)
            .max(1)
    }
}

/// Why a successful generation stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    TokenBudget,
    EndOfSequence,
    ContextLimit,
}

#[derive(Clone, Debug)]
pub struct GeneratedText {
    pub text: String,
    pub prompt_tokens: usize,
    pub generated_tokens: usize,
    pub elapsed: Duration,
    pub stop_reason: StopReason,
}

impl GeneratedText {
    pub fn tokens_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.generated_tokens as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Engine error: `{0}`")]
    EngineError(#[from] EngineError),
    #[error("Tokenizer error: `{0}`")]
    TokenizerError(#[from] TokenizerError),
    #[error("Prompt encoded to zero tokens")]
    EmptyPrompt,
    #[error("Engine returned no selectable logits")]
    NoCandidate,
    #[error("Generation exceeded its deadline after {elapsed_ms}ms and {generated} tokens")]
    DeadlineExceeded { elapsed_ms: u128, generated: usize },
}

/// Decode state of one generation: prompt buffer, position counter and output.
pub struct GenerationSession<'a> {
    session: Box<dyn DecodeSession>,
    eos_ids: &'a HashSet<u32>,
    prompt: Vec<u32>,
    position: usize,
    generated: Vec<u32>,
}

impl<'a> GenerationSession<'a> {
    pub fn new(session: Box<dyn DecodeSession>, eos_ids: &'a HashSet<u32>, prompt: Vec<u32>) -> Self {
        Self {
            session,
            eos_ids,
            prompt,
            position: 0,
            generated: Vec::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn generated(&self) -> &[u32] {
        &self.generated
    }

    /// Feeds every prompt token at its absolute position and selects the first output token.
    fn prefill(&mut self, deadline: &Deadline) -> Result<u32, GenerationError> {
        let mut last_logits = None;
        for &token in &self.prompt {
            deadline.check(self.generated.len())?;
            last_logits = Some(self.session.forward(token, self.position)?);
            self.position += 1;
        }
        let logits = last_logits.ok_or(GenerationError::EmptyPrompt)?;
        self.select(logits)
    }

    /// Feeds the previously selected token at the next position and selects the following one.
    fn step(&mut self, token: u32) -> Result<u32, GenerationError> {
        let logits = self.session.forward(token, self.position)?;
        self.position += 1;
        self.select(logits)
    }

    fn select(&mut self, mut logits: Vec<f32>) -> Result<u32, GenerationError> {
        suppress_eos(&mut logits, self.eos_ids);
        let token = argmax(&logits).ok_or(GenerationError::NoCandidate)?;
        self.generated.push(token);
        Ok(token)
    }

    fn is_eos(&self, token: u32) -> bool {
        self.eos_ids.contains(&token)
    }

    /// Generated tokens with every end-of-sequence id removed.
    fn output_tokens(&self) -> Vec<u32> {
        self.generated
            .iter()
            .copied()
            .filter(|t| !self.is_eos(*t))
            .collect()
    }
}

/// Drives an engine through prefill and greedy auto-regressive decoding.
pub struct GenerationController<'a> {
    engine: &'a dyn InferenceEngine,
    tokenizer: &'a dyn TextTokenizer,
    config: &'a GenerationConfig,
}

impl<'a> GenerationController<'a> {
    pub fn new(
        engine: &'a dyn InferenceEngine,
        tokenizer: &'a dyn TextTokenizer,
        config: &'a GenerationConfig,
    ) -> Self {
        Self {
            engine,
            tokenizer,
            config,
        }
    }

    /// Context length honoured for this engine: the configured one, capped by the engine.
    pub fn max_context_len(&self) -> usize {
        self.config
            .max_context_len
            .min(self.engine.max_context_len())
    }

    /// Generates a continuation of `prompt`.
    ///
    /// Decoding is strictly greedy, so identical weights and prompts give identical text.
    /// End-of-sequence logits are forced to negative infinity before every selection,
    /// which keeps a base model from stopping before it has said anything useful.
    ///
    /// # Errors
    ///
    /// Any engine or tokenizer failure, or an elapsed deadline, aborts the attempt and
    /// discards partial output.
    #[instrument(level = "info", skip_all, fields(prompt_chars = prompt.len()))]
    pub fn generate(&self, prompt: &str) -> Result<GeneratedText, GenerationError> {
        let start = Instant::now();
        let deadline = Deadline::new(start, self.config.deadline);
        let max_context_len = self.max_context_len();
        // The last addressable position is never fed
        let max_position = max_context_len.saturating_sub(1);
        let max_new_tokens = self.config.max_new_tokens.max(1);

        let mut prompt_tokens = self.tokenizer.encode(prompt, true)?;
        let budget = self.config.prompt_budget(max_context_len);
        if prompt_tokens.len() > budget {
            debug!(
                target = "greenlane-analyzer",
                event = "prompt_truncated",
                encoded = prompt_tokens.len(),
                budget,
                "Prompt exceeds its token budget, keeping the prefix"
            );
            prompt_tokens.truncate(budget);
        }
        let prompt_len = prompt_tokens.len();

        let session = self.engine.new_session()?;
        let mut generation = GenerationSession::new(session, self.tokenizer.eos_ids(), prompt_tokens);
        let mut next_token = generation.prefill(&deadline)?;

        let stop_reason = loop {
            if generation.generated().len() >= max_new_tokens {
                break StopReason::TokenBudget;
            }
            // Unreachable while suppression is in place; kept so a genuine EOS still ends the loop
            if generation.is_eos(next_token) {
                break StopReason::EndOfSequence;
            }
            if generation.position() >= max_position {
                break StopReason::ContextLimit;
            }
            deadline.check(generation.generated().len())?;
            next_token = generation.step(next_token)?;
        };

        let output_tokens = generation.output_tokens();
        let text = self.tokenizer.decode(&output_tokens)?;
        let generated = GeneratedText {
            text,
            prompt_tokens: prompt_len,
            generated_tokens: output_tokens.len(),
            elapsed: start.elapsed(),
            stop_reason,
        };

        let attributes = [KeyValue::new("runtime", self.engine.runtime())];
        PROMPT_TOKENS.add(prompt_len as u64, &attributes);
        GENERATED_TOKENS.add(generated.generated_tokens as u64, &attributes);
        DECODING_TIME.record(generated.elapsed.as_secs_f64(), &attributes);
        info!(
            target = "greenlane-analyzer",
            event = "generation_complete",
            prompt_tokens = prompt_len,
            generated_tokens = generated.generated_tokens,
            stop_reason = ?stop_reason,
            "{} tokens generated in {:.1}s ({:.1} token/s)",
            generated.generated_tokens,
            generated.elapsed.as_secs_f64(),
            generated.tokens_per_second(),
        );
        Ok(generated)
    }
}

struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    fn new(start: Instant, limit: Option<Duration>) -> Self {
        Self { start, limit }
    }

    fn check(&self, generated: usize) -> Result<(), GenerationError> {
        match self.limit {
            Some(limit) if self.start.elapsed() >= limit => {
                Err(GenerationError::DeadlineExceeded {
                    elapsed_ms: self.start.elapsed().as_millis(),
                    generated,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Forces the logits of every end-of-sequence id inside the vocabulary to negative infinity.
pub fn suppress_eos(logits: &mut [f32], eos_ids: &HashSet<u32>) {
    for &eos in eos_ids {
        if let Some(logit) = logits.get_mut(eos as usize) {
            *logit = f32::NEG_INFINITY;
        }
    }
}

/// Index of the first maximal logit, ignoring NaN. `None` when nothing beats negative infinity.
pub fn argmax(logits: &[f32]) -> Option<u32> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &value) in logits.iter().enumerate() {
        if value.is_nan() || value == f32::NEG_INFINITY {
            continue;
        }
        match best {
            Some((_, best_value)) if value <= best_value => {}
            _ => best = Some((index, value)),
        }
    }
    best.and_then(|(index, _)| u32::try_from(index).ok())
}
