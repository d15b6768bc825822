//! Deterministic engine doubles for tests.
//!
//! [`ScriptedEngine`] works over a byte vocabulary (ids `0..256`) plus one
//! beginning-of-sequence id and two end-of-sequence ids. Every step it ranks an
//! end-of-sequence id highest, so decoding only produces text while suppression
//! is in effect. Below that it proposes the next byte of its script; once the
//! script is exhausted it proposes spaces.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use crate::{
    engine::{DecodeSession, EngineError, InferenceEngine, FORWARD_METHOD},
    tokenizer::ByteTokenizer,
};

pub const TEST_BOS_ID: u32 = 256;
pub const TEST_EOS_IDS: [u32; 2] = [257, 258];
const TEST_VOCAB_SIZE: usize = 259;

const EOS_LOGIT: f32 = 20.0;
const SCRIPT_LOGIT: f32 = 10.0;
const FILLER_LOGIT: f32 = 1.0;
const FILLER: u8 = b' ';

/// Byte tokenizer matching the [`ScriptedEngine`] vocabulary.
pub fn test_tokenizer() -> ByteTokenizer {
    ByteTokenizer::new(TEST_BOS_ID, TEST_EOS_IDS)
}

#[derive(Default)]
struct Observations {
    fed_tokens: Vec<u32>,
    max_position: Option<usize>,
}

pub struct ScriptedEngine {
    script: Arc<Vec<u8>>,
    methods: Vec<String>,
    max_context_len: usize,
    fail_after_calls: Option<usize>,
    fail_sessions: bool,
    sessions: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    eos_preferred: Arc<AtomicBool>,
    observations: Arc<Mutex<Observations>>,
}

impl ScriptedEngine {
    pub fn new(script: &str) -> Self {
        Self {
            script: Arc::new(script.as_bytes().to_vec()),
            methods: vec![FORWARD_METHOD.to_string()],
            max_context_len: 512,
            fail_after_calls: None,
            fail_sessions: false,
            sessions: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
            eos_preferred: Arc::new(AtomicBool::new(false)),
            observations: Arc::new(Mutex::new(Observations::default())),
        }
    }

    /// Fails every forward call after the first `calls`, counted across sessions.
    pub fn fail_after_calls(mut self, calls: usize) -> Self {
        self.fail_after_calls = Some(calls);
        self
    }

    pub fn fail_sessions(mut self) -> Self {
        self.fail_sessions = true;
        self
    }

    /// Drops the forward method, so the engine loads but cannot generate.
    pub fn without_forward(mut self) -> Self {
        self.methods = vec!["metadata".to_string()];
        self
    }

    pub fn with_max_context_len(mut self, max_context_len: usize) -> Self {
        self.max_context_len = max_context_len;
        self
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn forward_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether an end-of-sequence id ever had the highest raw logit.
    pub fn eos_was_preferred(&self) -> bool {
        self.eos_preferred.load(Ordering::SeqCst)
    }

    pub fn fed_tokens(&self) -> Vec<u32> {
        self.observations
            .lock()
            .map(|o| o.fed_tokens.clone())
            .unwrap_or_default()
    }

    pub fn max_position_seen(&self) -> Option<usize> {
        self.observations.lock().ok().and_then(|o| o.max_position)
    }
}

impl InferenceEngine for ScriptedEngine {
    fn runtime(&self) -> &'static str {
        "scripted"
    }

    fn methods(&self) -> Vec<String> {
        self.methods.clone()
    }

    fn max_context_len(&self) -> usize {
        self.max_context_len
    }

    fn new_session(&self) -> Result<Box<dyn DecodeSession>, EngineError> {
        if self.fail_sessions {
            return Err(EngineError::Load("scripted session failure".to_string()));
        }
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            script: Arc::clone(&self.script),
            cursor: 0,
            last_proposal: None,
            max_context_len: self.max_context_len,
            fail_after_calls: self.fail_after_calls,
            calls: Arc::clone(&self.calls),
            eos_preferred: Arc::clone(&self.eos_preferred),
            observations: Arc::clone(&self.observations),
        }))
    }
}

struct ScriptedSession {
    script: Arc<Vec<u8>>,
    cursor: usize,
    last_proposal: Option<u32>,
    max_context_len: usize,
    fail_after_calls: Option<usize>,
    calls: Arc<AtomicUsize>,
    eos_preferred: Arc<AtomicBool>,
    observations: Arc<Mutex<Observations>>,
}

impl DecodeSession for ScriptedSession {
    fn forward(&mut self, token: u32, position: usize) -> Result<Vec<f32>, EngineError> {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_after_calls.is_some_and(|limit| calls > limit) {
            return Err(EngineError::Invocation(format!(
                "scripted failure at call {calls}"
            )));
        }
        if position >= self.max_context_len {
            return Err(EngineError::PositionOutOfRange {
                position,
                max_context_len: self.max_context_len,
            });
        }
        if let Ok(mut observations) = self.observations.lock() {
            observations.fed_tokens.push(token);
            observations.max_position = observations.max_position.max(Some(position));
        }

        // Follow the script while the caller feeds back what was proposed
        if self.last_proposal == Some(token) {
            self.cursor += 1;
        } else {
            self.cursor = 0;
        }

        let mut logits = vec![0.0; TEST_VOCAB_SIZE];
        let proposal = match self.script.get(self.cursor) {
            Some(&byte) => {
                logits[byte as usize] = SCRIPT_LOGIT;
                u32::from(byte)
            }
            None => {
                logits[FILLER as usize] = FILLER_LOGIT;
                u32::from(FILLER)
            }
        };
        logits[TEST_EOS_IDS[0] as usize] = EOS_LOGIT;
        self.eos_preferred.store(true, Ordering::SeqCst);
        self.last_proposal = Some(proposal);
        Ok(logits)
    }
}
