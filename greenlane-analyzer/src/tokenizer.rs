use std::{collections::HashSet, path::Path};

use thiserror::Error;
use tokenizers::Tokenizer;

/// Default beginning-of-sequence id (Llama 3.2 vocabulary).
pub const DEFAULT_BOS_ID: u32 = 128_000;
/// Default end-of-sequence ids (Llama 3.2 vocabulary).
pub const DEFAULT_EOS_IDS: [u32; 3] = [128_001, 128_008, 128_009];

/// Text to token-id mapping used by the generation controller.
pub trait TextTokenizer: Send + Sync {
    /// Backend name reported in the engine status.
    fn backend(&self) -> &'static str;

    fn bos_id(&self) -> u32;

    fn eos_ids(&self) -> &HashSet<u32>;

    /// Encodes `text`, optionally prepending the beginning-of-sequence id.
    fn encode(&self, text: &str, prepend_bos: bool) -> Result<Vec<u32>, TokenizerError>;

    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError>;
}

/// Tokenizer backed by a Hugging Face `tokenizer.json`.
pub struct HfTokenizer {
    inner: Tokenizer,
    bos_id: u32,
    eos_ids: HashSet<u32>,
}

impl HfTokenizer {
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        bos_id: u32,
        eos_ids: impl IntoIterator<Item = u32>,
    ) -> Result<Self, TokenizerError> {
        let inner = Tokenizer::from_file(path)?;
        Ok(Self::new(inner, bos_id, eos_ids))
    }

    pub fn new(inner: Tokenizer, bos_id: u32, eos_ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            inner,
            bos_id,
            eos_ids: eos_ids.into_iter().collect(),
        }
    }
}

impl TextTokenizer for HfTokenizer {
    fn backend(&self) -> &'static str {
        "tokenizers"
    }

    fn bos_id(&self) -> u32 {
        self.bos_id
    }

    fn eos_ids(&self) -> &HashSet<u32> {
        &self.eos_ids
    }

    fn encode(&self, text: &str, prepend_bos: bool) -> Result<Vec<u32>, TokenizerError> {
        let encoding = self.inner.encode(text, false)?;
        let mut ids = Vec::with_capacity(encoding.len() + 1);
        if prepend_bos {
            ids.push(self.bos_id);
        }
        ids.extend_from_slice(encoding.get_ids());
        Ok(ids)
    }

    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        Ok(self.inner.decode(ids, true)?)
    }
}

/// Fallback tokenizer mapping UTF-8 bytes to ids `0..256`.
///
/// Used when no tokenizer resource is available. Special ids live outside the
/// byte range and are dropped on decode.
#[derive(Clone, Debug)]
pub struct ByteTokenizer {
    bos_id: u32,
    eos_ids: HashSet<u32>,
}

impl Default for ByteTokenizer {
    fn default() -> Self {
        Self::new(DEFAULT_BOS_ID, DEFAULT_EOS_IDS)
    }
}

impl ByteTokenizer {
    pub fn new(bos_id: u32, eos_ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            bos_id,
            eos_ids: eos_ids.into_iter().collect(),
        }
    }
}

impl TextTokenizer for ByteTokenizer {
    fn backend(&self) -> &'static str {
        "byte"
    }

    fn bos_id(&self) -> u32 {
        self.bos_id
    }

    fn eos_ids(&self) -> &HashSet<u32> {
        &self.eos_ids
    }

    fn encode(&self, text: &str, prepend_bos: bool) -> Result<Vec<u32>, TokenizerError> {
        let mut ids = Vec::with_capacity(text.len() + 1);
        if prepend_bos {
            ids.push(self.bos_id);
        }
        ids.extend(text.bytes().map(u32::from));
        Ok(ids)
    }

    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        let bytes: Vec<u8> = ids.iter().filter_map(|&id| u8::try_from(id).ok()).collect();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("Tokenizer error: `{0}`")]
    Tokenizer(#[from] tokenizers::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_tokenizer_prepends_bos() {
        let tokenizer = ByteTokenizer::default();
        let ids = tokenizer.encode("hi", true).unwrap();
        assert_eq!(ids, vec![DEFAULT_BOS_ID, 104, 105]);
        assert_eq!(tokenizer.encode("hi", false).unwrap(), vec![104, 105]);
    }

    #[test]
    fn test_byte_tokenizer_drops_special_ids_on_decode() {
        let tokenizer = ByteTokenizer::default();
        let mut ids = tokenizer.encode("Bamboo é", true).unwrap();
        ids.push(DEFAULT_EOS_IDS[0]);
        assert_eq!(tokenizer.decode(&ids).unwrap(), "Bamboo é");
    }

    #[test]
    fn test_byte_tokenizer_eos_set() {
        let tokenizer = ByteTokenizer::new(256, [257, 258]);
        assert_eq!(tokenizer.bos_id(), 256);
        assert!(tokenizer.eos_ids().contains(&257));
        assert!(!tokenizer.eos_ids().contains(&256));
        assert_eq!(tokenizer.backend(), "byte");
    }

    #[test]
    fn test_missing_tokenizer_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = HfTokenizer::from_file(dir.path().join("tokenizer.json"), 1, [2]);
        assert!(result.is_err());
    }
}
