//! BPE token counting aligned with the embedding model.
//!
//! Uses the `cl100k_base` vocabulary so that stored token counts predict
//! truncation behavior on the embedding side. Construction is expensive
//! (the encoder table is built once); share one instance per process.

use tiktoken_rs::{CoreBPE, cl100k_base};

use crate::error::ChunkError;

/// Token counter backed by the embedding model's BPE vocabulary.
pub struct Tokenizer {
    bpe: CoreBPE,
}

impl Tokenizer {
    /// Builds the `cl100k_base` encoder.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::TokenizerInit`] if the embedded vocabulary
    /// fails to load.
    pub fn new() -> Result<Self, ChunkError> {
        cl100k_base()
            .map(|bpe| Self { bpe })
            .map_err(|e| ChunkError::TokenizerInit(e.to_string()))
    }

    /// Counts tokens in `text` without special-token handling.
    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_basic() {
        let tok = Tokenizer::new().unwrap_or_else(|_| unreachable!());
        assert_eq!(tok.count(""), 0);
        assert!(tok.count("hello world") >= 2);
        // Longer text has more tokens
        assert!(tok.count("the appropriations clause") > tok.count("the"));
    }
}
