//! Text and phoneme tokenization
//!
//! Token ids index into [`VOCAB`](super::vocab::VOCAB). Symbols outside the
//! vocabulary are dropped silently, so tokenization never fails; only the
//! length check does.

use super::normalize::normalize_text;
use super::phonemizer::Phonemizer;
use super::vocab::token_id;
use std::sync::Arc;
use thiserror::Error;

/// Longest token sequence one inference call accepts, excluding boundary padding
pub const MAX_PHONEME_TOKENS: usize = 510;

#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("Sequence too long: {length} tokens (max: {max})")]
    SequenceTooLong { length: usize, max: usize },
}

/// Turns a piece of text into model token ids
///
/// Implementations must be deterministic: the chunker relies on the same
/// sentence always producing the same count.
pub trait TextTokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<i64>;
}

/// Look up each phoneme symbol directly in the vocabulary
pub fn tokenize_phonemes(phonemes: &str) -> Vec<i64> {
    phonemes.chars().filter_map(token_id).collect()
}

/// [`tokenize_phonemes`] plus the [`MAX_PHONEME_TOKENS`] limit
pub fn tokenize_phonemes_checked(phonemes: &str) -> Result<Vec<i64>, TokenizerError> {
    let tokens = tokenize_phonemes(phonemes);
    if tokens.len() > MAX_PHONEME_TOKENS {
        return Err(TokenizerError::SequenceTooLong {
            length: tokens.len(),
            max: MAX_PHONEME_TOKENS,
        });
    }
    Ok(tokens)
}

/// Normalize, phonemize, then map symbols to ids
#[derive(Clone)]
pub struct PhonemeTokenizer {
    phonemizer: Arc<dyn Phonemizer>,
    language: String,
}

impl PhonemeTokenizer {
    pub fn new(phonemizer: Arc<dyn Phonemizer>, language: impl Into<String>) -> Self {
        Self {
            phonemizer,
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// The phoneme string a piece of text tokenizes through
    pub fn phonemes(&self, text: &str) -> String {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return String::new();
        }
        self.phonemizer.phonemize(&normalized, &self.language)
    }
}

impl TextTokenizer for PhonemeTokenizer {
    fn tokenize(&self, text: &str) -> Vec<i64> {
        tokenize_phonemes(&self.phonemes(text))
    }
}

impl std::fmt::Debug for PhonemeTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhonemeTokenizer")
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::text::phonemizer::PassthroughPhonemizer;
    use crate::core::text::vocab::detokenize;

    #[test]
    fn test_tokenize_phonemes_skips_unknown() {
        let tokens = tokenize_phonemes("hello€world");
        assert_eq!(tokens.len(), 10);
        assert_eq!(detokenize(&tokens), "helloworld");
    }

    #[test]
    fn test_tokenize_ipa() {
        let tokens = tokenize_phonemes("həlˈoʊ");
        assert_eq!(tokens.len(), 6);
    }

    #[test]
    fn test_checked_limit() {
        let at_limit = "a".repeat(MAX_PHONEME_TOKENS);
        assert_eq!(tokenize_phonemes_checked(&at_limit).unwrap().len(), 510);

        let over = "a".repeat(MAX_PHONEME_TOKENS + 1);
        match tokenize_phonemes_checked(&over) {
            Err(TokenizerError::SequenceTooLong { length, max }) => {
                assert_eq!(length, 511);
                assert_eq!(max, 510);
            }
            other => panic!("expected SequenceTooLong, got {other:?}"),
        }
    }

    #[test]
    fn test_phoneme_tokenizer_normalizes_first() {
        let tokenizer = PhonemeTokenizer::new(Arc::new(PassthroughPhonemizer), "a");
        assert_eq!(tokenizer.phonemes("Dr. Smith"), "Doctor Smith");
        assert_eq!(tokenizer.tokenize("Dr. Smith").len(), "Doctor Smith".len());
    }

    #[test]
    fn test_phoneme_tokenizer_blank_input() {
        let tokenizer = PhonemeTokenizer::new(Arc::new(PassthroughPhonemizer), "a");
        assert!(tokenizer.tokenize("   ").is_empty());
    }
}
