//! Text pipeline: normalization, phonemization, tokenization and chunking

pub mod chunker;
pub mod normalize;
pub mod phonemizer;
pub mod tokenizer;
pub mod vocab;

pub use chunker::{Chunk, ChunkLimits, TextChunker};
pub use normalize::normalize_text;
#[cfg(feature = "kokoro-tts")]
pub use phonemizer::EspeakPhonemizer;
pub use phonemizer::{PassthroughPhonemizer, Phonemizer, default_phonemizer};
pub use tokenizer::{
    MAX_PHONEME_TOKENS, PhonemeTokenizer, TextTokenizer, TokenizerError, tokenize_phonemes,
    tokenize_phonemes_checked,
};
