//! Adaptive text chunking
//!
//! Splits input into sentences, tokenizes each, and greedily folds them into
//! chunks that aim for `target_min..=target_max` tokens and only exceed
//! `target_max` while the chunk is still below `target_min`. A sentence longer
//! than `max_tokens` is broken further on commas. A single sentence or clause
//! that is still oversized is emitted alone rather than dropped.

use super::tokenizer::TextTokenizer;
use std::time::Instant;
use tracing::{debug, info};

const SENTENCE_TERMINATORS: [char; 5] = ['.', '!', '?', ';', ':'];

/// Token budgets for one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    pub target_min: usize,
    pub target_max: usize,
    pub max_tokens: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            target_min: 175,
            target_max: 250,
            max_tokens: 450,
        }
    }
}

/// A unit of text handed to the backend in one inference call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub tokens: Vec<i64>,
}

impl Chunk {
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// A sentence or clause together with its tokens
#[derive(Debug)]
struct Unit {
    text: String,
    tokens: Vec<i64>,
}

/// Accumulates units until flushed into a [`Chunk`]
#[derive(Default)]
struct Builder {
    parts: Vec<String>,
    tokens: Vec<i64>,
}

impl Builder {
    fn count(&self) -> usize {
        self.tokens.len()
    }

    fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn push(&mut self, unit: Unit) {
        self.parts.push(unit.text);
        self.tokens.extend(unit.tokens);
    }

    fn restart(&mut self, unit: Unit) -> Option<Chunk> {
        let flushed = self.take();
        self.push(unit);
        flushed
    }

    fn take(&mut self) -> Option<Chunk> {
        if self.is_empty() {
            return None;
        }
        let parts = std::mem::take(&mut self.parts);
        Some(Chunk {
            text: parts.join(" "),
            tokens: std::mem::take(&mut self.tokens),
        })
    }
}

/// Splits text into token-bounded chunks
pub struct TextChunker<T> {
    tokenizer: T,
    limits: ChunkLimits,
}

impl<T: TextTokenizer> TextChunker<T> {
    pub fn new(tokenizer: T, limits: ChunkLimits) -> Self {
        Self { tokenizer, limits }
    }

    pub fn limits(&self) -> ChunkLimits {
        self.limits
    }

    /// Split `text` into chunks, in order
    ///
    /// Empty and whitespace-only input yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let started = Instant::now();
        let ChunkLimits {
            target_min,
            target_max,
            max_tokens,
        } = self.limits;

        let mut chunks = Vec::new();
        let mut emit = |chunk: Option<Chunk>| {
            if let Some(chunk) = chunk {
                debug!(
                    "Chunk {}: '{}' ({} tokens)",
                    chunks.len() + 1,
                    preview(&chunk.text),
                    chunk.token_count()
                );
                chunks.push(chunk);
            }
        };

        let mut current = Builder::default();

        for sentence in split_on(text, &SENTENCE_TERMINATORS) {
            let unit = self.unit(sentence);
            let count = unit.tokens.len();
            let cur = current.count();

            if count > max_tokens {
                emit(current.take());

                let mut clauses = Builder::default();
                for clause in split_on(&unit.text, &[',']) {
                    let clause = self.unit(clause);
                    let n = clause.tokens.len();
                    let joined = clauses.count() + n;
                    if joined <= max_tokens && joined <= target_max {
                        clauses.push(clause);
                    } else {
                        emit(clauses.restart(clause));
                    }
                }
                emit(clauses.take());
            } else if cur >= target_min && cur + count > target_max {
                emit(current.restart(unit));
            } else if cur + count <= target_max {
                current.push(unit);
            } else if cur + count <= max_tokens && cur < target_min {
                current.push(unit);
            } else {
                emit(current.restart(unit));
            }
        }
        emit(current.take());

        info!(
            "Split {} chars into {} chunks in {:.2}ms",
            text.len(),
            chunks.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        chunks
    }

    fn unit(&self, text: String) -> Unit {
        let tokens = self.tokenizer.tokenize(&text);
        Unit { text, tokens }
    }
}

/// Split on any of `delimiters`, keeping each delimiter on the piece before it
///
/// Pieces are trimmed and blank pieces are dropped along with their delimiter.
fn split_on(text: &str, delimiters: &[char]) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;

    let mut push = |body: &str, delimiter: &str| {
        let body = body.trim();
        if !body.is_empty() {
            pieces.push(format!("{body}{delimiter}"));
        }
    };

    for (idx, c) in text.char_indices() {
        if delimiters.contains(&c) {
            let end = idx + c.len_utf8();
            push(&text[start..idx], &text[idx..end]);
            start = end;
        }
    }
    push(&text[start..], "");

    pieces
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}
