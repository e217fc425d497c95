//! Synthesis backend capability
//!
//! The lifecycle manager drives exactly one [`SynthesisBackend`]: it loads
//! weights, produces audio for a token sequence, and can be unloaded to free
//! memory. [`OnnxBackend`] runs the Kokoro ONNX model; tests plug in doubles.

mod onnx;

pub use onnx::{OnnxBackend, OnnxConfig};

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Output sample rate of the Kokoro model, in Hz
pub const SAMPLE_RATE: u32 = 24_000;

/// Width of one style embedding row
pub const STYLE_DIM: usize = 256;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Weights file is absent
    #[error("Model file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to load model: {0}")]
    Load(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Model is not loaded")]
    NotLoaded,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Raw f32 samples, one item per buffer the model produces
pub type AudioStream = BoxStream<'static, BackendResult<Vec<f32>>>;

/// Input for one inference call
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// Token ids, without boundary padding
    pub tokens: Vec<i64>,
    /// Style embedding row matched to the token count
    pub style: Vec<f32>,
    pub speed: f32,
    pub language: String,
}

#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Load weights from `path`, replacing nothing if already loaded
    ///
    /// Returns [`BackendError::NotFound`] when the file does not exist.
    async fn load(&self, path: &Path) -> BackendResult<()>;

    fn is_loaded(&self) -> bool;

    /// Start inference for one chunk
    ///
    /// Buffers are produced lazily as the returned stream is polled.
    fn generate_stream(&self, request: SynthesisRequest) -> BackendResult<AudioStream>;

    /// Release the loaded weights
    fn unload(&self);
}
