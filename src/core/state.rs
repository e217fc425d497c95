use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::backend::{OnnxBackend, OnnxConfig, SynthesisBackend, SynthesisRequest};
use crate::core::lifecycle::{LifecycleError, ModelLifecycleManager};
use crate::core::storage::TempFileConfig;
use crate::core::stream::StreamOrchestrator;
use crate::core::text::{Phonemizer, default_phonemizer};
use crate::core::voices::{VoiceError, VoiceStore};

/// Text synthesized once at startup so the first request runs on a warm model
pub const WARMUP_TEXT: &str = "Warmup text for initialization.";

#[derive(Debug, Error)]
pub enum InitError {
    #[error("Warmup voice unavailable: {0}")]
    Voice(#[from] VoiceError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

#[derive(Debug, Clone, Copy)]
pub struct WarmupReport {
    pub elapsed: Duration,
    pub voice_count: usize,
}

/// Core-specific shared state for the application.
///
/// Owns the single model lifecycle, the voice store and the streaming
/// pipeline built on top of them.
pub struct CoreState {
    pub lifecycle: Arc<ModelLifecycleManager>,
    pub voices: Arc<VoiceStore>,
    pub orchestrator: Arc<StreamOrchestrator>,
    pub temp_files: TempFileConfig,
}

impl CoreState {
    /// Build core state around the ONNX backend and the default phonemizer
    pub fn new(config: &ServerConfig) -> Arc<Self> {
        let backend = Arc::new(OnnxBackend::new(OnnxConfig::default()));
        Self::with_backend(config, backend, default_phonemizer())
    }

    /// Build core state around an arbitrary backend
    pub fn with_backend(
        config: &ServerConfig,
        backend: Arc<dyn SynthesisBackend>,
        phonemizer: Arc<dyn Phonemizer>,
    ) -> Arc<Self> {
        let lifecycle = Arc::new(ModelLifecycleManager::new(
            backend,
            config.lifecycle_config(),
        ));
        let orchestrator = Arc::new(StreamOrchestrator::new(
            Arc::clone(&lifecycle),
            phonemizer,
            config.chunk_limits(),
            config.gap_trim_ms,
        ));

        Arc::new(Self {
            lifecycle,
            voices: Arc::new(VoiceStore::new(&config.voices_dir)),
            orchestrator,
            temp_files: config.temp_file_config(),
        })
    }

    /// Load the model and run one throwaway generation with `voice`
    pub async fn initialize(&self, voice: &str) -> Result<WarmupReport, InitError> {
        info!("Initializing Kokoro model with warmup voice '{}'", voice);

        let resolved = self.voices.resolve(voice, None)?;
        let tokens = self
            .orchestrator
            .chunk_text(WARMUP_TEXT, &resolved.language)
            .into_iter()
            .flat_map(|chunk| chunk.tokens)
            .collect::<Vec<_>>();

        let request = SynthesisRequest {
            style: resolved.pack.style_for(tokens.len()),
            tokens,
            speed: 1.0,
            language: resolved.language.clone(),
        };

        let elapsed = self.lifecycle.initialize_with_warmup(request).await?;

        let voice_count = self.voices.list_voices().len();
        if voice_count == 0 {
            warn!("No voices found in {}", self.voices.dir().display());
        }
        info!(
            "Kokoro model ready in {:?} with {} voices available",
            elapsed, voice_count
        );
        Ok(WarmupReport {
            elapsed,
            voice_count,
        })
    }
}
