//! Kokoro ONNX Runtime backend
//!
//! Session creation and inference are blocking calls and run on the tokio
//! blocking pool. The session sits behind a mutex, so concurrent chunks from
//! different requests are serialized at the model.
//!
//! Two export variants exist: the standard one takes `tokens` and returns
//! `audio`; the timestamped one takes `input_ids` and returns `waveform`
//! alongside per-token durations, which are ignored here.

use super::{AudioStream, BackendError, BackendResult, SynthesisBackend, SynthesisRequest};
use async_trait::async_trait;
use std::path::Path;

#[cfg(feature = "kokoro-tts")]
use {
    super::STYLE_DIM,
    crate::core::text::vocab::PAD_TOKEN,
    futures::StreamExt,
    ort::{
        execution_providers::CPUExecutionProvider,
        session::{
            Session, SessionInputValue, SessionInputs,
            builder::{GraphOptimizationLevel, SessionBuilder},
        },
        value::{Tensor, Value},
    },
    parking_lot::Mutex,
    std::{borrow::Cow, sync::Arc},
};

mod schema {
    pub const STYLE: &str = "style";
    pub const SPEED: &str = "speed";

    pub mod standard {
        pub const TOKENS: &str = "tokens";
        pub const AUDIO: &str = "audio";
    }

    pub mod timestamped {
        pub const TOKENS: &str = "input_ids";
        pub const AUDIO: &str = "waveform";
    }
}

/// Session tuning
#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// Intra-op threads; 0 leaves the ONNX Runtime default
    pub num_threads: usize,
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self { num_threads: 4 }
    }
}

#[cfg(feature = "kokoro-tts")]
struct LoadedModel {
    session: Session,
    tokens_key: &'static str,
    audio_key: &'static str,
}

pub struct OnnxBackend {
    #[cfg_attr(not(feature = "kokoro-tts"), allow(dead_code))]
    config: OnnxConfig,
    #[cfg(feature = "kokoro-tts")]
    model: Arc<Mutex<Option<LoadedModel>>>,
}

impl OnnxBackend {
    pub fn new(config: OnnxConfig) -> Self {
        Self {
            config,
            #[cfg(feature = "kokoro-tts")]
            model: Arc::new(Mutex::new(None)),
        }
    }
}

impl Default for OnnxBackend {
    fn default() -> Self {
        Self::new(OnnxConfig::default())
    }
}

#[cfg(feature = "kokoro-tts")]
#[async_trait]
impl SynthesisBackend for OnnxBackend {
    async fn load(&self, path: &Path) -> BackendResult<()> {
        if !path.exists() {
            return Err(BackendError::NotFound(path.to_path_buf()));
        }
        if self.is_loaded() {
            return Ok(());
        }

        let path = path.to_path_buf();
        let config = self.config.clone();
        let loaded = tokio::task::spawn_blocking(move || create_model(&path, &config))
            .await
            .map_err(|e| BackendError::Load(format!("model load task failed: {e}")))??;

        *self.model.lock() = Some(loaded);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.model.lock().is_some()
    }

    fn generate_stream(&self, request: SynthesisRequest) -> BackendResult<AudioStream> {
        if !self.is_loaded() {
            return Err(BackendError::NotLoaded);
        }
        let model = Arc::clone(&self.model);

        let audio = async move {
            tokio::task::spawn_blocking(move || {
                let mut guard = model.lock();
                let loaded = guard.as_mut().ok_or(BackendError::NotLoaded)?;
                run_inference(loaded, request)
            })
            .await
            .map_err(|e| BackendError::Inference(format!("inference task failed: {e}")))?
        };

        Ok(futures::stream::once(audio).boxed())
    }

    fn unload(&self) {
        if self.model.lock().take().is_some() {
            tracing::info!("Kokoro ONNX session released");
        }
    }
}

#[cfg(not(feature = "kokoro-tts"))]
#[async_trait]
impl SynthesisBackend for OnnxBackend {
    async fn load(&self, path: &Path) -> BackendResult<()> {
        if !path.exists() {
            return Err(BackendError::NotFound(path.to_path_buf()));
        }
        Err(BackendError::Load(
            "Kokoro TTS feature is not enabled. Rebuild with --features kokoro-tts".to_string(),
        ))
    }

    fn is_loaded(&self) -> bool {
        false
    }

    fn generate_stream(&self, _request: SynthesisRequest) -> BackendResult<AudioStream> {
        Err(BackendError::NotLoaded)
    }

    fn unload(&self) {}
}

#[cfg(feature = "kokoro-tts")]
fn create_model(path: &Path, config: &OnnxConfig) -> BackendResult<LoadedModel> {
    let load_err = |what: &str, e: ort::Error| BackendError::Load(format!("{what}: {e}"));

    let mut builder =
        SessionBuilder::new().map_err(|e| load_err("failed to create session builder", e))?;
    builder = builder
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| load_err("failed to set optimization level", e))?;
    if config.num_threads > 0 {
        builder = builder
            .with_intra_threads(config.num_threads)
            .map_err(|e| load_err("failed to set intra threads", e))?
            .with_inter_threads(1)
            .map_err(|e| load_err("failed to set inter threads", e))?;
    }
    builder = builder
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .map_err(|e| load_err("failed to set execution providers", e))?;

    let session = builder
        .commit_from_file(path)
        .map_err(|e| load_err("failed to read model", e))?;

    let input_names: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
    tracing::debug!("Model inputs: {:?}", input_names);
    for required in [schema::STYLE, schema::SPEED] {
        if !input_names.contains(&required) {
            return Err(BackendError::Load(format!(
                "model missing '{required}' input, found {input_names:?}"
            )));
        }
    }

    let (tokens_key, audio_key) = if input_names.contains(&schema::timestamped::TOKENS) {
        (schema::timestamped::TOKENS, schema::timestamped::AUDIO)
    } else if input_names.contains(&schema::standard::TOKENS) {
        (schema::standard::TOKENS, schema::standard::AUDIO)
    } else {
        return Err(BackendError::Load(format!(
            "model missing tokens input, found {input_names:?}"
        )));
    };

    tracing::info!(
        "Kokoro model loaded from {} ({} outputs)",
        path.display(),
        session.outputs.len()
    );

    Ok(LoadedModel {
        session,
        tokens_key,
        audio_key,
    })
}

#[cfg(feature = "kokoro-tts")]
fn run_inference(model: &mut LoadedModel, request: SynthesisRequest) -> BackendResult<Vec<f32>> {
    let infer_err = |what: &str, e: ort::Error| BackendError::Inference(format!("{what}: {e}"));

    let mut tokens = Vec::with_capacity(request.tokens.len() + 2);
    tokens.push(PAD_TOKEN);
    tokens.extend(request.tokens);
    tokens.push(PAD_TOKEN);

    if request.style.len() != STYLE_DIM {
        return Err(BackendError::Inference(format!(
            "style vector has {} values, expected {STYLE_DIM}",
            request.style.len()
        )));
    }

    let tokens_tensor = Tensor::from_array(([1, tokens.len()], tokens))
        .map_err(|e| infer_err("failed to create tokens tensor", e))?;
    let style_tensor = Tensor::from_array(([1, STYLE_DIM], request.style))
        .map_err(|e| infer_err("failed to create style tensor", e))?;
    let speed_tensor = Tensor::from_array(([1], vec![request.speed]))
        .map_err(|e| infer_err("failed to create speed tensor", e))?;

    let inputs: Vec<(Cow<'static, str>, SessionInputValue<'static>)> = vec![
        (
            Cow::Borrowed(model.tokens_key),
            SessionInputValue::Owned(Value::from(tokens_tensor)),
        ),
        (
            Cow::Borrowed(schema::STYLE),
            SessionInputValue::Owned(Value::from(style_tensor)),
        ),
        (
            Cow::Borrowed(schema::SPEED),
            SessionInputValue::Owned(Value::from(speed_tensor)),
        ),
    ];

    let audio_key = model.audio_key;
    let outputs = model
        .session
        .run(SessionInputs::from(inputs))
        .map_err(|e| infer_err("session run failed", e))?;

    let audio = outputs
        .get(audio_key)
        .ok_or_else(|| BackendError::Inference(format!("model returned no '{audio_key}' output")))?;
    let (_, samples) = audio
        .try_extract_tensor::<f32>()
        .map_err(|e| infer_err("could not extract audio output", e))?;

    tracing::debug!("Inference complete: {} samples", samples.len());
    Ok(samples.to_vec())
}
