//! OpenAI-compatible speech endpoint

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, header},
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use crate::core::audio::{AudioFormat, patch_wav_header};
use crate::core::storage::TempFileWriter;
use crate::core::stream::{
    BufferSink, StreamError, StreamOptions, StreamOrchestrator, StreamOutcome,
};
use crate::core::text::Chunk;
use crate::core::voices::ResolvedVoice;
use crate::errors::{AppError, AppResult};
use crate::handlers::models::is_supported_model;
use crate::state::AppState;

/// Encoded buffers queued between the synthesis task and the response body
const STREAM_BUFFER: usize = 16;

const MIN_SPEED: f32 = 0.25;
const MAX_SPEED: f32 = 4.0;

const X_ACCEL_BUFFERING: &str = "x-accel-buffering";
const X_DOWNLOAD_PATH: &str = "x-download-path";

/// A single voice spec or a list of voices to blend equally
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VoiceInput {
    Spec(String),
    List(Vec<String>),
}

impl VoiceInput {
    /// Collapse into a `a+b(0.5)` style spec
    pub fn to_spec(&self) -> String {
        match self {
            VoiceInput::Spec(spec) => spec.trim().to_string(),
            VoiceInput::List(voices) => voices
                .iter()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .collect::<Vec<_>>()
                .join("+"),
        }
    }
}

fn default_model() -> String {
    "kokoro".to_string()
}

fn default_response_format() -> String {
    AudioFormat::Mp3.to_string()
}

fn default_speed() -> f32 {
    1.0
}

fn default_stream() -> bool {
    true
}

/// Request body for POST /v1/audio/speech
#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    #[serde(default = "default_model")]
    pub model: String,
    pub input: String,
    /// Falls back to the configured default voice
    #[serde(default)]
    pub voice: Option<VoiceInput>,
    #[serde(default = "default_response_format")]
    pub response_format: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default)]
    pub return_download_link: bool,
    #[serde(default)]
    pub lang_code: Option<String>,
}

/// Headers shared by every audio response
pub(crate) fn audio_headers(
    format: AudioFormat,
    streaming: bool,
    download_path: Option<&str>,
) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    let disposition = format!("attachment; filename=speech.{}", format.extension());
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(|e| AppError::Internal(e.to_string()))?,
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if streaming {
        headers.insert(HeaderName::from_static(X_ACCEL_BUFFERING), HeaderValue::from_static("no"));
    }
    if let Some(path) = download_path {
        headers.insert(
            HeaderName::from_static(X_DOWNLOAD_PATH),
            HeaderValue::from_str(path).map_err(|e| AppError::Internal(e.to_string()))?,
        );
    }
    Ok(headers)
}

/// Chunk text off the async workers; phonemization can be slow
pub(crate) async fn chunk_in_background(
    orchestrator: &Arc<StreamOrchestrator>,
    text: String,
    language: String,
) -> AppResult<Vec<Chunk>> {
    let orchestrator = Arc::clone(orchestrator);
    let chunks = tokio::task::spawn_blocking(move || orchestrator.chunk_text(&text, &language))
        .await
        .map_err(|e| AppError::Internal(format!("Text processing task failed: {e}")))?;

    if chunks.is_empty() {
        return Err(AppError::Validation(
            "Text is empty after processing".to_string(),
        ));
    }
    Ok(chunks)
}

/// Run synthesis in its own task and expose it as a response body
///
/// Dropping the body closes the channel, which the orchestrator treats as a
/// client disconnect.
pub(crate) fn spawn_stream_body(
    orchestrator: Arc<StreamOrchestrator>,
    chunks: Vec<Chunk>,
    voice: ResolvedVoice,
    options: StreamOptions,
) -> Body {
    let (tx, rx) = mpsc::channel::<Result<Bytes, StreamError>>(STREAM_BUFFER);

    tokio::spawn(async move {
        let mut sink = tx;
        match orchestrator
            .stream_chunks(chunks, &voice, options, &mut sink)
            .await
        {
            Ok(StreamOutcome::Completed {
                chunks,
                bytes,
                download_path,
            }) => {
                info!(
                    "Speech stream completed: {} chunks, {} bytes, voice={}{}",
                    chunks,
                    bytes,
                    voice.name,
                    download_path
                        .map(|p| format!(", saved to {p}"))
                        .unwrap_or_default()
                );
            }
            Ok(StreamOutcome::Disconnected { chunks_forwarded }) => {
                info!(
                    "Client disconnected after {} chunks, stream stopped",
                    chunks_forwarded
                );
            }
            Err(e) => {
                error!("Speech stream failed: {}", e);
                let _ = sink.send(Err(e)).await;
            }
        }
    });

    Body::from_stream(ReceiverStream::new(rx))
}

/// POST /v1/audio/speech
pub async fn create_speech(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SpeechRequest>,
) -> AppResult<Response> {
    if !is_supported_model(&request.model) {
        return Err(AppError::InvalidModel(format!(
            "Unsupported model: {}",
            request.model
        )));
    }

    let format = request
        .response_format
        .parse::<AudioFormat>()?
        .ensure_encodable()?;

    if !(MIN_SPEED..=MAX_SPEED).contains(&request.speed) {
        return Err(AppError::Validation(format!(
            "Speed must be between {MIN_SPEED} and {MAX_SPEED}, got {}",
            request.speed
        )));
    }
    if request.input.trim().is_empty() {
        return Err(AppError::Validation("Input text cannot be empty".to_string()));
    }

    let voice_spec = request
        .voice
        .as_ref()
        .map(VoiceInput::to_spec)
        .unwrap_or_else(|| state.config.default_voice.clone());
    if voice_spec.is_empty() {
        return Err(AppError::Validation("No voices provided".to_string()));
    }

    let core = &state.core_state;
    let voice = core
        .voices
        .resolve(&voice_spec, request.lang_code.as_deref())?;

    info!(
        "Speech request - voice: {}, format: {}, stream: {}, text length: {}",
        voice.name,
        format,
        request.stream,
        request.input.len()
    );

    let chunks =
        chunk_in_background(&core.orchestrator, request.input, voice.language.clone()).await?;

    let artifact = if request.return_download_link {
        Some(TempFileWriter::create(&core.temp_files, format).await?)
    } else {
        None
    };

    let options = StreamOptions {
        format,
        speed: request.speed,
        artifact,
    };

    if request.stream {
        let download_path = options
            .artifact
            .as_ref()
            .map(|w| w.download_path().to_string());
        let headers = audio_headers(format, true, download_path.as_deref())?;
        let body = spawn_stream_body(Arc::clone(&core.orchestrator), chunks, voice, options);
        return Ok((headers, body).into_response());
    }

    let mut sink = BufferSink::default();
    let outcome = core
        .orchestrator
        .stream_chunks(chunks, &voice, options, &mut sink)
        .await?;
    let download_path = match outcome {
        StreamOutcome::Completed { download_path, .. } => download_path,
        StreamOutcome::Disconnected { .. } => None,
    };

    let mut body = sink.into_bytes();
    if format == AudioFormat::Wav {
        patch_wav_header(&mut body);
    }

    let headers = audio_headers(format, false, download_path.as_deref())?;
    Ok((headers, body.freeze()).into_response())
}
