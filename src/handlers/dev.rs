//! Development endpoints for inspecting and bypassing the text pipeline

use axum::{
    extract::State,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::audio::AudioFormat;
use crate::core::stream::StreamOptions;
use crate::core::text::{Chunk, PhonemeTokenizer, tokenize_phonemes, tokenize_phonemes_checked};
use crate::errors::{AppError, AppResult};
use crate::handlers::speech::{audio_headers, spawn_stream_body};
use crate::state::AppState;

fn default_language() -> String {
    "a".to_string()
}

#[derive(Debug, Deserialize)]
pub struct PhonemeRequest {
    pub text: String,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct PhonemeResponse {
    pub phonemes: String,
    pub tokens: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateFromPhonemesRequest {
    pub phonemes: String,
    /// Falls back to the configured default voice
    #[serde(default)]
    pub voice: Option<String>,
}

/// POST /dev/phonemize
pub async fn phonemize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PhonemeRequest>,
) -> AppResult<Json<PhonemeResponse>> {
    if request.text.trim().is_empty() {
        return Err(AppError::Validation("Text cannot be empty".to_string()));
    }

    let phonemizer = Arc::clone(state.core_state.orchestrator.phonemizer());
    let phonemes = tokio::task::spawn_blocking(move || {
        PhonemeTokenizer::new(phonemizer, request.language).phonemes(&request.text)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Phonemization task failed: {e}")))?;

    let tokens = tokenize_phonemes(&phonemes);
    Ok(Json(PhonemeResponse { phonemes, tokens }))
}

/// POST /dev/generate_from_phonemes
///
/// Streams WAV for a phoneme string, skipping normalization and chunking.
pub async fn generate_from_phonemes(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateFromPhonemesRequest>,
) -> AppResult<Response> {
    let phonemes = request.phonemes.trim();
    if phonemes.is_empty() {
        return Err(AppError::Validation("Phonemes cannot be empty".to_string()));
    }

    let tokens =
        tokenize_phonemes_checked(phonemes).map_err(|e| AppError::Validation(e.to_string()))?;
    if tokens.is_empty() {
        return Err(AppError::Validation(
            "Phonemes contain no known symbols".to_string(),
        ));
    }

    let voice_spec = request
        .voice
        .unwrap_or_else(|| state.config.default_voice.clone());
    let voice = state.core_state.voices.resolve(&voice_spec, None)?;

    let chunk = Chunk {
        text: phonemes.to_string(),
        tokens,
    };
    let options = StreamOptions {
        format: AudioFormat::Wav,
        speed: 1.0,
        artifact: None,
    };

    let headers = audio_headers(AudioFormat::Wav, true, None)?;
    let body = spawn_stream_body(
        Arc::clone(&state.core_state.orchestrator),
        vec![chunk],
        voice,
        options,
    );
    Ok((headers, body).into_response())
}
