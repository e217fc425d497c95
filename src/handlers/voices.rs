use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::handlers::speech::VoiceInput;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct VoicesResponse {
    /// Base voice names, sorted
    pub voices: Vec<String>,
}

/// GET /v1/audio/voices
pub async fn list_voices(State(state): State<Arc<AppState>>) -> Json<VoicesResponse> {
    Json(VoicesResponse {
        voices: state.core_state.voices.list_voices(),
    })
}

/// POST /v1/audio/voices/combine
///
/// Accepts `"a+b(0.5)"` or `["a", "b"]` and returns the blended voice pack
/// in the same NPY layout as the files in the voices directory.
pub async fn combine_voices(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VoiceInput>,
) -> AppResult<Response> {
    if !state.config.allow_local_voice_saving {
        return Err(AppError::PermissionDenied(
            "Local voice saving is disabled".to_string(),
        ));
    }

    let spec = request.to_spec();
    if spec.is_empty() {
        return Err(AppError::Validation("No voices provided".to_string()));
    }

    let voices = Arc::clone(&state.core_state.voices);
    let combine_spec = spec.clone();
    let npy = tokio::task::spawn_blocking(move || voices.combine(&combine_spec))
        .await
        .map_err(|e| AppError::Internal(format!("Voice combination task failed: {e}")))??;
    info!("Combined voice '{}' ({} bytes)", spec, npy.len());

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{spec}.bin\""))
            .map_err(|e| AppError::Validation(format!("Invalid voice name: {e}")))?,
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    Ok((headers, npy).into_response())
}
