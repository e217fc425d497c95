use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{download, models, speech, voices};
use crate::state::AppState;
use std::sync::Arc;

/// OpenAI-compatible routes plus temp file downloads
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/audio/speech", post(speech::create_speech))
        .route("/v1/audio/voices", get(voices::list_voices))
        .route("/v1/audio/voices/combine", post(voices::combine_voices))
        .route("/v1/models", get(models::list_models))
        .route("/v1/models/{model}", get(models::retrieve_model))
        .route("/download/{filename}", get(download::download_audio))
        .layer(TraceLayer::new_for_http())
}
