use axum::{Router, routing::post};
use tower_http::trace::TraceLayer;

use crate::handlers::dev;
use crate::state::AppState;
use std::sync::Arc;

/// Text pipeline development routes
pub fn create_dev_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dev/phonemize", post(dev::phonemize))
        .route(
            "/dev/generate_from_phonemes",
            post(dev::generate_from_phonemes),
        )
        .layer(TraceLayer::new_for_http())
}
