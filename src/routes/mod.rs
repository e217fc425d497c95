pub mod api;
pub mod dev;

use axum::{
    Router,
    http::{HeaderName, HeaderValue},
    routing::get,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::config::ServerConfig;
use crate::handlers::api::{health, health_check};
use crate::state::AppState;

/// Assemble the full application: public, API and development routes
pub fn create_app(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health));

    let mut app = public_routes
        .merge(api::create_api_router())
        .merge(dev::create_dev_router());

    if let Some(cors) = cors_layer(&state.config) {
        app = app.layer(cors);
    }

    app.with_state(state)
}

/// CORS policy from config; `*` allows any origin
fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    if !config.cors_enabled {
        return None;
    }

    let origins = if config.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers([HeaderName::from_static("x-download-path")]),
    )
}
