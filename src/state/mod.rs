use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::CoreState;

/// Application state that can be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    /// Core layer state: model lifecycle, voices and the streaming pipeline
    pub core_state: Arc<CoreState>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let core_state = CoreState::new(&config);
        Self::with_core(config, core_state)
    }

    /// Wrap an already built core, e.g. one with a test backend
    pub fn with_core(config: ServerConfig, core_state: Arc<CoreState>) -> Arc<Self> {
        Arc::new(Self { config, core_state })
    }
}
