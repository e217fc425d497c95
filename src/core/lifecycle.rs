//! Model lifecycle management
//!
//! [`ModelLifecycleManager`] owns the single synthesis backend shared by all
//! requests. A `tokio::sync::RwLock<()>` gates it:
//!
//! - loading and unloading take the exclusive side, so only one load is ever
//!   in flight and concurrent callers queue behind it;
//! - each chunk's inference stream holds the shared side until it is dropped,
//!   so an idle unload can never pull the model out from under a generation.
//!
//! When idle unloading is enabled a background watchdog checks the
//! [`ActivityClock`] once a minute and unloads the backend after the
//! configured idle timeout, skipping any tick where a generation still holds
//! the gate. The next `generate` reloads it inline.

use crate::core::backend::{BackendError, SynthesisBackend, SynthesisRequest};
use futures::StreamExt;
use futures::stream::BoxStream;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How often the idle watchdog wakes up
pub const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Model weights are missing; retrying will not help
    #[error("Model weights not found at {}", .0.display())]
    ResourceMissing(PathBuf),

    #[error("Model failed to load: {0}")]
    Load(#[source] BackendError),

    #[error("Generation failed: {0}")]
    Generation(#[source] BackendError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Audio buffers for one chunk, holding the backend's shared gate while alive
pub type GenerationStream = BoxStream<'static, LifecycleResult<Vec<f32>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendState {
    Unloaded,
    Initializing,
    Loaded,
}

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub model_path: PathBuf,
    pub unload_after_idle: bool,
    pub idle_timeout: Duration,
    pub check_interval: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/onnx/model_quantized.onnx"),
            unload_after_idle: false,
            idle_timeout: Duration::from_secs(300),
            check_interval: IDLE_CHECK_INTERVAL,
        }
    }
}

/// Snapshot for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleStatus {
    pub state: BackendState,
    pub idle_seconds: u64,
    pub idle_unload: bool,
}

/// Instant of the most recent generation request
#[derive(Debug)]
pub struct ActivityClock {
    last: Mutex<Instant>,
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(Instant::now()),
        }
    }

    pub fn touch(&self) {
        let now = Instant::now();
        let mut last = self.last.lock();
        if now > *last {
            *last = now;
        }
    }

    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(*self.last.lock())
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

struct Watchdog {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Resets the state to `Unloaded` if a load is abandoned half way
struct InitGuard<'a> {
    state: &'a RwLock<BackendState>,
    armed: bool,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.state.write() = BackendState::Unloaded;
        }
    }
}

pub struct ModelLifecycleManager {
    backend: Arc<dyn SynthesisBackend>,
    config: LifecycleConfig,
    gate: Arc<tokio::sync::RwLock<()>>,
    state: RwLock<BackendState>,
    clock: ActivityClock,
    watchdog: Mutex<Option<Watchdog>>,
}

impl ModelLifecycleManager {
    pub fn new(backend: Arc<dyn SynthesisBackend>, config: LifecycleConfig) -> Self {
        Self {
            backend,
            config,
            gate: Arc::new(tokio::sync::RwLock::new(())),
            state: RwLock::new(BackendState::Unloaded),
            clock: ActivityClock::new(),
            watchdog: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn state(&self) -> BackendState {
        *self.state.read()
    }

    pub fn clock(&self) -> &ActivityClock {
        &self.clock
    }

    pub fn status(&self) -> LifecycleStatus {
        LifecycleStatus {
            state: self.state(),
            idle_seconds: self.clock.idle_for().as_secs(),
            idle_unload: self.config.unload_after_idle,
        }
    }

    fn is_ready(&self) -> bool {
        self.state() == BackendState::Loaded && self.backend.is_loaded()
    }

    /// Load the backend unless it is already loaded
    ///
    /// Concurrent callers share one load: the first to take the exclusive gate
    /// loads, the rest find the backend loaded once they get it.
    pub async fn ensure_ready(&self) -> LifecycleResult<()> {
        if self.is_ready() {
            return Ok(());
        }

        let _gate = self.gate.write().await;
        if self.is_ready() {
            return Ok(());
        }

        *self.state.write() = BackendState::Initializing;
        let mut init = InitGuard {
            state: &self.state,
            armed: true,
        };

        let started = std::time::Instant::now();
        let path = &self.config.model_path;
        info!("Loading model from {}", path.display());

        match self.backend.load(path).await {
            Ok(()) => {
                init.armed = false;
                *self.state.write() = BackendState::Loaded;
                info!("Model loaded in {:?}", started.elapsed());
                Ok(())
            }
            Err(BackendError::NotFound(missing)) => {
                error!(
                    "Model weights not found at {}. Download the Kokoro ONNX model and set \
                     MODEL_PATH to its location.",
                    missing.display()
                );
                Err(LifecycleError::ResourceMissing(missing))
            }
            Err(e) => {
                error!("Failed to load model: {}", e);
                Err(LifecycleError::Load(e))
            }
        }
    }

    /// Start inference for one chunk, reloading the backend if it was unloaded
    pub async fn generate(&self, request: SynthesisRequest) -> LifecycleResult<GenerationStream> {
        self.clock.touch();

        loop {
            let guard = Arc::clone(&self.gate).read_owned().await;
            if self.is_ready() {
                let stream = self
                    .backend
                    .generate_stream(request)
                    .map_err(LifecycleError::Generation)?;

                return Ok(stream
                    .map(move |buffer| {
                        let _shared = &guard;
                        buffer.map_err(LifecycleError::Generation)
                    })
                    .boxed());
            }

            drop(guard);
            debug!("Backend not loaded, loading before generation");
            self.ensure_ready().await?;
        }
    }

    /// Unload the backend; a no-op when nothing is loaded
    pub async fn unload(&self) {
        let _gate = self.gate.write().await;
        self.unload_locked();
    }

    fn unload_locked(&self) {
        if self.state() != BackendState::Loaded {
            debug!("Unload requested but model is not loaded");
            return;
        }
        self.backend.unload();
        *self.state.write() = BackendState::Unloaded;
        info!("Model unloaded");
    }

    /// One watchdog tick
    ///
    /// Never queues on the gate: a queued writer would stall new readers, so a
    /// backend that is busy or recently used is left alone until a later tick.
    fn unload_if_idle(&self) {
        if self.state() != BackendState::Loaded
            || self.clock.idle_for() <= self.config.idle_timeout
        {
            return;
        }
        let Ok(_gate) = self.gate.try_write() else {
            debug!("Model idle past timeout but in use, skipping unload");
            return;
        };
        let idle = self.clock.idle_for();
        if idle > self.config.idle_timeout {
            info!(
                "Model idle for {}s (timeout {}s), unloading",
                idle.as_secs(),
                self.config.idle_timeout.as_secs()
            );
            self.unload_locked();
        }
    }

    /// Start (or restart) the idle watchdog
    ///
    /// Does nothing unless idle unloading is enabled. The task holds only a
    /// weak reference, so it ends on its own once the manager is dropped.
    pub fn start_idle_watchdog(self: &Arc<Self>) {
        if !self.config.unload_after_idle {
            debug!("Idle unloading disabled, watchdog not started");
            return;
        }

        let token = CancellationToken::new();
        let task_token = token.clone();
        let manager: Weak<Self> = Arc::downgrade(self);
        let period = self.config.check_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(manager) = manager.upgrade() else {
                            break;
                        };
                        manager.unload_if_idle();
                    }
                }
            }
            debug!("Idle watchdog stopped");
        });

        info!(
            "Idle watchdog started (timeout {}s, checking every {}s)",
            self.config.idle_timeout.as_secs(),
            period.as_secs()
        );

        if let Some(previous) = self.watchdog.lock().replace(Watchdog { token, handle }) {
            previous.token.cancel();
        }
    }

    pub fn stop_idle_watchdog(&self) {
        if let Some(watchdog) = self.watchdog.lock().take() {
            watchdog.token.cancel();
        }
    }

    pub fn watchdog_running(&self) -> bool {
        self.watchdog
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Load, start the watchdog and run one throwaway generation
    pub async fn initialize_with_warmup(
        self: &Arc<Self>,
        request: SynthesisRequest,
    ) -> LifecycleResult<Duration> {
        let started = std::time::Instant::now();
        self.ensure_ready().await?;
        self.start_idle_watchdog();

        let mut stream = self.generate(request).await?;
        let mut samples = 0usize;
        while let Some(buffer) = stream.next().await {
            samples += buffer?.len();
        }
        if samples == 0 {
            warn!("Warmup generation produced no audio");
        }

        let elapsed = started.elapsed();
        info!("Model warmed up in {:?} ({} samples)", elapsed, samples);
        Ok(elapsed)
    }
}

impl Drop for ModelLifecycleManager {
    fn drop(&mut self) {
        if let Some(watchdog) = self.watchdog.get_mut().take() {
            watchdog.token.cancel();
        }
    }
}
