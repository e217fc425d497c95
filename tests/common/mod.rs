#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use futures::StreamExt;
use ndarray::Array3;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

use kokoro_serve::backend::{
    AudioStream, BackendError, BackendResult, STYLE_DIM, SynthesisBackend, SynthesisRequest,
};
use kokoro_serve::text::PassthroughPhonemizer;
use kokoro_serve::{CoreState, ServerConfig, routes, state::AppState};

/// Backend double that emits one constant buffer per generation call
pub struct FakeBackend {
    pub loaded: AtomicBool,
    pub loads: AtomicUsize,
    pub unloads: AtomicUsize,
    pub generations: AtomicUsize,
    pub samples_per_chunk: usize,
    pub load_delay: Duration,
    pub missing_weights: bool,
    /// 1-based generation call that fails
    pub fail_on_call: Option<usize>,
}

impl FakeBackend {
    pub fn new(samples_per_chunk: usize) -> Self {
        Self {
            loaded: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
            unloads: AtomicUsize::new(0),
            generations: AtomicUsize::new(0),
            samples_per_chunk,
            load_delay: Duration::from_millis(0),
            missing_weights: false,
            fail_on_call: None,
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn generations(&self) -> usize {
        self.generations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SynthesisBackend for FakeBackend {
    async fn load(&self, path: &Path) -> BackendResult<()> {
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        if self.missing_weights {
            return Err(BackendError::NotFound(path.to_path_buf()));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    fn generate_stream(&self, _request: SynthesisRequest) -> BackendResult<AudioStream> {
        if !self.is_loaded() {
            return Err(BackendError::NotLoaded);
        }
        let call = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let item = if self.fail_on_call == Some(call) {
            Err(BackendError::Inference("synthetic failure".to_string()))
        } else {
            Ok(vec![0.5; self.samples_per_chunk])
        };
        Ok(futures::stream::iter(vec![item]).boxed())
    }

    fn unload(&self) {
        self.unloads.fetch_add(1, Ordering::SeqCst);
        self.loaded.store(false, Ordering::SeqCst);
    }
}

/// Write a `[rows, 1, 256]` voice pack filled with `value`
pub fn write_voice(dir: &Path, name: &str, rows: usize, value: f32) {
    let data = Array3::<f32>::from_elem((rows, 1, STYLE_DIM), value);
    ndarray_npy::write_npy(dir.join(format!("{name}.bin")), &data).unwrap();
}

/// A full application over a fake backend and scratch directories
pub struct TestApp {
    pub app: Router,
    pub state: Arc<AppState>,
    pub backend: Arc<FakeBackend>,
    pub voices_dir: TempDir,
    pub temp_dir: TempDir,
}

pub fn test_config(voices_dir: &TempDir, temp_dir: &TempDir) -> ServerConfig {
    ServerConfig {
        voices_dir: voices_dir.path().to_path_buf(),
        temp_file_dir: temp_dir.path().to_path_buf(),
        gap_trim_ms: 0,
        warmup_on_startup: false,
        ..Default::default()
    }
}

pub fn test_app_with(backend: FakeBackend, customize: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let voices_dir = TempDir::new().unwrap();
    let temp_dir = TempDir::new().unwrap();
    write_voice(voices_dir.path(), "af_heart", 8, 0.1);
    write_voice(voices_dir.path(), "af_bella", 8, 0.2);
    write_voice(voices_dir.path(), "bm_george", 8, 0.3);

    let mut config = test_config(&voices_dir, &temp_dir);
    customize(&mut config);

    let backend = Arc::new(backend);
    let core = CoreState::with_backend(&config, backend.clone(), Arc::new(PassthroughPhonemizer));
    let state = AppState::with_core(config, core);
    let app = routes::create_app(state.clone());

    TestApp {
        app,
        state,
        backend,
        voices_dir,
        temp_dir,
    }
}

pub fn test_app(samples_per_chunk: usize) -> TestApp {
    test_app_with(FakeBackend::new(samples_per_chunk), |_| {})
}
