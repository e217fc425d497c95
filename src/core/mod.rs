pub mod audio;
pub mod backend;
pub mod lifecycle;
pub mod state;
pub mod storage;
pub mod stream;
pub mod text;
pub mod voices;

// Re-export commonly used types for convenience
pub use audio::{AudioError, AudioFormat};
pub use backend::{BackendError, SynthesisBackend, SynthesisRequest};
pub use lifecycle::{BackendState, LifecycleConfig, LifecycleError, ModelLifecycleManager};
pub use stream::{AudioSink, StreamError, StreamOptions, StreamOrchestrator, StreamOutcome};
pub use text::{Chunk, ChunkLimits, TextChunker};
pub use voices::{ResolvedVoice, VoiceError, VoiceStore};

// Re-export CoreState for external use
pub use state::{CoreState, InitError, WarmupReport};
