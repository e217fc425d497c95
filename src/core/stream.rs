//! Per-request streaming synthesis
//!
//! [`StreamOrchestrator`] turns a text request into encoded audio: chunk the
//! text, generate each chunk through the lifecycle manager, trim and encode
//! every buffer, and push it to the client. When a download copy was
//! requested each buffer is written to the temp artifact before it is sent.
//!
//! Chunks are strictly sequential. Each chunk is fully synthesized before its
//! audio is sent, so a slow client never holds the backend. The client's
//! liveness is checked before each chunk starts and before each buffer is
//! forwarded; once the client is gone no further chunk is generated and the
//! artifact is discarded.

use crate::core::audio::{AudioError, AudioFormat, AudioNormalizer, StreamingAudioEncoder};
use crate::core::backend::{SAMPLE_RATE, SynthesisRequest};
use crate::core::lifecycle::{LifecycleError, ModelLifecycleManager};
use crate::core::storage::TempFileWriter;
use crate::core::text::{Chunk, ChunkLimits, PhonemeTokenizer, Phonemizer, TextChunker};
use crate::core::voices::ResolvedVoice;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("{0}")]
    Validation(String),

    #[error("Model weights not found at {}", .0.display())]
    ResourceMissing(PathBuf),

    #[error("Audio generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl From<LifecycleError> for StreamError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::ResourceMissing(path) => StreamError::ResourceMissing(path),
            other => StreamError::Generation(other.to_string()),
        }
    }
}

/// Where encoded audio goes
#[async_trait]
pub trait AudioSink: Send {
    /// False once the consumer has gone away
    fn is_connected(&self) -> bool;

    /// Deliver one buffer; false means the consumer is gone
    async fn send(&mut self, bytes: Bytes) -> bool;
}

/// Sender half feeding an HTTP response body
#[async_trait]
impl AudioSink for mpsc::Sender<Result<Bytes, StreamError>> {
    fn is_connected(&self) -> bool {
        !self.is_closed()
    }

    async fn send(&mut self, bytes: Bytes) -> bool {
        mpsc::Sender::send(self, Ok(bytes)).await.is_ok()
    }
}

/// Collects the whole response in memory
#[derive(Debug, Default)]
pub struct BufferSink {
    data: BytesMut,
}

impl BufferSink {
    pub fn into_bytes(self) -> BytesMut {
        self.data
    }
}

#[async_trait]
impl AudioSink for BufferSink {
    fn is_connected(&self) -> bool {
        true
    }

    async fn send(&mut self, bytes: Bytes) -> bool {
        self.data.extend_from_slice(&bytes);
        true
    }
}

/// Output settings for one request
pub struct StreamOptions {
    pub format: AudioFormat,
    pub speed: f32,
    /// Download copy, finalized only if the whole stream completes
    pub artifact: Option<TempFileWriter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed {
        chunks: usize,
        bytes: u64,
        download_path: Option<String>,
    },
    Disconnected {
        chunks_forwarded: usize,
    },
}

pub struct StreamOrchestrator {
    lifecycle: Arc<ModelLifecycleManager>,
    phonemizer: Arc<dyn Phonemizer>,
    limits: ChunkLimits,
    gap_trim_ms: u32,
}

impl StreamOrchestrator {
    pub fn new(
        lifecycle: Arc<ModelLifecycleManager>,
        phonemizer: Arc<dyn Phonemizer>,
        limits: ChunkLimits,
        gap_trim_ms: u32,
    ) -> Self {
        Self {
            lifecycle,
            phonemizer,
            limits,
            gap_trim_ms,
        }
    }

    pub fn lifecycle(&self) -> &Arc<ModelLifecycleManager> {
        &self.lifecycle
    }

    pub fn phonemizer(&self) -> &Arc<dyn Phonemizer> {
        &self.phonemizer
    }

    /// Split text into chunks with the voice's language
    pub fn chunk_text(&self, text: &str, language: &str) -> Vec<Chunk> {
        let tokenizer = PhonemeTokenizer::new(Arc::clone(&self.phonemizer), language);
        TextChunker::new(tokenizer, self.limits).chunk(text)
    }

    /// Synthesize `text` and stream it into `sink`
    pub async fn stream_text<S: AudioSink>(
        &self,
        text: &str,
        voice: &ResolvedVoice,
        options: StreamOptions,
        sink: &mut S,
    ) -> Result<StreamOutcome, StreamError> {
        let chunks = self.chunk_text(text, &voice.language);
        if chunks.is_empty() {
            return Err(StreamError::Validation(
                "Text is empty after processing".to_string(),
            ));
        }
        self.stream_chunks(chunks, voice, options, sink).await
    }

    /// Stream already tokenized chunks into `sink`
    pub async fn stream_chunks<S: AudioSink>(
        &self,
        chunks: Vec<Chunk>,
        voice: &ResolvedVoice,
        options: StreamOptions,
        sink: &mut S,
    ) -> Result<StreamOutcome, StreamError> {
        let StreamOptions {
            format,
            speed,
            mut artifact,
        } = options;
        let mut encoder = StreamingAudioEncoder::new(format, SAMPLE_RATE)?;
        let normalizer = AudioNormalizer::new(self.gap_trim_ms, SAMPLE_RATE);

        let total_chunks = chunks.len();
        let mut chunks_forwarded = 0usize;
        let mut bytes_sent = 0u64;
        let mut header_sent = false;

        for (index, chunk) in chunks.into_iter().enumerate() {
            if !sink.is_connected() {
                info!(
                    "Client disconnected before chunk {}/{}, stopping",
                    index + 1,
                    total_chunks
                );
                return Ok(StreamOutcome::Disconnected { chunks_forwarded });
            }

            debug!(
                "Generating chunk {}/{} ({} tokens)",
                index + 1,
                total_chunks,
                chunk.token_count()
            );
            let request = SynthesisRequest {
                style: voice.pack.style_for(chunk.token_count()),
                tokens: chunk.tokens,
                speed,
                language: voice.language.clone(),
            };

            let buffers = self.synthesize_chunk(request).await.inspect_err(|e| {
                error!("Generation failed for chunk {}/{}: {}", index + 1, total_chunks, e)
            })?;

            for samples in buffers {
                if samples.is_empty() {
                    warn!("No audio generated for chunk {}/{}", index + 1, total_chunks);
                    continue;
                }

                let pcm = normalizer.normalize(&samples)?;
                let encoded = encoder.encode(&pcm, !header_sent);
                let len = encoded.len() as u64;

                if !forward(sink, &mut artifact, encoded).await {
                    info!(
                        "Client disconnected during chunk {}/{}, stopping",
                        index + 1,
                        total_chunks
                    );
                    return Ok(StreamOutcome::Disconnected { chunks_forwarded });
                }
                header_sent = true;
                bytes_sent += len;
            }
            chunks_forwarded += 1;
        }

        if !header_sent {
            warn!("No audio was produced for any of {} chunks", total_chunks);
            return Ok(StreamOutcome::Completed {
                chunks: chunks_forwarded,
                bytes: 0,
                download_path: None,
            });
        }

        let trailer = encoder.finish();
        if !trailer.is_empty() {
            let len = trailer.len() as u64;
            if !forward(sink, &mut artifact, trailer).await {
                return Ok(StreamOutcome::Disconnected { chunks_forwarded });
            }
            bytes_sent += len;
        }

        let download_path = match artifact.as_mut() {
            Some(writer) => match writer.finalize().await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Failed to finalize download file: {}", e);
                    None
                }
            },
            None => None,
        };

        info!(
            "Streamed {} chunks ({} bytes of {})",
            chunks_forwarded, bytes_sent, format
        );
        Ok(StreamOutcome::Completed {
            chunks: chunks_forwarded,
            bytes: bytes_sent,
            download_path,
        })
    }

    /// Run one chunk's inference to completion
    ///
    /// The generation stream, and with it the backend's shared gate, is gone
    /// before any of the audio is handed to the client.
    async fn synthesize_chunk(
        &self,
        request: SynthesisRequest,
    ) -> Result<Vec<Vec<f32>>, LifecycleError> {
        let mut audio = self.lifecycle.generate(request).await?;
        let mut buffers = Vec::new();
        while let Some(buffer) = audio.next().await {
            buffers.push(buffer?);
        }
        Ok(buffers)
    }
}

/// Write to the artifact, then send to the client
///
/// A failed artifact write drops the artifact and the client carries on.
/// Returns false when the client is gone.
async fn forward<S: AudioSink>(
    sink: &mut S,
    artifact: &mut Option<TempFileWriter>,
    bytes: Bytes,
) -> bool {
    if !sink.is_connected() {
        return false;
    }

    if let Some(writer) = artifact.as_mut() {
        if let Err(e) = writer.write(&bytes).await {
            warn!("Abandoning download file after write error: {}", e);
            *artifact = None;
        }
    }

    sink.send(bytes).await
}
