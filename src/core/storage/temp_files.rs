//! Downloadable copies of streamed audio
//!
//! While a response streams, the same bytes are appended to
//! `tmp<uuid>.<ext>.part`. Only a stream that completes is finalized: its
//! WAV sizes are patched and the file is renamed to `tmp<uuid>.<ext>`, which
//! is the only form `/download/{filename}` will serve. A writer dropped
//! before finalizing deletes its partial file.

use crate::core::audio::{AudioFormat, wav_size_fields, wav_size_offsets};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

const PART_SUFFIX: &str = ".part";
pub const DOWNLOAD_PREFIX: &str = "/download/";

#[derive(Debug, Error)]
pub enum TempFileError {
    #[error("Temp file already finalized")]
    AlreadyFinalized,

    #[error("Invalid download file name: {0}")]
    InvalidName(String),

    #[error("Download not found: {0}")]
    NotFound(String),

    #[error("Temp file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TempFileResult<T> = Result<T, TempFileError>;

/// Location and retention limits for temp artifacts
#[derive(Debug, Clone)]
pub struct TempFileConfig {
    pub dir: PathBuf,
    pub max_age: Duration,
    pub max_count: usize,
    pub max_dir_size_bytes: u64,
}

impl Default for TempFileConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("temp_files"),
            max_age: Duration::from_secs(3600),
            max_count: 3,
            max_dir_size_bytes: 2048 * 1024 * 1024,
        }
    }
}

struct Entry {
    path: PathBuf,
    modified: SystemTime,
    size: u64,
    partial: bool,
}

async fn scan(dir: &Path) -> std::io::Result<Vec<Entry>> {
    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let meta = match entry.metadata().await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => continue,
            Err(e) => {
                warn!("Failed to stat temp file {}: {}", entry.path().display(), e);
                continue;
            }
        };
        let path = entry.path();
        let partial = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(PART_SUFFIX));
        entries.push(Entry {
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            size: meta.len(),
            partial,
            path,
        });
    }
    entries.sort_by_key(|e| e.modified);
    Ok(entries)
}

/// Enforce the age, count and size limits, oldest files first
///
/// Never fails; problems are logged and the remaining files are left alone.
pub async fn cleanup_temp_files(config: &TempFileConfig) {
    if let Err(e) = fs::create_dir_all(&config.dir).await {
        warn!(
            "Failed to create temp directory {}: {}",
            config.dir.display(),
            e
        );
        return;
    }

    let entries = match scan(&config.dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Error during temp file cleanup: {}", e);
            return;
        }
    };

    let now = SystemTime::now();
    let mut remaining_count = entries.len();
    let mut remaining_size: u64 = entries.iter().map(|e| e.size).sum();

    for entry in entries {
        let age = now.duration_since(entry.modified).unwrap_or_default();
        let reason = if age > config.max_age {
            "expired"
        } else if entry.partial {
            continue;
        } else if remaining_count > config.max_count {
            "over count limit"
        } else if remaining_size > config.max_dir_size_bytes {
            "over size limit"
        } else {
            continue;
        };

        match fs::remove_file(&entry.path).await {
            Ok(()) => {
                remaining_count -= 1;
                remaining_size = remaining_size.saturating_sub(entry.size);
                info!("Deleted temp file {} ({})", entry.path.display(), reason);
            }
            Err(e) => warn!(
                "Failed to delete temp file {}: {}",
                entry.path.display(),
                e
            ),
        }
    }
}

/// Append-only download artifact for one response
pub struct TempFileWriter {
    file: Option<File>,
    part_path: PathBuf,
    final_path: PathBuf,
    download_path: String,
    format: AudioFormat,
    bytes_written: u64,
    finalized: bool,
}

impl TempFileWriter {
    /// Clean up old artifacts, then open a fresh partial file
    pub async fn create(config: &TempFileConfig, format: AudioFormat) -> TempFileResult<Self> {
        cleanup_temp_files(config).await;
        fs::create_dir_all(&config.dir).await?;

        let name = format!("tmp{}.{}", Uuid::new_v4().simple(), format.extension());
        let final_path = config.dir.join(&name);
        let part_path = config.dir.join(format!("{name}{PART_SUFFIX}"));
        let file = File::create(&part_path).await?;

        debug!("Opened temp file {}", part_path.display());
        Ok(Self {
            file: Some(file),
            part_path,
            final_path,
            download_path: format!("{DOWNLOAD_PREFIX}{name}"),
            format,
            bytes_written: 0,
            finalized: false,
        })
    }

    /// Public path the artifact will be served under once finalized
    pub fn download_path(&self) -> &str {
        &self.download_path
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub async fn write(&mut self, data: &[u8]) -> TempFileResult<()> {
        let file = self.open_file()?;
        file.write_all(data).await?;
        file.flush().await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Patch headers, publish under the final name and return the download path
    pub async fn finalize(&mut self) -> TempFileResult<String> {
        let format = self.format;
        let total = self.bytes_written;
        let file = self.open_file()?;

        if format == AudioFormat::Wav && total >= crate::core::audio::WAV_HEADER_LEN as u64 {
            let (riff_size, data_size) = wav_size_fields(total);
            let (riff_offset, data_offset) = wav_size_offsets();
            file.seek(SeekFrom::Start(riff_offset as u64)).await?;
            file.write_all(&riff_size.to_le_bytes()).await?;
            file.seek(SeekFrom::Start(data_offset as u64)).await?;
            file.write_all(&data_size.to_le_bytes()).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        self.file = None;

        fs::rename(&self.part_path, &self.final_path).await?;
        self.finalized = true;
        info!(
            "Finalized temp file {} ({} bytes)",
            self.final_path.display(),
            total
        );
        Ok(self.download_path.clone())
    }

    fn open_file(&mut self) -> TempFileResult<&mut File> {
        if self.finalized {
            return Err(TempFileError::AlreadyFinalized);
        }
        self.file.as_mut().ok_or(TempFileError::AlreadyFinalized)
    }
}

impl Drop for TempFileWriter {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        self.file = None;
        match std::fs::remove_file(&self.part_path) {
            Ok(()) => debug!("Removed unfinished temp file {}", self.part_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove unfinished temp file {}: {}",
                self.part_path.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
impl TempFileWriter {
    /// Swap in a read-only handle so the next write fails
    pub(crate) async fn reopen_read_only(&mut self) {
        self.file = Some(File::open(&self.part_path).await.unwrap());
    }
}

/// Map a requested download name to a finalized artifact in `dir`
pub async fn resolve_download(dir: &Path, filename: &str) -> TempFileResult<PathBuf> {
    let invalid =
        filename.is_empty() || filename.contains(['/', '\\']) || filename.contains("..");
    if invalid {
        return Err(TempFileError::InvalidName(filename.to_string()));
    }
    // Unfinished artifacts do not exist as far as clients are concerned
    if filename.ends_with(PART_SUFFIX) {
        return Err(TempFileError::NotFound(filename.to_string()));
    }

    let path = dir.join(filename);
    match fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        _ => Err(TempFileError::NotFound(filename.to_string())),
    }
}
