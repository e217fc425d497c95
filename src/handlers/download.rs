use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::core::audio::AudioFormat;
use crate::core::storage::resolve_download;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// GET /download/{filename}
///
/// Serves finalized temp artifacts only; partial files are never visible here.
pub async fn download_audio(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    info!("Download requested - filename={}", filename);

    let path = resolve_download(&state.core_state.temp_files.dir, &filename).await?;

    let content_type = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(AudioFormat::from_extension)
        .map(|format| format.content_type())
        .unwrap_or("application/octet-stream");

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        // Removed by cleanup between resolve and open
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("Download not found: {filename}")));
        }
        Err(e) => return Err(AppError::Processing(format!("Failed to open {filename}: {e}"))),
    };
    let length = file.metadata().await.map(|m| m.len()).ok();
    debug!("Serving {} ({:?} bytes)", path.display(), length);

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename={filename}"))
            .map_err(|e| AppError::Validation(e.to_string()))?,
    );
    if let Some(length) = length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}
