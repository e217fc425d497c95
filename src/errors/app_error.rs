use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::core::audio::AudioError;
use crate::core::storage::TempFileError;
use crate::core::stream::StreamError;
use crate::core::voices::VoiceError;

/// Application error type
///
/// Every variant renders as `{"error": <category>, "message": <text>, "type": <kind>}`,
/// the shape OpenAI clients expect.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    InvalidModel(String),
    ModelNotFound(String),
    NotFound(String),
    PermissionDenied(String),
    Processing(String),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidModel(_) => StatusCode::BAD_REQUEST,
            AppError::ModelNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::Processing(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine readable category
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::InvalidModel(_) => "invalid_model",
            AppError::ModelNotFound(_) => "model_not_found",
            AppError::NotFound(_) => "not_found",
            AppError::PermissionDenied(_) => "permission_denied",
            AppError::Processing(_) => "processing_error",
            AppError::Internal(_) => "server_error",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::PermissionDenied(_) => "permission_error",
            AppError::Processing(_) | AppError::Internal(_) => "server_error",
            _ => "invalid_request_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation(msg)
            | AppError::InvalidModel(msg)
            | AppError::ModelNotFound(msg)
            | AppError::NotFound(msg)
            | AppError::PermissionDenied(msg)
            | AppError::Processing(msg)
            | AppError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}: {}", self.category(), self.message());
        } else {
            tracing::warn!("{}: {}", self.category(), self.message());
        }

        let body = Json(json!({
            "error": self.category(),
            "message": self.message(),
            "type": self.kind(),
        }));

        (status, body).into_response()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<StreamError> for AppError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Validation(msg) => AppError::Validation(msg),
            StreamError::Audio(e) => e.into(),
            other => AppError::Processing(other.to_string()),
        }
    }
}

impl From<VoiceError> for AppError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::NotFound { .. } | VoiceError::Invalid(_) => {
                AppError::Validation(err.to_string())
            }
            VoiceError::Io(_) | VoiceError::Format(_) => AppError::Processing(err.to_string()),
        }
    }
}

impl From<AudioError> for AppError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::UnsupportedFormat(_) => AppError::Validation(err.to_string()),
            AudioError::EmptyAudio => AppError::Processing(err.to_string()),
        }
    }
}

impl From<TempFileError> for AppError {
    fn from(err: TempFileError) -> Self {
        match err {
            TempFileError::InvalidName(_) => AppError::Validation(err.to_string()),
            TempFileError::NotFound(_) => AppError::NotFound(err.to_string()),
            TempFileError::AlreadyFinalized | TempFileError::Io(_) => {
                AppError::Processing(err.to_string())
            }
        }
    }
}

impl From<Box<dyn std::error::Error>> for AppError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        AppError::Internal(err.to_string())
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::path::PathBuf;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let (status, body) = body_json(AppError::InvalidModel("nope".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_model");
        assert_eq!(body["message"], "nope");
        assert_eq!(body["type"], "invalid_request_error");

        let (status, body) = body_json(AppError::PermissionDenied("off".to_string())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["type"], "permission_error");

        let (status, body) = body_json(AppError::Processing("boom".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "processing_error");
        assert_eq!(body["type"], "server_error");
    }

    #[test]
    fn test_conversions() {
        let err: AppError = VoiceError::NotFound {
            name: "xx".to_string(),
            available: vec!["af_heart".to_string()],
        }
        .into();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("af_heart")));

        let err: AppError = AudioError::UnsupportedFormat("mp3".to_string()).into();
        assert_eq!(err.category(), "validation_error");

        let err: AppError = StreamError::ResourceMissing(PathBuf::from("m.onnx")).into();
        assert_eq!(err.category(), "processing_error");

        let err: AppError = StreamError::Audio(AudioError::UnsupportedFormat("aac".into())).into();
        assert_eq!(err.category(), "validation_error");

        let err: AppError = TempFileError::NotFound("tmp1.wav".to_string()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
