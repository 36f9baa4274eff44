//! Server-specific error types: maps the core's error taxonomy (§7) to
//! HTTP status codes. Per-request logging of these lives in the request
//! logging middleware, not in the core.

use hls_core::HlsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Core(#[from] HlsError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal server error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, body) = match &self {
            ServerError::Core(HlsError::MediaNotFound(_)) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Core(HlsError::InvalidPath(_))
            | ServerError::Core(HlsError::InvalidSegmentName(_))
            | ServerError::Core(HlsError::UnknownQuality(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        (status, body).into_response()
    }
}
