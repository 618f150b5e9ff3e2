use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::upload::UploadError;

/// Failures surfaced by handlers. Expected denials (auth gate, bad
/// credentials) are redirects and never pass through here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Upload(e) => match e {
                UploadError::NoFile
                | UploadError::TooManyFiles(_)
                | UploadError::Malformed(_) => StatusCode::BAD_REQUEST,
                UploadError::DisallowedContentType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                UploadError::SizeLimitExceeded(_) => StatusCode::PAYLOAD_TOO_LARGE,
                UploadError::AlreadyExists(_) => StatusCode::CONFLICT,
                UploadError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "internal error");
            "internal server error".to_owned()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
