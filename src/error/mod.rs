use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use strum::IntoStaticStr;
use thiserror::Error;

use crate::fetch::FetchError;
use crate::models::PreviewError;

/// Every failure the service reports. The variant name is the machine-readable
/// `error` category in the response body.
#[derive(Error, Debug, IntoStaticStr)]
pub enum AppError {
    #[error("{0}")]
    InvalidUrl(String),

    #[error("{message}")]
    UpstreamFetchFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("{0}")]
    UnexpectedContentType(String),

    #[strum(serialize = "InternalError")]
    #[error("{0}")]
    Internal(String),

    #[error("Only GET is supported on this endpoint")]
    MethodNotAllowed,

    #[error("{0}")]
    NotFound(String),
}

impl AppError {
    pub fn category(&self) -> &'static str {
        self.into()
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            // Propagate the upstream status only when it is itself an error status.
            AppError::UpstreamFetchFailed {
                status: Some(code), ..
            } if (400..=599).contains(code) => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            AppError::UpstreamFetchFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::UnexpectedContentType(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::InvalidUrl(_) | FetchError::BlockedHost(_) => {
                AppError::InvalidUrl(e.to_string())
            }
            FetchError::UnexpectedContentType(_) => AppError::UnexpectedContentType(e.to_string()),
            FetchError::Status { status, .. } => AppError::UpstreamFetchFailed {
                status: Some(status),
                message: e.to_string(),
            },
            FetchError::Resolve { .. }
            | FetchError::Redirect(_)
            | FetchError::Timeout(_)
            | FetchError::Transport(_) => {
                AppError::UpstreamFetchFailed {
                    status: None,
                    message: e.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal server error");
            }
            AppError::UpstreamFetchFailed { .. } | AppError::UnexpectedContentType(_) => {
                tracing::warn!(error = %self, status = status.as_u16(), "Preview fetch failed");
            }
            _ => {}
        }

        let body = PreviewError::new(self.category(), self.to_string());
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
