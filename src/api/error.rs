use axum::{
    Json,
    extract::rejection::PathRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::clients::{EnrichmentError, TransitError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    MissingParameter(String),

    #[error("{0}")]
    InvalidField(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable { service: &'static str, message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn invalid_field(msg: impl Into<String>) -> Self {
        ApiError::InvalidField(msg.into())
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParameter(_) | ApiError::InvalidField(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {err:?}");
                "An internal error occurred".to_string()
            }
            ApiError::UpstreamUnavailable { service, message } => {
                tracing::warn!("{service} error: {message}");
                format!("{service} is unavailable")
            }
            other => other.to_string(),
        };

        (self.status(), Json(json!({ "message": message }))).into_response()
    }
}

/// Ids that aren't integers never match a stored stop
impl From<PathRejection> for ApiError {
    fn from(err: PathRejection) -> Self {
        tracing::debug!("rejected path: {err}");
        ApiError::not_found("Not found.")
    }
}

impl From<TransitError> for ApiError {
    fn from(err: TransitError) -> Self {
        match err {
            TransitError::NotFound(_) => ApiError::not_found("Not found."),
            err => ApiError::UpstreamUnavailable {
                service: "Transit API",
                message: err.to_string(),
            },
        }
    }
}

impl From<EnrichmentError> for ApiError {
    fn from(err: EnrichmentError) -> Self {
        ApiError::UpstreamUnavailable {
            service: "Text generation",
            message: err.to_string(),
        }
    }
}
