//! Application-wide error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sabil_funds::FundsError;
use thiserror::Error;
use tracing::error;

use crate::api::ErrorResponse;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Funds(#[from] FundsError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Image upload failed: {0}")]
    Upload(String),

    #[error("Media uploads are not configured")]
    MediaDisabled,

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, PortalError>;

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = match &self {
            PortalError::Funds(_) | PortalError::Validation(_) => StatusCode::BAD_REQUEST,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Conflict(_) => StatusCode::CONFLICT,
            PortalError::Unauthorized => StatusCode::UNAUTHORIZED,
            PortalError::Upload(_) => StatusCode::BAD_GATEWAY,
            PortalError::MediaDisabled => StatusCode::SERVICE_UNAVAILABLE,
            PortalError::Database(_)
            | PortalError::Migrate(_)
            | PortalError::Config(_)
            | PortalError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
