use std::sync::PoisonError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),
    #[error("random source unavailable: {0}")]
    Random(#[from] rand::Error),
    #[error("internal server error")]
    Internal,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn capability(message: impl Into<String>) -> Self {
        Self::CapabilityUnavailable(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::CapabilityUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Migration(_) | Self::Random(_) | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl<T> From<PoisonError<T>> for AppError {
    fn from(_: PoisonError<T>) -> Self {
        Self::Internal
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Validation(msg) | Self::CapabilityUnavailable(msg) => msg,
            Self::Database(err) => {
                error!(error = %err, "database operation failed");
                err.to_string()
            }
            Self::Migration(err) => {
                error!(error = %err, "database migration failed");
                "database migration failed".to_string()
            }
            Self::Random(err) => {
                error!(error = %err, "random byte source failed");
                "random source unavailable".to_string()
            }
            Self::Internal => "internal server error".to_string(),
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}
