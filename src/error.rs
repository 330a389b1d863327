//! Error types for DeepWiki
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::data::RemoteError;

/// Message shown when a favorite already exists for the post
pub const ALREADY_FAVORITED_MESSAGE: &str = "This post is already in your favorites";

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Access denied (403)
    #[error("Access denied")]
    Forbidden,

    /// Validation error (400)
    ///
    /// Raised before any remote request is built.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unprocessable entity (422)
    #[error("Unprocessable entity: {0}")]
    Unprocessable(String),

    /// Duplicate favorite (409)
    #[error("This post is already in your favorites")]
    AlreadyFavorited,

    /// Remote data service failure (502)
    #[error("Remote data service error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Template rendering error (500)
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// HTTP status and short machine-readable kind for this error
    pub fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            AppError::Unprocessable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable"),
            AppError::AlreadyFavorited => (StatusCode::CONFLICT, "already_favorited"),
            AppError::Remote(RemoteError::NotFound) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Remote(_) => (StatusCode::BAD_GATEWAY, "remote"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            AppError::Template(_) => (StatusCode::INTERNAL_SERVER_ERROR, "template"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }

    /// Message safe to show to the user
    ///
    /// Backend and internal details are logged, never displayed.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::Unprocessable(msg) => msg.clone(),
            AppError::AlreadyFavorited => ALREADY_FAVORITED_MESSAGE.to_string(),
            AppError::Remote(RemoteError::NotFound) | AppError::NotFound => {
                "Post not found or no longer available.".to_string()
            }
            AppError::Remote(_) => {
                "The data service is unavailable. Please try again.".to_string()
            }
            AppError::Config(msg) => msg.clone(),
            AppError::Template(_) | AppError::Internal(_) => "Internal server error".to_string(),
            AppError::Unauthorized | AppError::Forbidden => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_type) = self.status_and_kind();
        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::error!(error = %self, kind = error_type, "Request failed");
        }

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL
            .with_label_values(&[error_type, "unknown"])
            .inc();

        let body = Json(serde_json::json!({
            "error": self.user_message(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
