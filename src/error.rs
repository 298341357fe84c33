//! Error types for Waypost
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

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

    /// Validation error (400)
    ///
    /// Malformed or incomplete activity JSON. Raised before anything is
    /// persisted, so no side effect has been attempted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Remote fetch error (502)
    ///
    /// A GET against a remote actor profile or collection failed.
    /// Non-fatal once the triggering activity is already persisted.
    #[error("Remote fetch error: {0}")]
    RemoteFetch(String),

    /// Remote delivery error (502)
    ///
    /// A POST to a remote inbox failed or was rejected.
    /// Non-fatal once the triggering activity is already persisted.
    #[error("Remote delivery error: {0}")]
    RemoteDelivery(String),

    /// Key generation or signing error (500)
    ///
    /// Always fatal to the specific operation, never swallowed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Remote-side failures: the other server misbehaved, not us.
    ///
    /// The inbox processor treats these as non-fatal once the triggering
    /// activity is persisted.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            AppError::RemoteFetch(_) | AppError::RemoteDelivery(_) | AppError::HttpClient(_)
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation"),
            AppError::RemoteFetch(msg) => (StatusCode::BAD_GATEWAY, msg.clone(), "remote_fetch"),
            AppError::RemoteDelivery(msg) => {
                (StatusCode::BAD_GATEWAY, msg.clone(), "remote_delivery")
            }
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string(), "http_client"),
            AppError::Crypto(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "crypto"),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                "database",
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
