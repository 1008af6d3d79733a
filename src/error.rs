//! Error types for Portalgate
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use thiserror::Error;

use crate::auth::ProviderError;
use crate::mail::MailError;

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Control transfer to another route (303)
    ///
    /// Raised by the auth gate when there is no identity to continue with,
    /// and by the entry pages when the caller is already signed in.
    /// Propagate it with `?`; it is rendered at the request boundary.
    #[error("Redirect to {location}")]
    Redirect { location: String },

    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Identity provider error (502, or the provider's own 4xx)
    #[error("Identity provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Email error (400 for an unusable recipient, otherwise 502)
    #[error("Email delivery error: {0}")]
    Mail(#[from] MailError),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn redirect(location: impl Into<String>) -> Self {
        AppError::Redirect {
            location: location.into(),
        }
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
            AppError::Redirect { location } => return Redirect::to(location).into_response(),
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), "unauthorized"),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation"),
            AppError::Provider(err) => (
                err.status_code().unwrap_or(StatusCode::BAD_GATEWAY),
                err.message(),
                "provider",
            ),
            AppError::Mail(MailError::InvalidRecipient(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string(), "validation")
            }
            AppError::Mail(_) => (StatusCode::BAD_GATEWAY, self.to_string(), "mail"),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, error_type, "Request failed");
        }

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
