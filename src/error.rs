//! # Error Handling
//!
//! This module defines the application's error types and how they're converted
//! to HTTP responses, plus the session-scoped error taxonomy of the relay.
//!
//! ## Two layers of errors:
//! - **AppError**: HTTP-facing errors returned by REST handlers (config,
//!   grammar). Converted to JSON responses via the ResponseError trait.
//! - **RelayError**: errors scoped to one relay session. These never cross
//!   session boundaries; fatal ones are reported to the client as a single
//!   structured error frame before the connection closes.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the HTTP surface of the application.
///
/// ## Error Categories:
/// - **Internal**: Server-side problems (500 errors)
/// - **BadRequest**: Client sent invalid data (400 errors)
/// - **NotFound**: Requested resource doesn't exist (404 errors)
/// - **ConfigError**: Configuration problems (500 errors)
/// - **ValidationError**: Data validation failed (400 errors)
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Requested resource was not found
    NotFound(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// User input failed validation rules
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "bad_request",
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "not_found",
                msg.clone(),
            ),
            AppError::ConfigError(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                msg.clone(),
            ),
            AppError::ValidationError(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;

/// Errors scoped to a single relay session.
///
/// ## Propagation policy:
/// All of these stay inside their session. `UpstreamUnavailable` and the two
/// disconnect variants are terminal for the session; the relay performs a
/// full symmetric teardown and the client is responsible for reinitiating.
/// `UpstreamProtocolError` is forwarded without closing the session, and
/// `DecodeFailure` is logged and skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayError {
    /// Credential missing or upstream connection could not be established
    UpstreamUnavailable(String),

    /// Upstream emitted a protocol-level error frame
    UpstreamProtocolError(String),

    /// Malformed audio payload (skipped, never fatal)
    DecodeFailure(String),

    /// The client side of the session closed
    ClientDisconnect,

    /// The upstream side of the session closed
    UpstreamDisconnect,
}

impl RelayError {
    /// Whether this error terminates the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::UpstreamUnavailable(_)
                | RelayError::ClientDisconnect
                | RelayError::UpstreamDisconnect
        )
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::UpstreamUnavailable(msg) => write!(f, "Upstream unavailable: {}", msg),
            RelayError::UpstreamProtocolError(msg) => write!(f, "Upstream protocol error: {}", msg),
            RelayError::DecodeFailure(msg) => write!(f, "Audio decode failure: {}", msg),
            RelayError::ClientDisconnect => write!(f, "Client disconnected"),
            RelayError::UpstreamDisconnect => write!(f, "Upstream disconnected"),
        }
    }
}
