//! Error Types for the Shabaka proxy surface
//!
//! Errors here only ever reach the proxy's own endpoints and the process
//! entry point. Intercepted display traffic always receives a well-formed
//! response from the router instead.
//!
//! All errors are serialized as JSON `{code, message}` with an appropriate
//! HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use shabaka_core::{ControlError, PlayerError};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for proxy endpoint responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request body is not a valid control message or signal
    InvalidInput,

    /// Path is reserved for the proxy but has no endpoint
    NotFound,

    /// Configuration value rejected at startup
    InvalidConfig,

    /// Cache or queue operation failed
    StorageError,

    /// Upstream player server could not be reached
    UpstreamError,

    /// Install or activation failed
    LifecycleError,

    /// A background service is not running
    ServiceUnavailable,

    /// Internal error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::InvalidConfig => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::StorageError | ErrorCode::LifecycleError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// PROXY ERROR STRUCT
// ============================================================================

/// Structured error response for proxy endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

impl ProxyError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ProxyError {}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<PlayerError> for ProxyError {
    fn from(err: PlayerError) -> Self {
        let code = match &err {
            PlayerError::Storage(_) => ErrorCode::StorageError,
            PlayerError::Upstream(_) => ErrorCode::UpstreamError,
            PlayerError::Lifecycle(_) => ErrorCode::LifecycleError,
            PlayerError::Config(_) => ErrorCode::InvalidConfig,
            PlayerError::Control(ControlError::Malformed { .. }) => ErrorCode::InvalidInput,
            PlayerError::Control(ControlError::ServiceStopped) => ErrorCode::ServiceUnavailable,
        };
        if code.status_code().is_server_error() {
            tracing::error!(error = %err, "Proxy endpoint failed");
        }
        ProxyError::new(code, err.to_string())
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        ProxyError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

/// Result type alias for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;
