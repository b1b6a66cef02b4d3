use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Main error type for the Shrike gateway
#[derive(Debug)]
pub enum GatewayError {
    /// Configuration or CLI argument errors
    Config(String),

    /// A client exceeded its rate limit. Carries the admission metadata
    /// surfaced to the client alongside the 429.
    RateLimit {
        detail: String,
        remaining: u32,
        retry_after_seconds: f64,
    },

    /// A service's circuit breaker is open and calls are short-circuited
    CircuitOpen(String),

    /// Requested service name has no registered backends
    ServiceNotFound(String),

    /// Transport error or timeout while calling a backend
    Backend(String),

    /// System I/O errors
    Io(std::io::Error),

    /// JSON serialization/deserialization errors
    Serialization(serde_json::Error),

    /// Internal lock poisoning or concurrency errors
    Concurrency(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Config(msg) => write!(f, "Configuration error: {}", msg),
            GatewayError::RateLimit { detail, .. } => {
                write!(f, "Rate limit exceeded: {}", detail)
            }
            GatewayError::CircuitOpen(msg) => write!(f, "Circuit open: {}", msg),
            GatewayError::ServiceNotFound(msg) => write!(f, "Service not found: {}", msg),
            GatewayError::Backend(msg) => write!(f, "Backend unreachable: {}", msg),
            GatewayError::Io(err) => write!(f, "I/O error: {}", err),
            GatewayError::Serialization(err) => write!(f, "Serialization error: {}", err),
            GatewayError::Concurrency(msg) => write!(f, "Concurrency error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Io(err) => Some(err),
            GatewayError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Config(_) => StatusCode::BAD_REQUEST,
            GatewayError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::CircuitOpen(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::ServiceNotFound(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Backend(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Concurrency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the machine-readable error kind identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "configuration_error",
            GatewayError::RateLimit { .. } => "rate_limit_exceeded",
            GatewayError::CircuitOpen(_) => "circuit_open",
            GatewayError::ServiceNotFound(_) => "service_not_found",
            GatewayError::Backend(_) => "backend_unreachable",
            GatewayError::Io(_) => "io_error",
            GatewayError::Serialization(_) => "serialization_error",
            GatewayError::Concurrency(_) => "concurrency_error",
        }
    }

    /// JSON envelope for the HTTP response body. Rate-limit denials
    /// additionally carry their admission metadata.
    pub fn to_json(&self) -> serde_json::Value {
        let mut error = json!({
            "code": self.status_code().as_u16(),
            "message": self.to_string(),
            "type": self.error_type(),
        });
        if let GatewayError::RateLimit {
            remaining,
            retry_after_seconds,
            ..
        } = self
        {
            error["remaining"] = json!(remaining);
            error["retry_after_seconds"] = json!(retry_after_seconds);
        }
        json!({ "error": error })
    }
}

// Axum IntoResponse implementation for HTTP error responses
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

// Conversions from common error types
impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Io(err)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Serialization(err)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Backend(err.to_string())
    }
}
