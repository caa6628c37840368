//! Error types for the GPUniq core library
//!
//! Every failure a call can produce is one variant of [`Error`]. Each variant
//! carries a stable machine-readable code (see [`Error::code`]) next to the
//! human-readable message produced by `Display`.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::job::JobStatus;

/// Main error type for GPUniq operations
#[derive(Error, Debug)]
pub enum Error {
    /// Bad, expired or missing API key (401/403)
    #[error("Authentication failed: {message}")]
    Authentication { message: String, http_status: u16 },

    /// Quota exceeded (429), surfaced once the retry ceiling is reached
    #[error("Rate limit exceeded: {message} (retry after {}s)", .retry_after.as_secs())]
    RateLimit {
        message: String,
        retry_after: Duration,
    },

    /// Missing resource (404)
    #[error("Resource not found: {resource}")]
    NotFound { resource: String, message: String },

    /// Catch-all server or validation error
    #[error("Platform error: {message}")]
    Platform {
        message: String,
        error_code: Option<String>,
        http_status: Option<u16>,
        details: Option<Value>,
    },

    /// A single call exceeded its local deadline
    #[error("Request to {path} timed out after {}s", .timeout.as_secs_f64())]
    Timeout { path: String, timeout: Duration },

    /// The polling budget ran out before the job reached a terminal state
    #[error("Job {job_id} did not reach a terminal state within {}s", .waited.as_secs())]
    PollTimeout {
        job_id: String,
        waited: Duration,
        last_status: Option<JobStatus>,
    },

    /// The caller cancelled a long-running operation
    #[error("Operation cancelled: {message}")]
    Cancelled { message: String },

    /// Connection-level failure before a response was received
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// Invalid client configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Local file errors during volume transfers
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable machine-readable code for this failure
    pub fn code(&self) -> &str {
        match self {
            Error::Authentication { .. } => "UNAUTHORIZED",
            Error::RateLimit { .. } => "RATE_LIMIT_EXCEEDED",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::Platform { error_code, .. } => error_code.as_deref().unwrap_or("PLATFORM_ERROR"),
            Error::Timeout { .. } => "TIMEOUT",
            Error::PollTimeout { .. } => "POLL_TIMEOUT",
            Error::Cancelled { .. } => "CANCELLED",
            Error::Network { .. } => "NETWORK_ERROR",
            Error::Configuration { .. } => "CONFIGURATION_ERROR",
            Error::Io { .. } => "IO_ERROR",
        }
    }

    /// HTTP status that produced this error, if one was received
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Error::Authentication { http_status, .. } => Some(*http_status),
            Error::RateLimit { .. } => Some(429),
            Error::NotFound { .. } => Some(404),
            Error::Platform { http_status, .. } => *http_status,
            _ => None,
        }
    }

    /// Server-suggested wait before retrying, for rate-limit errors
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimit { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Build a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Build an IO error with context about what was being done
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source,
        }
    }

    pub(crate) fn decode(message: impl Into<String>, http_status: Option<u16>) -> Self {
        Error::Platform {
            message: message.into(),
            error_code: Some("DECODE_ERROR".to_string()),
            http_status,
            details: None,
        }
    }
}
