//! HTTP error classification
//!
//! Turns a failed response (status, headers, body) into one of the typed
//! [`Error`] variants. Classification is a pure function of its inputs.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::Error;

/// Wait used when a 429 carries no usable retry hint
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Coarse classification of an HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    /// 401/403
    AuthenticationError,
    /// 404
    NotFound,
    /// 429
    RateLimitError,
    /// 422
    ValidationError,
    /// Remaining 4xx
    ClientError,
    /// 5xx
    ServerError,
    /// Anything else that is not a success
    Unknown,
}

impl ErrorClassification {
    /// Classify an HTTP status code
    pub fn classify_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => ErrorClassification::AuthenticationError,
            404 => ErrorClassification::NotFound,
            429 => ErrorClassification::RateLimitError,
            422 => ErrorClassification::ValidationError,
            400..=499 => ErrorClassification::ClientError,
            500..=599 => ErrorClassification::ServerError,
            _ => ErrorClassification::Unknown,
        }
    }

    /// Classification of an already-built error, if it came from a response
    pub fn of(error: &Error) -> Option<Self> {
        error
            .http_status()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .filter(|status| !status.is_success())
            .map(Self::classify_status)
    }
}

/// Converts failed responses into typed errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClassifier {
    /// Retry hint assumed when a 429 does not declare one
    pub rate_limit_fallback: Duration,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            rate_limit_fallback: DEFAULT_RETRY_AFTER,
        }
    }
}

impl ErrorClassifier {
    pub fn new(rate_limit_fallback: Duration) -> Self {
        Self {
            rate_limit_fallback,
        }
    }

    /// Classify a non-success response.
    ///
    /// `resource` names what was requested (usually the path) and ends up in
    /// not-found messages.
    pub fn classify(
        &self,
        status: StatusCode,
        headers: &HeaderMap,
        body: &[u8],
        resource: &str,
    ) -> Error {
        let raw = String::from_utf8_lossy(body);
        let details = serde_json::from_slice::<Value>(body).ok();
        let (error_code, message) = extract_platform_error(details.as_ref(), raw.trim());
        let http_status = status.as_u16();

        match ErrorClassification::classify_status(status) {
            ErrorClassification::AuthenticationError => Error::Authentication {
                message: message.unwrap_or_else(|| "Authentication failed".to_string()),
                http_status,
            },
            ErrorClassification::NotFound => Error::NotFound {
                resource: resource.to_string(),
                message: message.unwrap_or_else(|| "Resource not found".to_string()),
            },
            ErrorClassification::RateLimitError => Error::RateLimit {
                message: message.unwrap_or_else(|| "Rate limit exceeded".to_string()),
                retry_after: parse_retry_after(headers, details.as_ref())
                    .unwrap_or(self.rate_limit_fallback),
            },
            ErrorClassification::ValidationError => Error::Platform {
                message: message.unwrap_or_else(|| "Validation error".to_string()),
                error_code: Some("VALIDATION_ERROR".to_string()),
                http_status: Some(http_status),
                details: details
                    .as_ref()
                    .and_then(|d| d.get("detail"))
                    .cloned()
                    .or(details),
            },
            _ => Error::Platform {
                message: message.unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Unexpected response")
                        .to_string()
                }),
                error_code,
                http_status: Some(http_status),
                details,
            },
        }
    }
}

/// Read the retry hint from the `Retry-After` header or a `retry_after` body
/// field. Only delay-seconds values are understood; negative or
/// unrepresentable values count as absent.
pub fn parse_retry_after(headers: &HeaderMap, details: Option<&Value>) -> Option<Duration> {
    let from_header = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok());

    let from_body = || {
        details
            .and_then(|d| d.get("retry_after"))
            .and_then(|v| v.as_f64().or_else(|| v.as_str()?.trim().parse().ok()))
    };

    from_header
        .or_else(from_body)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Pull an error code and message out of a platform error body.
///
/// Understands the response schema (`exception`/`message`), FastAPI style
/// `detail` bodies and plain `error` objects. Falls back to the raw body text.
pub fn extract_platform_error(details: Option<&Value>, raw: &str) -> (Option<String>, Option<String>) {
    let raw_message = (!raw.is_empty()).then(|| raw.to_string());

    let Some(json) = details else {
        return (None, raw_message);
    };

    // {"error": {"code": ..., "message": ...}} or {"error": "..."}
    if let Some(error) = json.get("error") {
        if let Some(text) = error.as_str() {
            return (string_field(json, "error_code"), Some(text.to_string()));
        }
        let code = string_field(error, "code");
        let message = string_field(error, "message").or(raw_message);
        return (code, message);
    }

    let code = string_field(json, "error_code").or_else(|| {
        json.get("exception")
            .filter(|e| !e.is_null() && e.as_i64() != Some(0))
            .map(render)
    });

    let message = string_field(json, "message")
        .or_else(|| json.get("detail").map(render))
        .or(raw_message);

    (code, message)
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).filter(|v| !v.is_null()).map(render)
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
