//! Response envelope handling
//!
//! Most platform endpoints wrap their payload in a response schema:
//!
//! ```json
//! {"exception": 0, "message": "OK", "data": { ... }}
//! ```
//!
//! A zero `exception` means success and the payload is `data`. Bodies without
//! the wrapper are returned unchanged.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

/// A received response: status, headers and parsed body
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl ApiResponse {
    /// Unwrap the response schema and return the payload
    pub fn into_payload(self) -> Result<Value> {
        unwrap_envelope(self.body, self.status)
    }

    /// Unwrap the payload and decode it into a typed result
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        let status = self.status;
        let payload = self.into_payload()?;
        decode_payload(payload, status)
    }
}

/// Strip the `{"exception", "message", "data"}` wrapper if present
pub fn unwrap_envelope(body: Value, status: StatusCode) -> Result<Value> {
    let Value::Object(mut map) = body else {
        return Ok(body);
    };

    let Some(exception) = map.get("exception").cloned() else {
        return Ok(Value::Object(map));
    };

    if is_success_code(&exception) {
        return Ok(map.remove("data").unwrap_or(Value::Null));
    }

    let message = map
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown error")
        .to_string();
    let error_code = match &exception {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    Err(Error::Platform {
        message,
        error_code: Some(error_code),
        http_status: Some(status.as_u16()),
        details: map.remove("data").filter(|d| !d.is_null()),
    })
}

fn is_success_code(exception: &Value) -> bool {
    match exception {
        Value::Null => true,
        Value::Number(n) => n.as_i64() == Some(0),
        Value::String(s) => s == "0",
        Value::Bool(b) => !b,
        _ => false,
    }
}

/// Decode a payload into `T`; a shape mismatch is a platform decode error
pub fn decode_payload<T: DeserializeOwned>(payload: Value, status: StatusCode) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| {
        Error::decode(
            format!("Failed to decode response body: {}", e),
            Some(status.as_u16()),
        )
    })
}
