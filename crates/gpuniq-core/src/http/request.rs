//! Request descriptors
//!
//! An [`ApiRequest`] is built per call by a resource method and discarded once
//! the call completes.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Query parameters with unique keys.
///
/// List values expand to repeated `key=value` pairs on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: BTreeMap<String, Vec<String>>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value for the key
    pub fn set(mut self, key: &str, value: impl Display) -> Self {
        self.params.insert(key.to_string(), vec![value.to_string()]);
        self
    }

    /// Set a parameter only when a value is present
    pub fn set_opt<T: Display>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.set(key, value),
            None => self,
        }
    }

    /// Set a list parameter; empty lists are dropped
    pub fn set_list<T: Display>(mut self, key: &str, values: &[T]) -> Self {
        if values.is_empty() {
            return self;
        }
        self.params
            .insert(key.to_string(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.params.get(key).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Flatten into wire pairs
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.as_str(), v.as_str())))
            .collect()
    }
}

/// Request payload
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// JSON document
    Json(Value),
    /// Raw binary content (volume uploads)
    Bytes(Vec<u8>),
}

/// A single logical API call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Query,
    pub body: RequestBody,
    /// Per-call override of the client timeout
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Query::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// Attach a JSON body serialized from any `Serialize` value
    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| Error::Platform {
            message: format!("Failed to serialize request body: {}", e),
            error_code: Some("SERIALIZATION_ERROR".to_string()),
            http_status: None,
            details: None,
        })?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn with_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.body = RequestBody::Bytes(bytes);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
