//! HTTP layer for GPUniq API communication
//!
//! This module provides:
//! - Request descriptors with query and body handling
//! - API key authentication
//! - Error classification of failed responses
//! - Response envelope unwrapping
//! - Rate-limit retries with an injectable clock
//! - Per-call timeouts

pub mod auth;
pub mod client;
pub mod envelope;
pub mod error;
pub mod request;
pub mod retry;
pub mod timeout;

pub use auth::{ApiKeyAuth, AuthHandler, API_KEY_HEADER};
pub use client::{Client, HttpTransport};
pub use envelope::{unwrap_envelope, ApiResponse};
pub use error::{ErrorClassification, ErrorClassifier, DEFAULT_RETRY_AFTER};
pub use request::{ApiRequest, Query, RequestBody};
pub use retry::{execute_with_retry, RetryDecision, RetryPolicy, Sleeper, TokioSleeper};
pub use timeout::{effective_timeout, with_timeout};

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
