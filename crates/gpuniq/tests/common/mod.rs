//! Shared helpers for resource tests against a local mock server

#![allow(dead_code)]

use std::time::Duration;

use gpuniq::{ClientConfig, GPUniq, RetryPolicy};
use serde_json::{json, Value};
use wiremock::MockServer;

pub const TEST_API_KEY: &str = "gpuniq_resource_test_key";

/// Client against the mock server's `/v1` prefix with retries off
pub fn client_for(server: &MockServer) -> GPUniq {
    let config = ClientConfig::builder(TEST_API_KEY)
        .base_url(format!("{}/v1", server.uri()))
        .timeout(Duration::from_secs(5))
        .retry_policy(RetryPolicy::disabled())
        .build()
        .unwrap();
    GPUniq::with_config(config).unwrap()
}

/// Wrap a payload in the platform response schema
pub fn envelope(data: Value) -> Value {
    json!({"exception": 0, "message": "OK", "data": data})
}
