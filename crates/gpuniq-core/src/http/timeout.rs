//! Per-call deadlines
//!
//! The client-level timeout applies to every call unless the request carries
//! its own override. A call that overruns fails with [`Error::Timeout`].

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Pick the request override if present, otherwise the client default
pub fn effective_timeout(client_default: Duration, request_override: Option<Duration>) -> Duration {
    request_override.unwrap_or(client_default)
}

/// Run `future` under a deadline, mapping expiry to [`Error::Timeout`]
pub async fn with_timeout<F, T>(future: F, timeout: Duration, path: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            path: path.to_string(),
            timeout,
        }),
    }
}
