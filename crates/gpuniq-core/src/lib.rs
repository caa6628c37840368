//! GPUniq Core - request engine for the GPUniq GPU marketplace client
//!
//! This crate provides the machinery every resource call goes through:
//! authenticated transport, classification of failed responses into typed
//! errors, bounded retry on rate limiting, polling of asynchronous jobs and
//! chunked volume file transfers.
//!
//! # Main Components
//!
//! - **Configuration**: validated, immutable credentials ([`ClientConfig`])
//! - **HTTP**: transport, error classification, retries ([`http`])
//! - **Jobs**: cancellable, budgeted polling of async operations ([`job`])
//! - **Transfers**: streaming upload and download with progress ([`transfer`])
//!
//! # Example
//!
//! ```no_run
//! use gpuniq_core::{Client, ClientConfig, Query, Result};
//! use serde_json::Value;
//!
//! async fn example() -> Result<()> {
//!     let client = Client::new(ClientConfig::new("gpuniq_your_key")?)?;
//!     let models: Value = client.get("/llm/models", Query::new()).await?;
//!     println!("{}", models);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod job;
pub mod transfer;

// Re-export main types for convenience
pub use config::{ClientConfig, ClientConfigBuilder, Credentials, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use error::{Error, Result};
pub use http::{
    ApiRequest, ApiResponse, Client, ErrorClassification, ErrorClassifier, Query, RequestBody,
    RetryDecision, RetryPolicy, Sleeper, TokioSleeper,
};
pub use job::{job_id_from, JobPoller, JobSnapshot, JobStatus, PollOptions};
pub use transfer::{TransferProgress, TransferStream, DEFAULT_CHUNK_SIZE};

pub use tokio_util::sync::CancellationToken;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
