//! Client configuration
//!
//! Loads and validates the three recognized options (`api_key`, `base_url`,
//! `timeout`) from explicit values or the environment:
//! - `GPUNIQ_API_KEY` (required)
//! - `GPUNIQ_BASE_URL`
//! - `GPUNIQ_TIMEOUT_SECS`
//!
//! A `.env` file in the working directory is honored when present.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::http::retry::{RetryPolicy, Sleeper, TokioSleeper};

/// Default platform endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.gpuniq.com/v1";

/// Default per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Every GPUniq API key carries this prefix
pub const API_KEY_PREFIX: &str = "gpuniq_";

/// Authenticated endpoint settings, fixed once the client is built.
///
/// Fields are private and only readable; share it through `Arc`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl Credentials {
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Join an API path onto the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };

        Url::parse(&joined)
            .map_err(|e| Error::configuration(format!("Invalid request URL {}: {}", joined, e)))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Keep the key prefix and the last four characters
fn redact(api_key: &str) -> String {
    let chars: Vec<char> = api_key.chars().collect();
    if chars.len() <= API_KEY_PREFIX.len() + 4 {
        return "***".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", API_KEY_PREFIX, tail)
}

/// Complete client configuration: credentials plus call policies
#[derive(Clone)]
pub struct ClientConfig {
    /// Immutable authentication and endpoint settings
    pub credentials: Arc<Credentials>,
    /// Rate-limit retry policy
    pub retry_policy: RetryPolicy,
    /// Clock used for waits between retries
    pub sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("credentials", &self.credentials)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Start building a configuration for the given API key
    pub fn builder(api_key: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(api_key)
    }

    /// Configuration with all defaults for the given API key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    /// Load configuration from the environment (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        // Missing .env is the normal case
        let _ = dotenv::dotenv();

        let api_key = std::env::var("GPUNIQ_API_KEY")
            .map_err(|_| Error::configuration("GPUNIQ_API_KEY environment variable not set"))?;

        let mut builder = Self::builder(api_key);

        if let Ok(base_url) = std::env::var("GPUNIQ_BASE_URL") {
            builder = builder.base_url(base_url);
        }

        if let Ok(timeout) = std::env::var("GPUNIQ_TIMEOUT_SECS") {
            let secs = timeout.trim().parse::<u64>().map_err(|_| {
                Error::configuration(format!(
                    "GPUNIQ_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    timeout
                ))
            })?;
            builder = builder.timeout(Duration::from_secs(secs));
        }

        builder.build()
    }
}

/// Builder for [`ClientConfig`]
#[derive(Clone)]
pub struct ClientConfigBuilder {
    api_key: String,
    base_url: String,
    timeout: Duration,
    retry_policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ClientConfigBuilder {
    fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Override the API base URL
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the per-call timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the retry policy
    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Override the clock used between retries
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<ClientConfig> {
        if self.api_key.is_empty() {
            return Err(Error::configuration("API key is required"));
        }
        if !self.api_key.starts_with(API_KEY_PREFIX) {
            return Err(Error::configuration(format!(
                "Invalid API key format. Key should start with '{}'",
                API_KEY_PREFIX
            )));
        }

        if self.timeout.is_zero() {
            return Err(Error::configuration("Timeout cannot be zero"));
        }

        let base_url = self.base_url.trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url)
            .map_err(|e| Error::configuration(format!("Invalid base URL {}: {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::configuration(format!(
                "Base URL must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        Ok(ClientConfig {
            credentials: Arc::new(Credentials {
                api_key: self.api_key,
                base_url,
                timeout: self.timeout,
            }),
            retry_policy: self.retry_policy,
            sleeper: self.sleeper,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("gpuniq_test_key_1234").unwrap();
        assert_eq!(config.credentials.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.credentials.timeout(), Duration::from_secs(60));
        assert_eq!(config.retry_policy.max_retries, 3);
    }

    #[test]
    fn test_api_key_validation() {
        assert!(matches!(
            ClientConfig::new(""),
            Err(Error::Configuration { .. })
        ));

        let err = ClientConfig::new("sk-not-ours").unwrap_err();
        assert!(err.to_string().contains("gpuniq_"));
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let config = ClientConfig::builder("gpuniq_abc")
            .base_url("http://localhost:8080/v1/")
            .build()
            .unwrap();
        assert_eq!(config.credentials.base_url(), "http://localhost:8080/v1");

        let url = config.credentials.endpoint("/volumes/3").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v1/volumes/3");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(ClientConfig::builder("gpuniq_abc")
            .base_url("not a url")
            .build()
            .is_err());
        assert!(ClientConfig::builder("gpuniq_abc")
            .base_url("ftp://files.example.com")
            .build()
            .is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = ClientConfig::builder("gpuniq_abc")
            .timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ClientConfig::new("gpuniq_supersecretvalue9876").unwrap();
        let rendered = format!("{:?}", config.credentials);
        assert!(!rendered.contains("supersecret"));
        assert!(rendered.contains("9876"));
    }
}
