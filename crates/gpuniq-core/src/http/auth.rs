//! Authentication handling for the GPUniq API
//!
//! The platform authenticates every call with an `X-API-Key` header.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::Credentials;
use crate::error::{Error, Result};

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Applies credentials to outgoing request headers
pub trait AuthHandler: Send + Sync {
    /// Apply authentication to request headers
    fn apply_auth(&self, headers: &mut HeaderMap) -> Result<()>;
}

/// API key authentication (`X-API-Key`)
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    credentials: Arc<Credentials>,
}

impl ApiKeyAuth {
    pub fn new(credentials: Arc<Credentials>) -> Self {
        Self { credentials }
    }
}

impl AuthHandler for ApiKeyAuth {
    fn apply_auth(&self, headers: &mut HeaderMap) -> Result<()> {
        let mut value = HeaderValue::from_str(self.credentials.api_key())
            .map_err(|_| Error::configuration("API key contains characters not allowed in a header"))?;
        value.set_sensitive(true);

        headers.insert(HeaderName::from_static("x-api-key"), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[test]
    fn test_api_key_header_applied() {
        let config = ClientConfig::new("gpuniq_test-key-123").unwrap();
        let auth = ApiKeyAuth::new(config.credentials.clone());
        let mut headers = HeaderMap::new();

        auth.apply_auth(&mut headers).unwrap();

        let value = headers.get(API_KEY_HEADER).unwrap();
        assert_eq!(value.to_str().unwrap(), "gpuniq_test-key-123");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_invalid_header_value_rejected() {
        let config = ClientConfig::new("gpuniq_bad\nkey").unwrap();
        let auth = ApiKeyAuth::new(config.credentials.clone());
        let mut headers = HeaderMap::new();

        let result = auth.apply_auth(&mut headers);
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }
}
