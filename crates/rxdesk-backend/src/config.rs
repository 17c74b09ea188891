//! # Backend Configuration
//!
//! Lives under `[backend]` in `till.toml`:
//!
//! ```toml
//! [backend]
//! base_url = "https://abcd.supabase.co"
//! api_key = "public-anon-key"
//! connect_timeout_secs = 5
//! read_timeout_secs = 15
//! ```
//!
//! `read_timeout_secs` bounds inventory reads only. A sale commit waits
//! for the backend's answer: cutting it off would leave the cashier not
//! knowing whether the sale went through.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{BackendError, BackendResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL; RPC calls go to `<base_url>/rest/v1/rpc/<name>`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Public API key sent as `apikey`.
    #[serde(default)]
    pub api_key: String,

    /// Signed-in user's access token. Obtained outside the till.
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:54321".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_read_timeout() -> u64 {
    15
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: default_base_url(),
            api_key: String::new(),
            access_token: None,
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

impl BackendConfig {
    pub fn validate(&self) -> BackendResult<()> {
        let url = Url::parse(&self.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(BackendError::InvalidUrl(format!(
                "Backend URL must start with http:// or https://, got: {}",
                self.base_url
            )));
        }

        if self.connect_timeout_secs == 0 || self.read_timeout_secs == 0 {
            return Err(BackendError::InvalidConfig(
                "timeouts must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// `RXDESK_BACKEND_URL`, `RXDESK_BACKEND_API_KEY`, `RXDESK_BACKEND_TOKEN`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("RXDESK_BACKEND_URL") {
            debug!(url = %url, "Overriding backend URL from environment");
            self.base_url = url;
        }

        if let Ok(key) = std::env::var("RXDESK_BACKEND_API_KEY") {
            self.api_key = key;
        }

        if let Ok(token) = std::env::var("RXDESK_BACKEND_TOKEN") {
            self.access_token = Some(token).filter(|t| !t.is_empty());
        }
    }

    /// Parsed base URL, always ending in `/` so relative joins keep its path.
    pub fn base_url(&self) -> BackendResult<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Ok(Url::parse(&raw)?)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = BackendConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.read_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_validation_rejects_bad_urls_and_zero_timeouts() {
        let mut config = BackendConfig::default();
        config.base_url = "ws://example.com".to_string();
        assert!(config.validate().is_err());

        config.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.base_url = "https://example.com".to_string();
        config.read_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_url_keeps_path() {
        let config = BackendConfig {
            base_url: "https://example.com/pharmacy".to_string(),
            ..Default::default()
        };
        let joined = config.base_url().unwrap().join("rest/v1/rpc/x").unwrap();
        assert_eq!(joined.as_str(), "https://example.com/pharmacy/rest/v1/rpc/x");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BackendConfig = toml::from_str(r#"base_url = "https://abcd.supabase.co""#).unwrap();
        assert_eq!(config.base_url, "https://abcd.supabase.co");
        assert_eq!(config.connect_timeout_secs, 5);
        assert!(config.access_token.is_none());
    }
}
