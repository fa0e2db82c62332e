//! Runtime configuration

use crate::error::{ConnectorError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default BigQuery REST endpoint.
pub const DEFAULT_BIGQUERY_API_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Default BigQuery media upload endpoint, used for load jobs.
pub const DEFAULT_BIGQUERY_UPLOAD_URL: &str = "https://bigquery.googleapis.com/upload/bigquery/v2";

/// Default OAuth token endpoint for service account keys without `token_uri`.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Default delay between load job status polls, in milliseconds.
pub const DEFAULT_JOB_POLL_INTERVAL_MS: u64 = 1000;

/// Default `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("adaptor-bigquery/", env!("CARGO_PKG_VERSION"));

/// Settings that come from the process environment rather than the job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptorConfig {
    pub api_url: String,
    pub upload_url: String,
    pub token_uri: String,
    pub job_poll_interval_ms: u64,
    /// Per-request timeout. `None` waits indefinitely.
    pub http_timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for AdaptorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BIGQUERY_API_URL.to_string(),
            upload_url: DEFAULT_BIGQUERY_UPLOAD_URL.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            job_poll_interval_ms: DEFAULT_JOB_POLL_INTERVAL_MS,
            http_timeout_secs: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AdaptorConfig {
    /// Load configuration from the environment (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            api_url: lookup("BIGQUERY_API_URL")
                .unwrap_or_else(|| DEFAULT_BIGQUERY_API_URL.to_string()),
            upload_url: lookup("BIGQUERY_UPLOAD_URL")
                .unwrap_or_else(|| DEFAULT_BIGQUERY_UPLOAD_URL.to_string()),
            token_uri: lookup("GOOGLE_TOKEN_URI").unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            job_poll_interval_ms: lookup("BIGQUERY_JOB_POLL_INTERVAL_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_JOB_POLL_INTERVAL_MS),
            http_timeout_secs: lookup("ADAPTOR_HTTP_TIMEOUT_SECS").and_then(|s| s.parse().ok()),
            user_agent: lookup("ADAPTOR_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("BigQuery API URL", &self.api_url),
            ("BigQuery upload URL", &self.upload_url),
            ("token URI", &self.token_uri),
        ] {
            if value.trim().is_empty() {
                return Err(ConnectorError::config(format!("{} cannot be empty", name)));
            }
            url::Url::parse(value)?;
        }

        if self.job_poll_interval_ms == 0 {
            return Err(ConnectorError::config(
                "Job poll interval must be greater than 0",
            ));
        }

        if self.http_timeout_secs == Some(0) {
            return Err(ConnectorError::config(
                "HTTP timeout must be greater than 0 when set",
            ));
        }

        Ok(())
    }

    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_millis(self.job_poll_interval_ms)
    }

    /// The explicitly supplied configuration, or the environment's
    pub(crate) fn resolve(explicit: Option<&AdaptorConfig>) -> Result<AdaptorConfig> {
        match explicit {
            Some(config) => Ok(config.clone()),
            None => Self::from_env(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AdaptorConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, AdaptorConfig::default());
        assert_eq!(config.http_timeout_secs, None);
        assert_eq!(config.job_poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_overrides() {
        let config = AdaptorConfig::from_lookup(lookup_from(&[
            ("BIGQUERY_API_URL", "http://127.0.0.1:9050/bigquery/v2"),
            ("BIGQUERY_JOB_POLL_INTERVAL_MS", "25"),
            ("ADAPTOR_HTTP_TIMEOUT_SECS", "30"),
            ("ADAPTOR_USER_AGENT", "comtrade-loader"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "http://127.0.0.1:9050/bigquery/v2");
        assert_eq!(config.upload_url, DEFAULT_BIGQUERY_UPLOAD_URL);
        assert_eq!(config.job_poll_interval_ms, 25);
        assert_eq!(config.http_timeout_secs, Some(30));
        assert_eq!(config.user_agent, "comtrade-loader");
    }

    #[test]
    fn test_validation() {
        assert!(AdaptorConfig::from_lookup(lookup_from(&[("BIGQUERY_API_URL", " ")])).is_err());
        assert!(AdaptorConfig::from_lookup(lookup_from(&[("GOOGLE_TOKEN_URI", "not a url")])).is_err());

        let config = AdaptorConfig {
            job_poll_interval_ms: 0,
            ..AdaptorConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AdaptorConfig {
            http_timeout_secs: Some(0),
            ..AdaptorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
