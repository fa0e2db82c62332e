//! HTTP plumbing shared by `get`, `download` and the BigQuery client

use crate::config::AdaptorConfig;
use crate::error::{ConnectorError, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Basic auth credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl Authentication {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Some(password.into()),
        }
    }
}

/// Build the HTTP client every collaborator uses
pub fn build_client(config: &AdaptorConfig) -> Result<Client> {
    let mut builder = Client::builder().user_agent(config.user_agent.clone());

    if let Some(secs) = config.http_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    Ok(builder.build()?)
}

/// Runtime configuration and the client built from it
#[derive(Debug)]
pub(crate) struct HttpContext {
    pub(crate) config: AdaptorConfig,
    pub(crate) client: Client,
}

/// Configuration and client for one operation, resolved on its first run.
///
/// Later runs reuse both, so the environment is read once per operation.
#[derive(Debug, Default)]
pub(crate) struct LazyClient {
    explicit: Option<AdaptorConfig>,
    context: OnceCell<HttpContext>,
}

impl LazyClient {
    pub(crate) fn with_config(config: AdaptorConfig) -> Self {
        Self {
            explicit: Some(config),
            context: OnceCell::new(),
        }
    }

    pub(crate) async fn get(&self) -> Result<&HttpContext> {
        self.context
            .get_or_try_init(|| async {
                let config = AdaptorConfig::resolve(self.explicit.as_ref())?;
                let client = build_client(&config)?;
                Ok(HttpContext { config, client })
            })
            .await
    }
}

/// Prefix `path` with `configuration.baseUrl` when the job configures one
pub fn set_url(configuration: &Value, path: &str) -> String {
    match configuration.get("baseUrl").and_then(Value::as_str) {
        Some(base) if !base.is_empty() => format!("{}{}", base, path),
        _ => path.to_string(),
    }
}

/// Pick the credentials for a request.
///
/// Explicit credentials win; otherwise `configuration.username` and
/// `configuration.password` are used when present.
pub fn set_auth(configuration: &Value, explicit: Option<&Authentication>) -> Option<Authentication> {
    if let Some(auth) = explicit {
        return Some(auth.clone());
    }

    let username = configuration.get("username").and_then(Value::as_str)?;
    Some(Authentication {
        username: username.to_string(),
        password: configuration
            .get("password")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Parse a response body as JSON, wrapping anything else as `{"body": text}`
pub fn try_json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| json!({ "body": body }))
}

/// Error for a response whose status the caller does not accept
pub(crate) fn status_error(status: StatusCode, url: &str) -> ConnectorError {
    ConnectorError::Status {
        status: status.as_u16(),
        message: format!("{}.", status.canonical_reason().unwrap_or("Unknown Status")),
        url: url.to_string(),
    }
}
