//! `get`: HTTP GET whose parsed response becomes `data`

use adaptor_common::Result as AdaptorResult;
use adaptor_core::{BoxOperation, Operation, Param, State};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, SET_COOKIE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::AdaptorConfig;
use crate::error::Result;
use crate::http::{self, Authentication, LazyClient};

/// Query, headers and auth for a GET request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestParams {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub authentication: Option<Authentication>,
    /// Add `__cookie` and `__headers` from the response to the result
    pub keep_cookie: bool,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.authentication = Some(Authentication::new(username, password));
        self
    }

    pub fn keep_cookie(mut self) -> Self {
        self.keep_cookie = true;
        self
    }
}

/// Operation returned by [`get`]
pub struct Get {
    path: Param<String>,
    params: Param<RequestParams>,
    callback: Option<BoxOperation>,
    http: LazyClient,
}

/// Issue a GET request and advance `data` to the response body.
///
/// `path` is appended to `configuration.baseUrl` when the job sets one.
/// Only `200`, `201` and `202` count as success.
pub fn get(path: impl Into<Param<String>>, params: impl Into<Param<RequestParams>>) -> Get {
    Get {
        path: path.into(),
        params: params.into(),
        callback: None,
        http: LazyClient::default(),
    }
}

impl Get {
    /// Run `callback` on the state produced by the request
    pub fn with_callback(mut self, callback: impl Operation + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn with_config(mut self, config: AdaptorConfig) -> Self {
        self.http = LazyClient::with_config(config);
        self
    }
}

#[async_trait]
impl Operation for Get {
    async fn run(&self, state: State) -> AdaptorResult<State> {
        let path = self.path.resolve(&state)?;
        let params = self.params.resolve(&state)?;

        let url = http::set_url(state.configuration(), &path);
        let auth = http::set_auth(state.configuration(), params.authentication.as_ref());

        let client = &self.http.get().await?.client;

        let response = request(client, &url, &params, auth.as_ref()).await?;
        info!(url = %url, "GET succeeded, response body available in state");

        let next = state.advance(response);
        match &self.callback {
            Some(callback) => callback.run(next).await,
            None => Ok(next),
        }
    }

    fn name(&self) -> &str {
        "get"
    }
}

async fn request(
    client: &Client,
    url: &str,
    params: &RequestParams,
    auth: Option<&Authentication>,
) -> Result<Value> {
    let mut builder = client.get(url).query(&params.query);
    for (name, value) in &params.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(auth) = auth {
        builder = builder.basic_auth(&auth.username, auth.password.as_ref());
    }

    let response = builder.send().await?;
    let status = response.status();
    debug!(url = %url, status = status.as_u16(), "Response received");

    if !matches!(status.as_u16(), 200 | 201 | 202) {
        return Err(http::status_error(status, url));
    }

    let cookie = cookie_string(response.headers());
    let headers = headers_to_json(response.headers());
    let body = http::try_json(&response.text().await?);

    if !params.keep_cookie {
        return Ok(body);
    }

    let mut result = Map::new();
    result.insert("__cookie".to_string(), Value::String(cookie));
    result.insert("__headers".to_string(), headers);
    match body {
        Value::Object(fields) => result.extend(fields),
        other => {
            result.insert("body".to_string(), other);
        },
    }
    Ok(Value::Object(result))
}

/// `name=value` pairs from every `Set-Cookie` header, joined with `; `
fn cookie_string(headers: &HeaderMap) -> String {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Response headers as JSON; repeated headers become arrays
fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        let value = Value::String(value.to_string());
        match map.get_mut(name.as_str()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            },
            None => {
                map.insert(name.as_str().to_string(), value);
            },
        }
    }
    Value::Object(map)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_cookie_string() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("session=abc; Path=/; HttpOnly"));
        headers.append(SET_COOKIE, HeaderValue::from_static("theme=dark"));

        assert_eq!(cookie_string(&headers), "session=abc; theme=dark");
        assert_eq!(cookie_string(&HeaderMap::new()), "");
    }

    #[test]
    fn test_headers_to_json() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.append("x-trace", HeaderValue::from_static("a"));
        headers.append("x-trace", HeaderValue::from_static("b"));

        let value = headers_to_json(&headers);
        assert_eq!(value["content-type"], json!("application/json"));
        assert_eq!(value["x-trace"], json!(["a", "b"]));
    }

    #[test]
    fn test_request_params_from_json() {
        let params: RequestParams = serde_json::from_value(json!({
            "query": [["year", "2019"]],
            "authentication": {"username": "u", "password": "p"},
            "keepCookie": true
        }))
        .unwrap();

        assert_eq!(
            params,
            RequestParams::new()
                .query("year", "2019")
                .basic_auth("u", "p")
                .keep_cookie()
        );
    }
}
