//! Integration tests for the HTTP operations
//!
//! Covers:
//! - `get` URL building, auth, query strings and response shaping
//! - `download` create-new semantics and cleanup
//! - `fetch` overwrite semantics

#![allow(clippy::unwrap_used, clippy::expect_used)]

use adaptor_bigquery::{
    alter_state, compose_next_state, download, fetch, get, AdaptorConfig, Operation,
    RequestParams, State,
};
use adaptor_common::{AdaptorError, ErrorKind};
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn state_with(configuration: serde_json::Value) -> State {
    State::new(configuration)
}

fn dest(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_get_uses_base_url_and_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(query_param("year", "2019"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [1, 2, 3]})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = get("/api/items", RequestParams::new().query("year", "2019"))
        .with_config(AdaptorConfig::default())
        .run(state_with(json!({ "baseUrl": mock_server.uri() })))
        .await
        .unwrap();

    assert_eq!(state.data(), &json!({"items": [1, 2, 3]}));
    assert_eq!(state.references(), &[serde_json::Value::Null]);
}

#[tokio::test]
async fn test_get_basic_auth_from_configuration() {
    let mock_server = MockServer::start().await;

    // admin:secret
    Mock::given(method("GET"))
        .and(path("/private"))
        .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let configuration = json!({
        "baseUrl": mock_server.uri(),
        "username": "admin",
        "password": "secret"
    });

    let state = get("/private", RequestParams::new())
        .with_config(AdaptorConfig::default())
        .run(state_with(configuration))
        .await
        .unwrap();

    assert_eq!(state.data()["ok"], json!(true));
}

#[tokio::test]
async fn test_get_explicit_auth_wins() {
    let mock_server = MockServer::start().await;

    // u:p
    Mock::given(method("GET"))
        .and(path("/private"))
        .and(header("authorization", "Basic dTpw"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"created": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let configuration = json!({ "username": "admin", "password": "secret" });
    let url = format!("{}/private", mock_server.uri());

    let state = get(url.as_str(), RequestParams::new().basic_auth("u", "p"))
        .with_config(AdaptorConfig::default())
        .run(state_with(configuration))
        .await
        .unwrap();

    assert_eq!(state.data()["created"], json!(true));
}

#[tokio::test]
async fn test_get_wraps_plain_text_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("all good"))
        .mount(&mock_server)
        .await;

    let state = get("/status", RequestParams::new())
        .with_config(AdaptorConfig::default())
        .run(state_with(json!({ "baseUrl": mock_server.uri() })))
        .await
        .unwrap();

    assert_eq!(state.data(), &json!({"body": "all good"}));
}

#[tokio::test]
async fn test_get_rejects_other_statuses() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let configuration = json!({ "baseUrl": mock_server.uri() });

    let err = get("/missing", RequestParams::new())
        .with_config(AdaptorConfig::default())
        .run(state_with(configuration.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "Server responded with 404: Not Found.");

    let err = get("/empty", RequestParams::new())
        .with_config(AdaptorConfig::default())
        .run(state_with(configuration))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(204));
}

#[tokio::test]
async fn test_get_keep_cookie() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "session=abc123; Path=/; HttpOnly")
                .append_header("set-cookie", "lang=en")
                .set_body_json(json!({"user": "admin"})),
        )
        .mount(&mock_server)
        .await;

    let state = get("/login", RequestParams::new().keep_cookie())
        .with_config(AdaptorConfig::default())
        .run(state_with(json!({ "baseUrl": mock_server.uri() })))
        .await
        .unwrap();

    assert_eq!(state.data()["__cookie"], json!("session=abc123; lang=en"));
    assert_eq!(state.data()["user"], json!("admin"));
    assert!(state.data()["__headers"].get("set-cookie").is_some());
}

#[tokio::test]
async fn test_get_runs_callback_on_next_state() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 7})))
        .mount(&mock_server)
        .await;

    let state = get("/count", RequestParams::new())
        .with_config(AdaptorConfig::default())
        .with_callback(alter_state(|state| {
            let doubled = state.data()["count"].as_u64().unwrap_or_default() * 2;
            Ok(compose_next_state(&state, json!(doubled)))
        }))
        .run(state_with(json!({ "baseUrl": mock_server.uri() })))
        .await
        .unwrap();

    assert_eq!(state.data(), &json!(14));
    assert_eq!(state.last_reference(), Some(&json!({"count": 7})));
}

#[tokio::test]
async fn test_download_writes_new_file() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/201901.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK archive bytes".to_vec()))
        .mount(&mock_server)
        .await;

    let target = dest(&temp, "201901.zip");
    let state = download(format!("{}/201901.zip", mock_server.uri()), target.as_str())
        .with_config(AdaptorConfig::default())
        .run(State::default())
        .await
        .unwrap();

    assert_eq!(fs::read(&target).unwrap(), b"PK archive bytes");
    assert_eq!(state.data(), &json!({"path": target, "bytes": 16}));
}

#[tokio::test]
async fn test_download_refuses_existing_file() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("new contents"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let target = dest(&temp, "existing.zip");
    fs::write(&target, "original").unwrap();

    let err = download(format!("{}/file.zip", mock_server.uri()), target.as_str())
        .with_config(AdaptorConfig::default())
        .run(State::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Filesystem);
    assert!(matches!(err, AdaptorError::AlreadyExists { ref path } if path == &target));
    assert_eq!(fs::read_to_string(&target).unwrap(), "original");
}

#[tokio::test]
async fn test_download_removes_file_on_error_status() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/missing.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let target = dest(&temp, "missing.zip");
    let err = download(format!("{}/missing.zip", mock_server.uri()), target.as_str())
        .with_config(AdaptorConfig::default())
        .run(State::default())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Server responded with 404: Not Found.");
    assert!(!std::path::Path::new(&target).exists());
}

#[tokio::test]
async fn test_download_only_accepts_ok() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(202).set_body_string("queued"))
        .mount(&mock_server)
        .await;

    let target = dest(&temp, "queued.zip");
    let err = download(format!("{}/queued.zip", mock_server.uri()), target.as_str())
        .with_config(AdaptorConfig::default())
        .run(State::default())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(202));
    assert!(!std::path::Path::new(&target).exists());
}

#[tokio::test]
async fn test_fetch_overwrites_existing_file() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/latest.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a,b\n1,2\n"))
        .mount(&mock_server)
        .await;

    let target = dest(&temp, "latest.csv");
    fs::write(&target, "stale contents that are longer than the new ones").unwrap();

    let op = fetch(format!("{}/latest.csv", mock_server.uri()), target.as_str())
        .with_config(AdaptorConfig::default());
    assert_eq!(op.name(), "fetch");

    let state = op.run(State::default()).await.unwrap();

    assert_eq!(fs::read_to_string(&target).unwrap(), "a,b\n1,2\n");
    assert_eq!(state.data()["bytes"], json!(8));
    assert!(!std::path::Path::new(&format!("{}.part", target)).exists());
}

#[tokio::test]
async fn test_fetch_propagates_server_errors() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let target = dest(&temp, "broken.zip");
    let err = fetch(format!("{}/broken.zip", mock_server.uri()), target.as_str())
        .with_config(AdaptorConfig::default())
        .run(State::default())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(!std::path::Path::new(&target).exists());
}

#[tokio::test]
async fn test_fetch_keeps_existing_file_on_error_status() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/201902.zip"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let target = dest(&temp, "201902.zip");
    fs::write(&target, "previous good archive").unwrap();

    let err = fetch(format!("{}/201902.zip", mock_server.uri()), target.as_str())
        .with_config(AdaptorConfig::default())
        .run(State::default())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(fs::read_to_string(&target).unwrap(), "previous good archive");
    assert!(!std::path::Path::new(&format!("{}.part", target)).exists());
}
