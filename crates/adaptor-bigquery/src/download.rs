//! `download` and `fetch`: stream a remote file to disk

use adaptor_common::Result as AdaptorResult;
use adaptor_core::{Operation, Param, State};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::AdaptorConfig;
use crate::error::{ConnectorError, Result};
use crate::http::{self, LazyClient};

/// How the destination file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail if the destination exists; only `200 OK` is accepted
    CreateNew,
    /// Create or truncate the destination; any `2xx` is accepted
    Overwrite,
}

impl WriteMode {
    fn accepts(self, status: StatusCode) -> bool {
        match self {
            WriteMode::CreateNew => status == StatusCode::OK,
            WriteMode::Overwrite => status.is_success(),
        }
    }
}

/// Stream `url` into `dest`, returning the number of bytes written.
///
/// Under [`WriteMode::CreateNew`] the destination is claimed before the
/// request is sent and removed again on any failure; a file that already
/// existed is never touched. Under [`WriteMode::Overwrite`] the body goes to
/// a sibling `.part` file that replaces `dest` only once the whole body has
/// arrived, so a failed fetch leaves the previous file in place.
pub async fn download_to(client: &Client, url: &str, dest: &Path, mode: WriteMode) -> Result<u64> {
    let target = match mode {
        WriteMode::CreateNew => dest.to_path_buf(),
        WriteMode::Overwrite => partial_path(dest),
    };
    let mut file = open_destination(&target, mode).await?;

    let result = match stream_body(client, url, &mut file, mode).await {
        Ok(bytes) if mode == WriteMode::Overwrite => {
            drop(file);
            tokio::fs::rename(&target, dest).await.map(|_| bytes).map_err(ConnectorError::from)
        },
        other => {
            drop(file);
            other
        },
    };

    if result.is_err() {
        if let Err(remove_err) = tokio::fs::remove_file(&target).await {
            warn!(path = %target.display(), error = %remove_err, "Failed to remove partial download");
        }
    }
    result
}

/// `archive.zip` -> `archive.zip.part`, in the same directory
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

async fn open_destination(dest: &Path, mode: WriteMode) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true);
    match mode {
        WriteMode::CreateNew => options.create_new(true),
        WriteMode::Overwrite => options.create(true).truncate(true),
    };

    options.open(dest).await.map_err(|err| match err.kind() {
        ErrorKind::AlreadyExists => ConnectorError::AlreadyExists(dest.display().to_string()),
        _ => ConnectorError::Io(err),
    })
}

async fn stream_body(client: &Client, url: &str, file: &mut File, mode: WriteMode) -> Result<u64> {
    let response = client.get(url).send().await?;
    let status = response.status();

    if !mode.accepts(status) {
        return Err(http::status_error(status, url));
    }

    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    debug!(url = %url, bytes = written, "Body streamed to disk");
    Ok(written)
}

/// Operation returned by [`download`] and [`fetch`]
pub struct Download {
    url: Param<String>,
    dest: Param<String>,
    mode: WriteMode,
    http: LazyClient,
}

/// Download `url` to a new file at `dest`.
///
/// Fails with "already exists" when `dest` is present, leaving it as it
/// was. Advances `data` to `{"path", "bytes"}`.
pub fn download(url: impl Into<Param<String>>, dest: impl Into<Param<String>>) -> Download {
    Download {
        url: url.into(),
        dest: dest.into(),
        mode: WriteMode::CreateNew,
        http: LazyClient::default(),
    }
}

/// Download `url` to `dest`, replacing any existing file.
///
/// Advances `data` to `{"path", "bytes"}`.
pub fn fetch(url: impl Into<Param<String>>, dest: impl Into<Param<String>>) -> Download {
    Download {
        url: url.into(),
        dest: dest.into(),
        mode: WriteMode::Overwrite,
        http: LazyClient::default(),
    }
}

impl Download {
    pub fn with_config(mut self, config: AdaptorConfig) -> Self {
        self.http = LazyClient::with_config(config);
        self
    }
}

#[async_trait]
impl Operation for Download {
    async fn run(&self, state: State) -> AdaptorResult<State> {
        let url = self.url.resolve(&state)?;
        let dest = self.dest.resolve(&state)?;

        let client = &self.http.get().await?.client;

        info!(url = %url, dest = %dest, "Downloading");
        let bytes = download_to(client, &url, Path::new(&dest), self.mode).await?;
        info!(dest = %dest, bytes, "The file is finished downloading");

        Ok(state.advance(json!({ "path": dest, "bytes": bytes })))
    }

    fn name(&self) -> &str {
        match self.mode {
            WriteMode::CreateNew => "download",
            WriteMode::Overwrite => "fetch",
        }
    }
}
