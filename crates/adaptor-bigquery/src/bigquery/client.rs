//! BigQuery REST client

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Response};
use serde_json::{json, Value};
use std::path::Path;
use tokio_util::bytes::Bytes;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::auth::Credentials;
use super::options::LoadOptions;
use super::{Job, JobReference, TableReference, Warehouse};
use crate::config::AdaptorConfig;
use crate::error::{ConnectorError, Result};
use crate::http;

/// Authenticated client for one project
pub struct BigQueryClient {
    http: Client,
    config: AdaptorConfig,
    project_id: String,
    access_token: String,
}

impl BigQueryClient {
    pub fn new(http: Client, config: AdaptorConfig, project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http,
            config,
            project_id: project_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Authenticate with the credentials in a job's `configuration`
    pub async fn connect(config: &AdaptorConfig, configuration: &Value, project_id: &str) -> Result<Self> {
        Self::connect_with(http::build_client(config)?, config, configuration, project_id).await
    }

    /// Like [`BigQueryClient::connect`], reusing an existing HTTP client
    pub async fn connect_with(
        http: Client,
        config: &AdaptorConfig,
        configuration: &Value,
        project_id: &str,
    ) -> Result<Self> {
        let credentials = Credentials::from_configuration(configuration)?;
        let token = credentials.access_token(&http, &config.token_uri).await?;

        info!(project_id, "Connected to BigQuery");
        Ok(Self::new(http, config.clone(), project_id, token))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Fetch a table's metadata and return its reference
    #[instrument(skip(self))]
    pub async fn get_table(&self, dataset_id: &str, table_id: &str) -> Result<TableReference> {
        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{}",
            self.config.api_url, self.project_id, dataset_id, table_id
        );

        let response = self.http.get(&url).bearer_auth(&self.access_token).send().await?;
        let table = json_response(response, &url).await?;

        let reference = table
            .get("tableReference")
            .cloned()
            .ok_or_else(|| ConnectorError::config(format!("table {} has no tableReference", table_id)))?;
        Ok(serde_json::from_value(reference)?)
    }

    /// Start a load job, uploading `file` with the job metadata
    #[instrument(skip(self, destination, file, options), fields(file = %file.display()))]
    pub async fn insert_load_job(
        &self,
        destination: &TableReference,
        file: &Path,
        options: &LoadOptions,
    ) -> Result<Job> {
        let job_reference = JobReference {
            project_id: self.project_id.clone(),
            job_id: format!("adaptor_load_{}", Uuid::new_v4().simple()),
            location: options.location.clone(),
        };
        let metadata = json!({
            "jobReference": job_reference,
            "configuration": { "load": options.to_load_configuration(destination, file)? },
        });

        let data = tokio::fs::File::open(file).await?;
        let size = data.metadata().await?.len();
        let boundary = format!("adaptor_{}", Uuid::new_v4().simple());
        let (head, tail) = multipart_related(&boundary, &metadata)?;
        let content_length = head.len() as u64 + size + tail.len() as u64;

        let body = stream::once(async move { Ok(Bytes::from(head)) })
            .chain(ReaderStream::new(data))
            .chain(stream::once(async move { Ok(Bytes::from(tail)) }));

        let url = format!(
            "{}/projects/{}/jobs?uploadType=multipart",
            self.config.upload_url, self.project_id
        );

        debug!(bytes = size, job_id = %job_reference.job_id, "Uploading load job");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header(CONTENT_TYPE, format!("multipart/related; boundary={}", boundary))
            .header(CONTENT_LENGTH, content_length)
            .body(Body::wrap_stream(body))
            .send()
            .await?;

        Ok(serde_json::from_value(json_response(response, &url).await?)?)
    }

    pub async fn get_job(&self, reference: &JobReference) -> Result<Job> {
        let url = format!(
            "{}/projects/{}/jobs/{}",
            self.config.api_url, reference.project_id, reference.job_id
        );

        let mut request = self.http.get(&url).bearer_auth(&self.access_token);
        if let Some(location) = &reference.location {
            request = request.query(&[("location", location)]);
        }

        let response = request.send().await?;
        Ok(serde_json::from_value(json_response(response, &url).await?)?)
    }

    /// Poll until the job is `DONE`
    pub async fn wait_for_job(&self, mut job: Job) -> Result<Job> {
        while !job.is_done() {
            debug!(job_id = job.id(), state = %job.status.state, "Waiting for job");
            tokio::time::sleep(self.config.job_poll_interval()).await;
            job = self.get_job(&job.job_reference).await?;
        }
        Ok(job)
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    async fn table_reference(&self, dataset_id: &str, table_id: &str) -> Result<TableReference> {
        self.get_table(dataset_id, table_id).await
    }

    async fn load_file(&self, destination: &TableReference, file: &Path, options: &LoadOptions) -> Result<Job> {
        let job = self.insert_load_job(destination, file, options).await?;
        self.wait_for_job(job).await
    }
}

/// The parts of a `multipart/related` upload around the file contents:
/// the JSON metadata part plus the media part's header, and the closing
/// boundary
fn multipart_related(boundary: &str, metadata: &Value) -> Result<(Vec<u8>, Vec<u8>)> {
    let metadata = serde_json::to_vec(metadata)?;

    let mut head = Vec::with_capacity(metadata.len() + 128);
    head.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    head.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    head.extend_from_slice(&metadata);
    head.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    head.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");

    let tail = format!("\r\n--{}--\r\n", boundary).into_bytes();
    Ok((head, tail))
}

/// Parse a JSON response, turning API errors into [`ConnectorError::Status`]
async fn json_response(response: Response, url: &str) -> Result<Value> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown Status").to_string());

        return Err(ConnectorError::Status {
            status: status.as_u16(),
            message,
            url: url.to_string(),
        });
    }

    Ok(serde_json::from_str(&body)?)
}
