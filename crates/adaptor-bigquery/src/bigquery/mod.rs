//! BigQuery: credentials, the REST client and load job types

pub mod auth;
pub mod client;
pub mod options;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::{ConnectorError, Result};

pub use auth::{Credentials, ServiceAccountKey};
pub use client::BigQueryClient;
pub use options::{CreateDisposition, FieldSchema, LoadOptions, Schema, SourceFormat, WriteDisposition};

/// Fully qualified table name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// `PENDING`, `RUNNING` or `DONE`
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_result: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Value>,
}

/// A BigQuery job resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_reference: JobReference,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub configuration: Value,
    #[serde(default)]
    pub statistics: Value,
}

impl Job {
    pub fn id(&self) -> &str {
        &self.job_reference.job_id
    }

    pub fn is_done(&self) -> bool {
        self.status.state == "DONE"
    }

    /// Errors the job reported, if any.
    ///
    /// `status.errors` holds every error; `errorResult` alone is reported
    /// when the list is empty.
    pub fn errors(&self) -> Option<Vec<Value>> {
        if !self.status.errors.is_empty() {
            Some(self.status.errors.clone())
        } else {
            self.status.error_result.clone().map(|e| vec![e])
        }
    }

    /// Rows written, from `statistics.load.outputRows`
    pub fn output_rows(&self) -> Option<u64> {
        match self.statistics.pointer("/load/outputRows")? {
            Value::String(rows) => rows.parse().ok(),
            other => other.as_u64(),
        }
    }

    /// Fail with the job's errors, or hand the job back if it had none
    pub fn into_result(self) -> Result<Job> {
        match self.errors() {
            Some(errors) => Err(ConnectorError::LoadJob {
                job_id: self.job_reference.job_id,
                errors,
            }),
            None => Ok(self),
        }
    }
}

/// Destination of `load`.
///
/// [`BigQueryClient`] is the production implementation.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Look up an existing table
    async fn table_reference(&self, dataset_id: &str, table_id: &str) -> Result<TableReference>;

    /// Run one load job for `file` and wait until it is `DONE`.
    ///
    /// A job that finishes with errors is returned as `Ok`; callers decide
    /// what to do with [`Job::errors`].
    async fn load_file(&self, destination: &TableReference, file: &Path, options: &LoadOptions) -> Result<Job>;
}
