//! `load`: bulk-load every file in a directory into a BigQuery table

use adaptor_common::Result as AdaptorResult;
use adaptor_core::{Operation, Param, State};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::bigquery::{BigQueryClient, LoadOptions, Warehouse};
use crate::config::AdaptorConfig;
use crate::error::Result;
use crate::http::LazyClient;

/// Operation returned by [`load`]
pub struct Load {
    dir: Param<String>,
    project: Param<String>,
    dataset: Param<String>,
    table: Param<String>,
    options: Param<LoadOptions>,
    warehouse: Option<Arc<dyn Warehouse>>,
    http: LazyClient,
}

/// Load the files in `dir` into `project.dataset.table`.
///
/// The table must already exist. Files are loaded one job at a time in
/// file-name order, sub-directories are skipped, and the first job that
/// reports errors fails the step. Advances `data` to
/// `{"table": <tableReference>, "jobs": [...]}` once every file is loaded.
pub fn load(
    dir: impl Into<Param<String>>,
    project: impl Into<Param<String>>,
    dataset: impl Into<Param<String>>,
    table: impl Into<Param<String>>,
    options: impl Into<Param<LoadOptions>>,
) -> Load {
    Load {
        dir: dir.into(),
        project: project.into(),
        dataset: dataset.into(),
        table: table.into(),
        options: options.into(),
        warehouse: None,
        http: LazyClient::default(),
    }
}

impl Load {
    /// Load through `warehouse` instead of connecting with the job's
    /// `configuration`
    pub fn with_warehouse(mut self, warehouse: Arc<dyn Warehouse>) -> Self {
        self.warehouse = Some(warehouse);
        self
    }

    pub fn with_config(mut self, config: AdaptorConfig) -> Self {
        self.http = LazyClient::with_config(config);
        self
    }

    async fn warehouse(&self, state: &State, project: &str) -> Result<Arc<dyn Warehouse>> {
        if let Some(warehouse) = &self.warehouse {
            return Ok(Arc::clone(warehouse));
        }

        let context = self.http.get().await?;
        let client = BigQueryClient::connect_with(
            context.client.clone(),
            &context.config,
            state.configuration(),
            project,
        )
        .await?;
        Ok(Arc::new(client))
    }
}

#[async_trait]
impl Operation for Load {
    async fn run(&self, state: State) -> AdaptorResult<State> {
        let dir = self.dir.resolve(&state)?;
        let project = self.project.resolve(&state)?;
        let dataset = self.dataset.resolve(&state)?;
        let table = self.table.resolve(&state)?;
        let options = self.options.resolve(&state)?;

        info!(dir = %dir, project = %project, dataset = %dataset, table = %table, "Loading files into BigQuery");

        let warehouse = self.warehouse(&state, &project).await?;
        let destination = warehouse.table_reference(&dataset, &table).await?;
        let files = list_files(Path::new(&dir)).await?;

        let mut jobs = Vec::with_capacity(files.len());
        for file in &files {
            let job = warehouse
                .load_file(&destination, file, &options)
                .await?
                .into_result()?;

            info!(job_id = job.id(), file = %file.display(), "Job completed");
            jobs.push(json!({
                "id": job.id(),
                "file": file.display().to_string(),
                "outputRows": job.output_rows(),
            }));
        }

        info!(files = files.len(), "All files loaded");
        Ok(state.advance(json!({ "table": destination, "jobs": Value::Array(jobs) })))
    }

    fn name(&self) -> &str {
        "load"
    }
}

/// Regular files directly inside `dir`, sorted by path
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}
