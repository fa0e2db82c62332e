//! bulk-import - load a monthly trade archive into BigQuery

use adaptor_bigquery::bigquery::SourceFormat;
use adaptor_bigquery::{
    alter_state, execute, fetch, load, operation, unzip, AdaptorConfig, LoadOptions, Operation,
    OperationExt, Param, State, WriteDisposition,
};
use adaptor_common::logging::{init_logging, LogConfig, LogLevel};
use adaptor_common::AdaptorError;
use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const DEFAULT_SCHEMA: &str = "classification:STRING,year:STRING,period:STRING,period_desc:STRING,\
aggregate_level:STRING,is_leaf_code:STRING,trade_flow_code:STRING,trade_flow:STRING,\
reporter_code:STRING,reporter:STRING,reporter_iso:STRING,partner_code:STRING,partner:STRING,\
partner_iso:STRING,commodity_code:STRING,commodity:STRING,qty_unit_code:STRING,qty_unit:STRING,\
qty:INTEGER,netweight_kg:INTEGER,trade_value:INTEGER,flag:STRING";

#[derive(Parser, Debug)]
#[command(name = "bulk-import")]
#[command(author, version, about = "Fetch a monthly archive, unzip it and load it into BigQuery")]
struct Cli {
    /// Year of the archive, e.g. 2019
    #[arg(long)]
    year: String,

    /// Month of the archive, two digits
    #[arg(long)]
    month: String,

    /// API token appended to the download URL
    #[arg(long, env = "COMTRADE_TOKEN", hide_env_values = true)]
    token: String,

    /// Archive URL; `{period}` becomes YYYYMM and `{token}` the API token
    #[arg(
        long,
        default_value = "http://comtrade.un.org/api/get/bulk/C/M/{period}/ALL/HS?token={token}"
    )]
    url: String,

    /// Directory for the archive and the extracted files
    #[arg(short, long, default_value = "./data")]
    work_dir: PathBuf,

    #[arg(long, default_value = "value-chain-solutions")]
    project: String,

    #[arg(long, default_value = "test01")]
    dataset: String,

    #[arg(long, default_value = "fact_comtrade_2")]
    table: String,

    /// Table schema as `name:TYPE,...`
    #[arg(long, default_value = DEFAULT_SCHEMA)]
    schema: String,

    /// Replace the table contents instead of appending
    #[arg(long)]
    truncate: bool,

    /// Header rows to skip in each file
    #[arg(long, default_value_t = 1)]
    skip_rows: u32,

    /// Service account key file
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// OAuth access token, used when no key file is given
    #[arg(long, env = "BIGQUERY_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("bulk-import")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let _guard = init_logging(&log_config)?;

    let config = AdaptorConfig::from_env()?;
    let configuration = job_configuration(&cli)?;

    let options = LoadOptions::new()
        .schema(&cli.schema)?
        .source_format(SourceFormat::Csv)
        .skip_leading_rows(cli.skip_rows)
        .write_disposition(if cli.truncate {
            WriteDisposition::WriteTruncate
        } else {
            WriteDisposition::WriteAppend
        });

    let work_dir = Arc::new(cli.work_dir.clone());
    let archive = {
        let work_dir = Arc::clone(&work_dir);
        Param::derived(move |state: &State| path_string(&work_dir.join(format!("{}.zip", period(state)))))
    };
    let extracted = {
        let work_dir = Arc::clone(&work_dir);
        Param::derived(move |state: &State| path_string(&work_dir.join(period(state))))
    };
    let url = {
        let template = cli.url.clone();
        Param::derived(move |state: &State| {
            template
                .replace("{period}", &period(state))
                .replace("{token}", &field(state, "token"))
        })
    };

    tokio::fs::create_dir_all(work_dir.as_path())
        .await
        .with_context(|| format!("Failed to create {}", work_dir.display()))?;

    let job = execute(vec![
        alter_state(|state| {
            info!(period = %period(&state), "Started import");
            Ok(state)
        })
        .boxed(),
        fetch(url, archive.clone()).boxed(),
        unzip(archive, extracted.clone()).boxed(),
        load(extracted.clone(), cli.project.as_str(), cli.dataset.as_str(), cli.table.as_str(), options)
            .with_config(config)
            .boxed(),
        remove_extracted(extracted).boxed(),
    ]);

    let state = job
        .call(json!({
            "configuration": configuration,
            "year": cli.year,
            "month": cli.month,
            "token": cli.token,
        }))
        .await?;

    info!(result = %state.data(), "Import complete");
    Ok(())
}

/// Final step: delete the extracted files once they are loaded
fn remove_extracted(extracted: Param<String>) -> impl Operation {
    operation("cleanup", move |state: State| {
        let extracted = extracted.clone();
        async move {
            let dir = extracted.resolve(&state)?;
            info!(dir = %dir, "Upload done, removing extracted files");
            tokio::fs::remove_dir_all(&dir).await?;
            info!(period = %period(&state), "Finished import");
            Ok::<_, AdaptorError>(state)
        }
    })
}

/// Warehouse credentials for the job's `configuration`
fn job_configuration(cli: &Cli) -> Result<Value> {
    if let Some(path) = &cli.credentials {
        let key = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials from {}", path.display()))?;
        return serde_json::from_str(&key).context("Credentials file is not valid JSON");
    }

    match &cli.access_token {
        Some(token) => Ok(json!({ "access_token": token })),
        None => bail!("Provide --credentials or --access-token"),
    }
}

fn field(state: &State, key: &str) -> String {
    match state.field(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// `YYYYMM` for the job's year and month
fn period(state: &State) -> String {
    format!("{}{}", field(state, "year"), field(state, "month"))
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_remove_extracted_deletes_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("201901");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested/part-1.csv"), "a,b\n").unwrap();

        let step = remove_extracted(Param::Literal(path_string(&dir)));
        assert_eq!(step.name(), "cleanup");

        let state = State::default().advance(json!({"jobs": []}));
        let next = step.run(state.clone()).await.unwrap();

        assert_eq!(next, state);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_remove_extracted_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let missing = path_string(&temp.path().join("gone"));

        let err = remove_extracted(Param::Literal(missing))
            .run(State::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), adaptor_common::ErrorKind::Filesystem);
    }
}
