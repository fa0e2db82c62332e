//! Adaptor BigQuery
//!
//! Operation factories for data-movement jobs that end in a BigQuery table.
//!
//! - **HTTP**: [`get`] for JSON APIs, [`download`] and [`fetch`] for files
//! - **Archives**: [`unzip`]
//! - **Parsing**: [`parse_csv`] and [`parse_xml`] into JSON records
//! - **Warehouse**: [`load`] runs one BigQuery load job per file
//!
//! Every factory returns an [`Operation`]; compose them with [`execute`].
//!
//! # Example
//!
//! ```no_run
//! use adaptor_bigquery::{execute, fetch, load, unzip, LoadOptions, OperationExt};
//! use serde_json::json;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let job = execute(vec![
//!     fetch("https://example.com/201901.zip", "/tmp/201901.zip").boxed(),
//!     unzip("/tmp/201901.zip", "/tmp/201901").boxed(),
//!     load(
//!         "/tmp/201901",
//!         "value-chain-solutions",
//!         "test01",
//!         "fact_comtrade_2",
//!         LoadOptions::new().skip_leading_rows(1),
//!     )
//!     .boxed(),
//! ]);
//!
//! job.call(json!({ "configuration": { "access_token": "ya29..." } })).await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod archive;
pub mod bigquery;
pub mod config;
pub mod download;
pub mod error;
pub mod get;
pub mod http;
pub mod load;
pub mod parse;

pub use archive::{unzip, Unzip};
pub use bigquery::{BigQueryClient, LoadOptions, Schema, Warehouse, WriteDisposition};
pub use config::AdaptorConfig;
pub use download::{download, fetch, Download};
pub use error::{ConnectorError, Result};
pub use get::{get, Get, RequestParams};
pub use http::Authentication;
pub use load::{load, Load};
pub use parse::{parse_csv, parse_xml, CsvOptions, XmlOptions};

pub use adaptor_core::{
    alter_state, combine, compose_next_state, data_path, data_value, each, execute, field, fields,
    last_reference_value, merge, operation, source_value, BoxOperation, Operation, OperationExt,
    Param, Sequence, State,
};
