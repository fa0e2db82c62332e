//! CSV parsing and the `parse_csv` operation

use adaptor_common::Result as AdaptorResult;
use adaptor_core::{Operation, Param, State};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::Result;

/// Options understood by [`parse_csv`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub quote: u8,
    /// Treat the first record as column names and emit objects
    pub columns: bool,
    /// 1-based line to start reading from
    pub from_line: u64,
    pub trim: bool,
    pub comment: Option<u8>,
    /// Accept records with differing field counts
    pub relax_column_count: bool,
    /// Drop records consisting of a single empty field
    pub skip_empty_lines: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            columns: false,
            from_line: 1,
            trim: false,
            comment: None,
            relax_column_count: false,
            skip_empty_lines: false,
        }
    }
}

impl CsvOptions {
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn columns(mut self) -> Self {
        self.columns = true;
        self
    }

    pub fn from_line(mut self, line: u64) -> Self {
        self.from_line = line;
        self
    }

    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn comment(mut self, marker: u8) -> Self {
        self.comment = Some(marker);
        self
    }

    pub fn relax_column_count(mut self) -> Self {
        self.relax_column_count = true;
        self
    }

    pub fn skip_empty_lines(mut self) -> Self {
        self.skip_empty_lines = true;
        self
    }
}

/// Parse CSV text into an array of string arrays, or of objects keyed by
/// column name when `options.columns` is set.
pub fn parse_csv_str(text: &str, options: &CsvOptions) -> Result<Value> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(options.delimiter)
        .quote(options.quote)
        .comment(options.comment)
        .flexible(options.relax_column_count)
        .trim(if options.trim {
            ::csv::Trim::All
        } else {
            ::csv::Trim::None
        })
        .from_reader(text.as_bytes());

    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;

        let line = record.position().map(|p| p.line()).unwrap_or(1);
        if line < options.from_line {
            continue;
        }
        if options.skip_empty_lines && record.len() == 1 && record[0].is_empty() {
            continue;
        }

        let fields: Vec<String> = record.iter().map(str::to_string).collect();

        if !options.columns {
            rows.push(Value::Array(fields.into_iter().map(Value::String).collect()));
            continue;
        }

        match &header {
            None => header = Some(fields),
            Some(names) => {
                let row: Map<String, Value> = names
                    .iter()
                    .cloned()
                    .zip(fields.into_iter().map(Value::String))
                    .collect();
                rows.push(Value::Object(row));
            },
        }
    }

    debug!(rows = rows.len(), "Parsed CSV");
    Ok(Value::Array(rows))
}

/// Operation returned by [`parse_csv`]
pub struct ParseCsv {
    target: Param<String>,
    options: Param<CsvOptions>,
}

/// Parse CSV into `data`.
///
/// `target` names a file when one exists at that path; otherwise it is the
/// CSV text itself.
pub fn parse_csv(target: impl Into<Param<String>>, options: impl Into<Param<CsvOptions>>) -> ParseCsv {
    ParseCsv {
        target: target.into(),
        options: options.into(),
    }
}

#[async_trait]
impl Operation for ParseCsv {
    async fn run(&self, state: State) -> AdaptorResult<State> {
        let target = self.target.resolve(&state)?;
        let options = self.options.resolve(&state)?;

        let text = match tokio::fs::metadata(&target).await {
            Ok(meta) if meta.is_file() => {
                info!(path = %target, "Parsing CSV file");
                tokio::fs::read_to_string(&target).await?
            },
            _ => target,
        };

        let rows = parse_csv_str(&text, &options)?;
        info!("Finished parsing CSV, result available in state.data");

        Ok(state.advance(rows))
    }

    fn name(&self) -> &str {
        "parse_csv"
    }
}
