//! Load job options and table schemas

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::str::FromStr;

use super::TableReference;
use crate::error::ConnectorError;

/// One column of a table schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Table schema, as sent in a load job configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<FieldSchema>,
}

/// Parses the compact `name:TYPE,name:TYPE` form.
///
/// A field without a type is a `STRING`; types are upper-cased.
impl FromStr for Schema {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Vec::new();

        for pair in s.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }

            let mut parts = pair.splitn(2, ':');
            let name = parts.next().unwrap_or_default().trim();
            if name.is_empty() {
                return Err(ConnectorError::invalid_options(format!(
                    "schema field '{}' has no name",
                    pair
                )));
            }
            let field_type = parts
                .next()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or("STRING")
                .to_uppercase();

            fields.push(FieldSchema {
                name: name.to_string(),
                field_type,
                mode: None,
            });
        }

        if fields.is_empty() {
            return Err(ConnectorError::invalid_options("schema has no fields"));
        }

        Ok(Self { fields })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    WriteAppend,
    WriteTruncate,
    WriteEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateDisposition {
    CreateIfNeeded,
    CreateNever,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceFormat {
    Csv,
    NewlineDelimitedJson,
    Avro,
    Parquet,
    Orc,
}

impl SourceFormat {
    /// Format implied by a file's extension; `None` leaves the choice to
    /// BigQuery, which assumes CSV
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" | "tsv" => Some(SourceFormat::Csv),
            "json" | "jsonl" | "ndjson" => Some(SourceFormat::NewlineDelimitedJson),
            "avro" => Some(SourceFormat::Avro),
            "parquet" => Some(SourceFormat::Parquet),
            "orc" => Some(SourceFormat::Orc),
            _ => None,
        }
    }
}

/// Settings applied to every load job started by `load`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadOptions {
    pub schema: Option<Schema>,
    pub write_disposition: Option<WriteDisposition>,
    pub create_disposition: Option<CreateDisposition>,
    pub skip_leading_rows: Option<u32>,
    pub schema_update_options: Vec<String>,
    /// Inferred from each file's extension when unset
    pub source_format: Option<SourceFormat>,
    pub field_delimiter: Option<String>,
    pub autodetect: Option<bool>,
    /// Job location, e.g. `US` or `europe-west1`
    pub location: Option<String>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the schema from its `name:TYPE,...` form
    pub fn schema(mut self, schema: &str) -> Result<Self, ConnectorError> {
        self.schema = Some(schema.parse()?);
        Ok(self)
    }

    pub fn write_disposition(mut self, disposition: WriteDisposition) -> Self {
        self.write_disposition = Some(disposition);
        self
    }

    pub fn create_disposition(mut self, disposition: CreateDisposition) -> Self {
        self.create_disposition = Some(disposition);
        self
    }

    pub fn skip_leading_rows(mut self, rows: u32) -> Self {
        self.skip_leading_rows = Some(rows);
        self
    }

    pub fn schema_update_option(mut self, option: impl Into<String>) -> Self {
        self.schema_update_options.push(option.into());
        self
    }

    pub fn source_format(mut self, format: SourceFormat) -> Self {
        self.source_format = Some(format);
        self
    }

    pub fn field_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.field_delimiter = Some(delimiter.into());
        self
    }

    pub fn autodetect(mut self, autodetect: bool) -> Self {
        self.autodetect = Some(autodetect);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// The `configuration.load` object of a load job for `file`
    pub fn to_load_configuration(
        &self,
        destination: &TableReference,
        file: &Path,
    ) -> Result<Value, ConnectorError> {
        let mut load = Map::new();
        load.insert("destinationTable".into(), serde_json::to_value(destination)?);

        if let Some(format) = self.source_format.or_else(|| SourceFormat::from_path(file)) {
            load.insert("sourceFormat".into(), serde_json::to_value(format)?);
        }
        if let Some(schema) = &self.schema {
            load.insert("schema".into(), serde_json::to_value(schema)?);
        }
        if let Some(disposition) = self.write_disposition {
            load.insert("writeDisposition".into(), serde_json::to_value(disposition)?);
        }
        if let Some(disposition) = self.create_disposition {
            load.insert("createDisposition".into(), serde_json::to_value(disposition)?);
        }
        if let Some(rows) = self.skip_leading_rows {
            load.insert("skipLeadingRows".into(), Value::from(rows));
        }
        if !self.schema_update_options.is_empty() {
            load.insert(
                "schemaUpdateOptions".into(),
                serde_json::to_value(&self.schema_update_options)?,
            );
        }
        if let Some(delimiter) = &self.field_delimiter {
            load.insert("fieldDelimiter".into(), Value::String(delimiter.clone()));
        }
        if let Some(autodetect) = self.autodetect {
            load.insert("autodetect".into(), Value::Bool(autodetect));
        }

        Ok(Value::Object(load))
    }
}
