//! Text parsers: CSV and XML into JSON records

pub mod csv;
pub mod xml;

pub use self::csv::{parse_csv, parse_csv_str, CsvOptions, ParseCsv};
pub use self::xml::{parse_xml, parse_xml_str, ParseXml, XmlOptions};
