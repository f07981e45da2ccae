//! Data Loader Module
//! Reads CSV/TXT/XLSX/XLS sources into a `Dataset` using Polars.

use crate::data::dataset::{Dataset, ParseError};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use polars::prelude::*;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Bundled default dataset, used when nothing has been uploaded.
const SAMPLE_CSV: &[u8] = include_bytes!("../../assets/sample_sales.csv");
pub const SAMPLE_NAME: &str = "sample data";

/// Rows scanned for schema inference unless overridden.
pub const DEFAULT_INFER_SCHEMA_LENGTH: usize = 10_000;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported file type '{0}' (expected csv, txt, xlsx or xls)")]
    UnsupportedFormat(String),
    #[error("Failed to parse table: {0}")]
    Polars(#[from] PolarsError),
    #[error("Failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("Failed to convert workbook rows: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// File format implied by the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Csv,
    Txt,
    Xlsx,
    Xls,
}

impl FileFormat {
    pub const EXTENSIONS: [&'static str; 4] = ["csv", "txt", "xlsx", "xls"];

    pub fn from_path(path: &Path) -> Result<Self, LoaderError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "txt" => Ok(FileFormat::Txt),
            "xlsx" => Ok(FileFormat::Xlsx),
            "xls" => Ok(FileFormat::Xls),
            _ => Err(LoaderError::UnsupportedFormat(ext)),
        }
    }

    pub fn is_workbook(self) -> bool {
        matches!(self, FileFormat::Xlsx | FileFormat::Xls)
    }
}

/// Parse parameters; together with the content digest they key the load cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadOptions {
    /// Overrides delimiter detection for CSV/TXT.
    pub delimiter: Option<u8>,
    pub infer_schema_length: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            infer_schema_length: DEFAULT_INFER_SCHEMA_LENGTH,
        }
    }
}

/// Raw bytes of an uploaded file or of the bundled sample.
#[derive(Debug, Clone)]
pub struct RawSource {
    pub name: String,
    pub format: FileFormat,
    pub bytes: Vec<u8>,
}

impl RawSource {
    pub fn read(path: &Path) -> Result<Self, LoaderError> {
        let format = FileFormat::from_path(path)?;
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Ok(Self {
            name,
            format,
            bytes,
        })
    }

    pub fn sample() -> Self {
        Self {
            name: SAMPLE_NAME.to_string(),
            format: FileFormat::Csv,
            bytes: SAMPLE_CSV.to_vec(),
        }
    }

    /// Hex SHA-256 of the content.
    pub fn digest(&self) -> String {
        Sha256::digest(&self.bytes)
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    fn is_blank(&self) -> bool {
        self.bytes.iter().all(|b| b.is_ascii_whitespace())
    }
}

/// Parses raw sources into datasets.
pub struct DataLoader;

impl DataLoader {
    /// Read and parse a file from disk.
    pub fn load_path(path: &Path, options: &LoadOptions) -> Result<Dataset, LoaderError> {
        let raw = RawSource::read(path)?;
        Self::parse(&raw, options)
    }

    /// Parse raw bytes according to their format, then normalize the date column.
    pub fn parse(raw: &RawSource, options: &LoadOptions) -> Result<Dataset, LoaderError> {
        if raw.is_blank() {
            return Err(ParseError::EmptyFile.into());
        }

        let df = match raw.format {
            FileFormat::Csv => {
                let sep = options.delimiter.unwrap_or(b',');
                Self::read_delimited(raw.bytes.clone(), sep, options.infer_schema_length)?
            }
            FileFormat::Txt => {
                let sep = options
                    .delimiter
                    .unwrap_or_else(|| Self::sniff_delimiter(&raw.bytes));
                debug!(delimiter = %(sep as char), "sniffed text delimiter");
                Self::read_delimited(raw.bytes.clone(), sep, options.infer_schema_length)?
            }
            FileFormat::Xlsx | FileFormat::Xls => {
                let csv_bytes = Self::workbook_to_csv(&raw.bytes)?;
                Self::read_delimited(csv_bytes, b',', options.infer_schema_length)?
            }
        };

        let dataset = Dataset::from_frame(df, raw.name.clone())?;
        info!(
            source = %raw.name,
            rows = dataset.height(),
            columns = dataset.frame().width(),
            "dataset loaded"
        );
        Ok(dataset)
    }

    fn read_delimited(
        bytes: Vec<u8>,
        separator: u8,
        infer_schema_length: usize,
    ) -> Result<DataFrame, LoaderError> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(infer_schema_length))
            .with_ignore_errors(true)
            .map_parse_options(|opts| opts.with_separator(separator))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;
        Ok(df)
    }

    /// Pick the delimiter of a text file from its header line.
    pub fn sniff_delimiter(bytes: &[u8]) -> u8 {
        let header = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
        [b'\t', b'|', b';']
            .into_iter()
            .find(|sep| header.contains(sep))
            .unwrap_or(b',')
    }

    /// Flatten the first worksheet into CSV text so it shares the CSV inference path.
    fn workbook_to_csv(bytes: &[u8]) -> Result<Vec<u8>, LoaderError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(ParseError::EmptyFile)?;
        let range = workbook.worksheet_range(&sheet)?;
        if range.is_empty() {
            return Err(ParseError::EmptyFile.into());
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in range.rows() {
            let record: Vec<String> = row.iter().map(Self::cell_to_text).collect();
            writer.write_record(&record)?;
        }
        writer.into_inner().map_err(|e| LoaderError::Io(e.into_error()))
    }

    fn cell_to_text(cell: &Data) -> String {
        match cell {
            Data::Empty | Data::Error(_) => String::new(),
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
            Data::Float(v) => v.to_string(),
            Data::Int(v) => v.to_string(),
            Data::Bool(v) => v.to_string(),
            Data::DateTime(v) => match v.as_datetime() {
                Some(dt) if dt.time() == chrono::NaiveTime::MIN => {
                    dt.date().format("%Y-%m-%d").to_string()
                }
                Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
                None => v.to_string(),
            },
        }
    }
}
