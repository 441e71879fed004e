//! Upload Ingestion
//!
//! Turns an uploaded CSV file into cleaned, deduplicated records ready for
//! classification.

pub mod clean;
pub mod columns;
pub mod csv;

pub use self::clean::{clean_records, CleaningStats, TextCleaner};
pub use self::columns::{detect_date_column, parse_date, Annotations};
pub use self::csv::{validate_upload, CsvReadResult, CsvReader, Record};

use thiserror::Error;

/// Errors raised while reading an upload
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("The uploaded file is empty")]
    EmptyFile,

    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    TooLarge { size: usize, limit: usize },

    #[error("Unsupported file type '{0}': upload a .csv file")]
    UnsupportedExtension(String),

    #[error("The file is not valid UTF-8 text")]
    Encoding,

    #[error("The file has no header row")]
    NoHeaders,

    #[error("Column '{requested}' not found (available: {available})")]
    MissingColumn { requested: String, available: String },

    #[error("No usable text rows in the file")]
    NoRecords,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
}
