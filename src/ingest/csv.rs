//! CSV Upload Reader
//!
//! Reads headered CSV files with an arbitrary set of columns. One column
//! holds the message text; every other column is carried along as metadata.

use serde::Serialize;
use std::path::Path;

use super::IngestError;

/// Header names tried, in order, when no text column is given
const TEXT_COLUMN_CANDIDATES: &[&str] = &[
    "text",
    "tweet",
    "message",
    "content",
    "texte",
    "full_text",
    "text_cleaned",
    "body",
];

const ALLOWED_EXTENSIONS: &[&str] = &["csv", "txt"];

const MAX_REPORTED_ERRORS: usize = 100;

/// One uploaded row
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Record {
    /// Line number in the uploaded file (header is line 1)
    pub row: usize,
    pub text: String,
    /// Filled in by cleaning
    pub cleaned: String,
    /// Remaining columns in file order
    pub metadata: Vec<(String, String)>,
}

/// Check an upload before parsing it
pub fn validate_upload(file_name: &str, bytes: &[u8], max_size: usize) -> Result<(), IngestError> {
    if bytes.is_empty() {
        return Err(IngestError::EmptyFile);
    }
    if bytes.len() > max_size {
        return Err(IngestError::TooLarge {
            size: bytes.len(),
            limit: max_size,
        });
    }

    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(IngestError::UnsupportedExtension(file_name.to_string()));
    }

    Ok(())
}

/// Result of reading a CSV upload
#[derive(Debug)]
pub struct CsvReadResult {
    pub headers: Vec<String>,
    /// Header of the column used as message text
    pub text_column: String,
    pub records: Vec<Record>,
    pub rows_processed: usize,
    pub rows_failed: usize,
    pub errors: Vec<String>,
}

/// CSV reader with configurable text column
#[derive(Debug, Clone, Default)]
pub struct CsvReader {
    text_column: Option<String>,
}

impl CsvReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this column as the message text
    pub fn with_text_column(mut self, column: Option<&str>) -> Self {
        self.text_column = column
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        self
    }

    /// Read from a file on disk
    pub fn read_path(&self, path: &Path) -> Result<CsvReadResult, IngestError> {
        let bytes = std::fs::read(path)?;
        self.read_bytes(&bytes)
    }

    /// Read from a CSV string
    pub fn read_str(&self, data: &str) -> Result<CsvReadResult, IngestError> {
        self.read_bytes(data.as_bytes())
    }

    /// Read from raw upload bytes (UTF-8, optional BOM)
    ///
    /// The header must be valid UTF-8. A row that is not is reported as a
    /// failed line and skipped.
    pub fn read_bytes(&self, bytes: &[u8]) -> Result<CsvReadResult, IngestError> {
        let data = bytes.strip_prefix(b"\xef\xbb\xbf".as_slice()).unwrap_or(bytes);

        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(sniff_delimiter(data))
            .from_reader(data);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| {
                if matches!(e.kind(), ::csv::ErrorKind::Utf8 { .. }) {
                    IngestError::Encoding
                } else {
                    IngestError::Csv(e)
                }
            })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(IngestError::NoHeaders);
        }

        let text_idx = self.resolve_text_column(&headers)?;

        let mut records = Vec::new();
        let mut rows_failed = 0;
        let mut errors = Vec::new();

        for (line_num, result) in reader.records().enumerate() {
            let actual_line = line_num + 2;

            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    errors.push(format!("Line {}: {}", actual_line, e));
                    rows_failed += 1;
                    continue;
                }
            };

            let text = record.get(text_idx).unwrap_or_default().to_string();
            let metadata = headers
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != text_idx)
                .map(|(idx, name)| {
                    (
                        name.clone(),
                        record.get(idx).unwrap_or_default().to_string(),
                    )
                })
                .collect();

            records.push(Record {
                row: actual_line,
                text,
                cleaned: String::new(),
                metadata,
            });
        }

        // Truncate errors if too many
        if errors.len() > MAX_REPORTED_ERRORS {
            let total = errors.len();
            errors.truncate(MAX_REPORTED_ERRORS);
            errors.push(format!("... and {} more errors", total - MAX_REPORTED_ERRORS));
        }

        tracing::debug!(
            rows = records.len(),
            failed = rows_failed,
            text_column = %headers[text_idx],
            "Read CSV upload"
        );

        Ok(CsvReadResult {
            text_column: headers[text_idx].clone(),
            rows_processed: records.len(),
            headers,
            records,
            rows_failed,
            errors,
        })
    }

    fn resolve_text_column(&self, headers: &[String]) -> Result<usize, IngestError> {
        if let Some(requested) = &self.text_column {
            return headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(requested))
                .ok_or_else(|| IngestError::MissingColumn {
                    requested: requested.clone(),
                    available: headers.join(", "),
                });
        }

        let detected = TEXT_COLUMN_CANDIDATES.iter().find_map(|candidate| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(candidate))
        });

        Ok(detected.unwrap_or(0))
    }
}

/// Pick `;` when the header line has more semicolons than commas
fn sniff_delimiter(data: &[u8]) -> u8 {
    let header = data.split(|b| *b == b'\n').next().unwrap_or_default();
    let commas = header.iter().filter(|b| **b == b',').count();
    let semicolons = header.iter().filter(|b| **b == b';').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}
