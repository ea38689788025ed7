//! Schema-matching reader for the statewide registration extract.
//!
//! The source is a multi-gigabyte tab-delimited file in a Latin-1
//! compatible encoding, optionally quote-wrapped and optionally
//! header-less. The reader streams it in bounded batches of string
//! rows, normalizes headers, skips rows whose field count does not
//! match the layout, and reports schema drift against the expected
//! column list instead of failing on it.
//!
//! Field values are trimmed of surrounding whitespace and whitespace-
//! only fields become NULLs; the extract pads some fixed-width columns
//! with spaces and carries no values where leading or trailing
//! whitespace is significant.

use crate::columns::EXPECTED_COLUMNS;
use common::Result;
use csv_async::{AsyncReaderBuilder, ByteRecord};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// One bounded chunk of rows sharing a column layout.
#[derive(Debug, Clone)]
pub struct RowBatch {
    pub columns: Arc<Vec<String>>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RowBatch {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

pub struct BatchReader {
    path: PathBuf,
    batch_size: usize,
    has_headers: bool,
}

impl BatchReader {
    pub fn new(path: impl Into<PathBuf>, batch_size: usize, has_headers: bool) -> Self {
        Self {
            path: path.into(),
            batch_size: batch_size.max(1),
            has_headers,
        }
    }

    /// Full pre-pass line count, used only for progress percentages.
    /// Costs one extra scan of the file before any data is loaded.
    pub async fn count_data_rows(&self) -> Result<u64> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let mut buf = vec![0u8; 64 * 1024];
        let mut newlines: u64 = 0;
        let mut last_byte: Option<u8> = None;
        let mut empty = true;

        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            empty = false;
            newlines += buf[..n].iter().filter(|&&b| b == b'\n').count() as u64;
            last_byte = Some(buf[n - 1]);
        }

        let mut lines = newlines;
        if !empty && last_byte != Some(b'\n') {
            lines += 1;
        }
        if self.has_headers {
            lines = lines.saturating_sub(1);
        }
        Ok(lines)
    }

    /// Open a fresh stream over the file. Streams are restartable only
    /// by opening again from the start.
    pub async fn open(&self) -> Result<BatchStream> {
        let file = tokio::fs::File::open(&self.path).await?;
        let mut reader = AsyncReaderBuilder::new()
            .delimiter(b'\t')
            .quote(b'"')
            .has_headers(self.has_headers)
            .flexible(true)
            .buffer_capacity(1 << 20)
            .create_reader(file);

        let columns: Vec<String> = if self.has_headers {
            let headers = reader.byte_headers().await?;
            headers.iter().map(normalize_header).collect()
        } else {
            EXPECTED_COLUMNS.iter().map(|c| c.to_string()).collect()
        };

        let missing_columns: Vec<String> = EXPECTED_COLUMNS
            .iter()
            .filter(|expected| !columns.iter().any(|c| c == *expected))
            .map(|c| c.to_string())
            .collect();
        let extra_columns: Vec<String> = columns
            .iter()
            .filter(|c| !EXPECTED_COLUMNS.contains(&c.as_str()))
            .cloned()
            .collect();

        if !missing_columns.is_empty() {
            warn!(
                path = %self.path.display(),
                missing = ?missing_columns,
                "Expected columns missing from source file"
            );
        }
        if !extra_columns.is_empty() {
            warn!(
                path = %self.path.display(),
                extra = ?extra_columns,
                "Source file carries unexpected columns"
            );
        }
        debug!(columns = columns.len(), "Opened source file");

        Ok(BatchStream {
            reader,
            columns: Arc::new(columns),
            batch_size: self.batch_size,
            skipped_rows: 0,
            missing_columns,
            extra_columns,
        })
    }
}

pub struct BatchStream {
    reader: csv_async::AsyncReader<tokio::fs::File>,
    columns: Arc<Vec<String>>,
    batch_size: usize,
    skipped_rows: u64,
    missing_columns: Vec<String>,
    extra_columns: Vec<String>,
}

impl BatchStream {
    pub fn columns(&self) -> &Arc<Vec<String>> {
        &self.columns
    }

    /// Expected columns the source file does not carry.
    pub fn missing_columns(&self) -> &[String] {
        &self.missing_columns
    }

    /// Columns the source file carries beyond the expected layout.
    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    /// Malformed rows skipped so far.
    pub fn skipped_rows(&self) -> u64 {
        self.skipped_rows
    }

    /// Next batch of rows, or `None` at end of file. Rows keep file
    /// order; rows with the wrong field count are skipped and counted.
    pub async fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        let mut rows = Vec::with_capacity(self.batch_size);
        let mut record = ByteRecord::new();

        while rows.len() < self.batch_size {
            if !self.reader.read_byte_record(&mut record).await? {
                break;
            }
            if record.len() != self.columns.len() {
                self.skipped_rows += 1;
                debug!(
                    fields = record.len(),
                    expected = self.columns.len(),
                    "Skipping malformed row"
                );
                continue;
            }
            rows.push(record.iter().map(decode_field).collect());
        }

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(RowBatch {
            columns: self.columns.clone(),
            rows,
        }))
    }
}

/// Decode a Latin-1 field. Bytes map one-to-one onto the first 256
/// Unicode code points. Values are trimmed; fields left empty or
/// whitespace-only become NULLs.
fn decode_field(bytes: &[u8]) -> Option<String> {
    let value: String = bytes.iter().map(|&b| b as char).collect();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn normalize_header(bytes: &[u8]) -> String {
    let header: String = bytes.iter().map(|&b| b as char).collect();
    header.trim().replace('"', "")
}
