//! Append-only CSV file sink.
//!
//! Useful for local runs without a database. The header is written only when
//! the file is new.

use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{SnapshotSink, encode_rows};
use crate::error::StorageError;
use crate::snapshot::LineSnapshot;

pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotSink for CsvFileSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn append_batch(&self, rows: &[LineSnapshot]) -> Result<u64, StorageError> {
        let file_exists = fs::metadata(&self.path)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        debug!(path = %self.path.display(), file_exists, "Appending CSV rows");

        // Encode the whole batch first so a failure leaves the file untouched.
        let payload = encode_rows(rows, !file_exists)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        file.write_all(&payload)?;
        file.sync_data()?;

        Ok(rows.len() as u64)
    }
}
