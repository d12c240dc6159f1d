//! Persisting a [`CollectionBatch`].
//!
//! Storage backends implement [`SnapshotSink`], a single all-or-nothing
//! "append these rows" operation. [`Ingestor`] wraps a sink and skips it
//! entirely when there is nothing to write.

mod csv_file;
mod encode;
mod memory;
mod postgres;

pub use csv_file::CsvFileSink;
pub use encode::{NULL_MARKER, SINK_COLUMNS, encode_rows};
pub use memory::MemorySink;
pub use postgres::PostgresSink;

use async_trait::async_trait;
use tracing::info;

use crate::error::StorageError;
use crate::snapshot::{CollectionBatch, LineSnapshot};

/// An append-only destination for snapshot rows.
///
/// `append_batch` must persist every row or none of them, and must release
/// any connection it opened before returning.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Appends `rows` and returns the number of rows written.
    async fn append_batch(&self, rows: &[LineSnapshot]) -> Result<u64, StorageError>;
}

pub struct Ingestor<S> {
    sink: S,
}

impl<S: SnapshotSink> Ingestor<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Writes the batch in one bulk append. An empty batch never touches storage.
    #[tracing::instrument(skip_all, fields(sink = self.sink.name(), rows = batch.len()))]
    pub async fn ingest(&self, batch: &CollectionBatch) -> Result<u64, StorageError> {
        if batch.is_empty() {
            info!("No data was collected, skipping storage");
            return Ok(0);
        }

        let written = self.sink.append_batch(&batch.snapshots).await?;
        info!(written, "Batch persisted");
        Ok(written)
    }
}
