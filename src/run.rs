//! One collection run: collect, then ingest.
//!
//! There is no timer here. Runs are started by an external scheduler, which
//! is also responsible for never letting two runs overlap.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::clock::Clock;
use crate::collector::Collector;
use crate::error::StorageError;
use crate::fetch::HttpClient;
use crate::ingest::{Ingestor, SnapshotSink};
use crate::snapshot::LineId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_at: DateTime<Utc>,
    pub attempted: usize,
    pub collected: usize,
    pub failed_lines: Vec<String>,
    pub rows_written: u64,
}

impl RunSummary {
    /// True when every line failed and storage was never called.
    pub fn is_noop(&self) -> bool {
        self.collected == 0
    }
}

/// Collects `line_ids` and writes the resulting batch.
///
/// Upstream failures only shrink the batch. A storage failure fails the run
/// and the batch is dropped; the next run fetches afresh.
#[tracing::instrument(skip_all, fields(lines = line_ids.len()))]
pub async fn run_once<C, K, S>(
    collector: &Collector<C, K>,
    line_ids: &[LineId],
    ingestor: &Ingestor<S>,
) -> Result<RunSummary, StorageError>
where
    C: HttpClient,
    K: Clock,
    S: SnapshotSink,
{
    info!("Starting data collection run");

    let batch = collector.collect(line_ids).await;
    let rows_written = ingestor.ingest(&batch).await?;

    Ok(RunSummary {
        run_at: batch.run_at,
        attempted: line_ids.len(),
        collected: batch.len(),
        failed_lines: batch
            .failures
            .iter()
            .map(|f| f.line_id.to_string())
            .collect(),
        rows_written,
    })
}
