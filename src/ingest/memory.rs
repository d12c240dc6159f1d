use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::SnapshotSink;
use crate::error::StorageError;
use crate::snapshot::LineSnapshot;

/// In-process sink used for dry runs and tests.
///
/// Rows are staged and published under a single lock, so a failed append
/// leaves previously stored rows untouched and adds none.
#[derive(Default)]
pub struct MemorySink {
    rows: Mutex<Vec<LineSnapshot>>,
    fail_after: Option<usize>,
    append_calls: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose appends fail once `n` rows of a batch have been staged.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    /// Rows that have been committed so far.
    pub fn rows(&self) -> Vec<LineSnapshot> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn append_batch(&self, rows: &[LineSnapshot]) -> Result<u64, StorageError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);

        let mut staged = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            if self.fail_after == Some(i) {
                return Err(StorageError::Rejected(format!(
                    "injected failure after {i} rows"
                )));
            }
            staged.push(row.clone());
        }

        let mut stored = self
            .rows
            .lock()
            .map_err(|_| StorageError::Rejected("memory sink lock poisoned".to_string()))?;
        stored.extend(staged);
        Ok(rows.len() as u64)
    }
}
