//! PostgreSQL sink using `COPY ... FROM STDIN`.
//!
//! One connection and one transaction per batch. The batch is streamed as a
//! single CSV payload, so the rows commit together or not at all.

use async_trait::async_trait;
use sqlx::Connection;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use tracing::{debug, warn};

use super::{NULL_MARKER, SINK_COLUMNS, SnapshotSink, encode_rows};
use crate::config::validate_table_name;
use crate::error::{ConfigError, StorageError};
use crate::snapshot::LineSnapshot;

pub struct PostgresSink {
    options: PgConnectOptions,
    table: String,
}

impl PostgresSink {
    pub fn new(options: PgConnectOptions, table: &str) -> Result<Self, ConfigError> {
        validate_table_name(table)?;
        Ok(Self {
            options,
            table: table.to_string(),
        })
    }

    pub fn copy_statement(&self) -> String {
        format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT csv, NULL '{}')",
            self.table,
            SINK_COLUMNS.join(", "),
            NULL_MARKER
        )
    }

    async fn copy_in_transaction(
        &self,
        conn: &mut PgConnection,
        payload: &[u8],
    ) -> Result<u64, StorageError> {
        let mut tx = conn.begin().await.map_err(StorageError::Connect)?;

        let mut copy = tx
            .copy_in_raw(&self.copy_statement())
            .await
            .map_err(|source| self.copy_error(source))?;

        if let Err(source) = copy.send(payload).await {
            if let Err(e) = copy.abort("batch upload failed").await {
                debug!(error = %e, "COPY abort reported an error");
            }
            return Err(self.copy_error(source));
        }

        // Constraint and type errors surface here; dropping `tx` rolls back.
        let rows = copy.finish().await.map_err(|source| self.copy_error(source))?;

        tx.commit().await.map_err(StorageError::Commit)?;
        Ok(rows)
    }

    fn copy_error(&self, source: sqlx::Error) -> StorageError {
        StorageError::Copy {
            table: self.table.clone(),
            source,
        }
    }
}

#[async_trait]
impl SnapshotSink for PostgresSink {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn append_batch(&self, rows: &[LineSnapshot]) -> Result<u64, StorageError> {
        let payload = encode_rows(rows, false)?;

        let mut conn = PgConnection::connect_with(&self.options)
            .await
            .map_err(StorageError::Connect)?;

        let result = self.copy_in_transaction(&mut conn, &payload).await;

        if let Err(e) = conn.close().await {
            warn!(error = %e, "Storage connection did not close cleanly");
        }

        result
    }
}
