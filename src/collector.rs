//! Per-line collection with failure isolation.
//!
//! Each configured line costs two upstream calls (status, then arrivals). A
//! line whose calls fail is logged and left out of the batch; the remaining
//! lines are unaffected. Lines may be fetched concurrently, but the batch is
//! always assembled in configured order.

use futures::stream::{self, StreamExt};
use tracing::{Instrument, error, info, info_span};

use crate::clock::Clock;
use crate::error::UpstreamError;
use crate::fetch::HttpClient;
use crate::snapshot::{CollectionBatch, LineFailure, LineId, LineSnapshot};
use crate::tfl::TflClient;

pub struct Collector<C, K> {
    tfl: TflClient<C>,
    clock: K,
    concurrency: usize,
}

impl<C: HttpClient, K: Clock> Collector<C, K> {
    /// A collector that processes one line at a time.
    pub fn new(tfl: TflClient<C>, clock: K) -> Self {
        Self {
            tfl,
            clock,
            concurrency: 1,
        }
    }

    /// Allows up to `concurrency` lines in flight at once (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Collects a snapshot for every line in `line_ids` that can be fetched.
    ///
    /// Never fails: upstream errors are recorded in
    /// [`CollectionBatch::failures`] and the line is skipped.
    #[tracing::instrument(skip_all, fields(lines = line_ids.len(), concurrency = self.concurrency))]
    pub async fn collect(&self, line_ids: &[LineId]) -> CollectionBatch {
        let mut batch = CollectionBatch::new(self.clock.now());

        // `buffered` yields in input order regardless of completion order.
        let outcomes: Vec<(LineId, Result<LineSnapshot, UpstreamError>)> =
            stream::iter(line_ids.iter().cloned())
                .map(|line_id| {
                    let span = info_span!("collect_line", line_id = %line_id);
                    async move {
                        let outcome = self.collect_line(&line_id).await;
                        match &outcome {
                            Ok(snap) => info!(
                                status = %snap.status,
                                active_trains = snap.active_trains,
                                "Line collected"
                            ),
                            Err(e) => error!(error = %e, "Line collection failed, skipping"),
                        }
                        (line_id, outcome)
                    }
                    .instrument(span)
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        for (line_id, outcome) in outcomes {
            match outcome {
                Ok(snapshot) => batch.snapshots.push(snapshot),
                Err(error) => batch.failures.push(LineFailure { line_id, error }),
            }
        }

        info!(
            collected = batch.snapshots.len(),
            failed = batch.failures.len(),
            "Collection finished"
        );
        batch
    }

    async fn collect_line(&self, line_id: &LineId) -> Result<LineSnapshot, UpstreamError> {
        let status = self.tfl.line_status(line_id.as_str()).await?;
        let arrivals = self.tfl.line_arrivals(line_id.as_str()).await?;

        Ok(LineSnapshot::derive(
            self.clock.now(),
            line_id.clone(),
            &status,
            &arrivals,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::fetch::StubClient;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use std::time::Duration;

    const GOOD: &str = r#"[{"lineStatuses": [{"statusSeverityDescription": "Good Service"}]}]"#;

    fn lines(ids: &[&str]) -> Vec<LineId> {
        ids.iter().map(|id| id.parse().unwrap()).collect()
    }

    fn stub_line(stub: StubClient, line: &str, arrivals: &str) -> StubClient {
        stub.with_json(&format!("/Line/{line}/Status"), GOOD)
            .with_json(&format!("/Line/{line}/Arrivals"), arrivals)
    }

    fn collector(stub: Arc<StubClient>) -> Collector<Arc<StubClient>, FixedClock> {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 15, 17, 30, 0).unwrap());
        let tfl = TflClient::new(stub, "https://api.example.test").unwrap();
        Collector::new(tfl, clock)
    }

    #[tokio::test]
    async fn test_failed_line_is_skipped() {
        let stub = StubClient::new();
        let stub = stub_line(stub, "bakerloo", r#"[{"vehicleId": "1"}]"#);
        let stub = stub.with_status("/Line/central/Status", 500);
        let stub = stub_line(stub, "circle", r#"[{"vehicleId": "7"}, {"vehicleId": "8"}]"#);

        let batch = collector(Arc::new(stub))
            .collect(&lines(&["bakerloo", "central", "circle"]))
            .await;

        let collected: Vec<_> = batch.line_ids().map(LineId::as_str).collect();
        assert_eq!(collected, vec!["bakerloo", "circle"]);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].line_id.as_str(), "central");
        assert_eq!(batch.snapshots[1].active_trains, 2);
    }

    #[tokio::test]
    async fn test_arrivals_failure_drops_line() {
        let stub = StubClient::new()
            .with_json("/Line/district/Status", GOOD)
            .with_json("/Line/district/Arrivals", r#"{"not": "a list"}"#);

        let batch = collector(Arc::new(stub)).collect(&lines(&["district"])).await;

        assert!(batch.is_empty());
        assert!(matches!(
            batch.failures[0].error,
            UpstreamError::Decode { .. }
        ));
    }

    #[tokio::test]
    async fn test_status_then_arrivals_per_line() {
        let stub = Arc::new(stub_line(StubClient::new(), "circle", "[]"));

        collector(stub.clone()).collect(&lines(&["circle"])).await;

        assert_eq!(
            stub.requests(),
            vec!["/Line/circle/Status", "/Line/circle/Arrivals"]
        );
    }

    #[tokio::test]
    async fn test_status_failure_skips_arrivals_call() {
        let stub = Arc::new(StubClient::new().with_status("/Line/circle/Status", 429));

        let batch = collector(stub.clone()).collect(&lines(&["circle"])).await;

        assert!(batch.is_empty());
        assert_eq!(stub.requests(), vec!["/Line/circle/Status"]);
    }

    #[tokio::test]
    async fn test_concurrent_collection_keeps_configured_order() {
        let mut stub = StubClient::new();
        for line in ["bakerloo", "central", "circle", "district"] {
            stub = stub_line(stub, line, "[]");
        }
        // The first line finishes last.
        let stub = stub.with_delay("/Line/bakerloo/Arrivals", Duration::from_millis(80));

        let batch = collector(Arc::new(stub))
            .with_concurrency(4)
            .collect(&lines(&["bakerloo", "central", "circle", "district"]))
            .await;

        let collected: Vec<_> = batch.line_ids().map(LineId::as_str).collect();
        assert_eq!(collected, vec!["bakerloo", "central", "circle", "district"]);
    }

    #[tokio::test]
    async fn test_snapshot_uses_clock() {
        let stub = Arc::new(stub_line(StubClient::new(), "circle", "[]"));

        let batch = collector(stub).collect(&lines(&["circle"])).await;

        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 17, 30, 0).unwrap();
        assert_eq!(batch.run_at, expected);
        assert_eq!(batch.snapshots[0].timestamp, expected);
    }

    #[tokio::test]
    async fn test_no_lines_gives_empty_batch() {
        let stub = Arc::new(StubClient::new());
        let batch = collector(stub.clone()).collect(&[]).await;
        assert!(batch.is_empty());
        assert!(stub.requests().is_empty());
    }

    #[test]
    fn test_concurrency_is_at_least_one() {
        let c = collector(Arc::new(StubClient::new())).with_concurrency(0);
        assert_eq!(c.concurrency, 1);
    }
}
