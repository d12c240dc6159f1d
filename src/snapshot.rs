use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, UpstreamError};
use crate::status::{ServiceStatus, normalize_status};
use crate::tfl::{LineStatus, Prediction};

/// Identifier of one metro line as used in upstream paths, e.g. `hammersmith-city`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for LineId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(ConfigError::Invalid {
                var: "LINE_IDS",
                reason: format!("'{s}' is not a line identifier"),
            });
        }
        Ok(LineId(s.to_string()))
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One observation of one line. Field order is the sink column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSnapshot {
    pub timestamp: DateTime<Utc>,
    pub line_id: LineId,
    pub status: ServiceStatus,
    pub status_reason: Option<String>,
    pub active_trains: usize,
}

impl LineSnapshot {
    /// Builds the snapshot for `line_id` from its current status and arrivals.
    pub fn derive(
        timestamp: DateTime<Utc>,
        line_id: LineId,
        status: &LineStatus,
        arrivals: &[Prediction],
    ) -> Self {
        LineSnapshot {
            timestamp,
            line_id,
            status: normalize_status(
                &status.status_severity_description,
                status.reason.as_deref(),
            ),
            status_reason: status.reason.clone(),
            active_trains: count_active_trains(arrivals),
        }
    }
}

/// Number of distinct vehicles reporting a prediction.
///
/// Predictions without a vehicle id are not counted. Ids are compared as sent.
pub fn count_active_trains(arrivals: &[Prediction]) -> usize {
    arrivals
        .iter()
        .filter_map(|p| p.vehicle_id.as_deref())
        .collect::<HashSet<_>>()
        .len()
}

/// A line that produced no snapshot this run, and why.
#[derive(Debug)]
pub struct LineFailure {
    pub line_id: LineId,
    pub error: UpstreamError,
}

/// The snapshots of one run, in configured line order.
#[derive(Debug)]
pub struct CollectionBatch {
    pub run_at: DateTime<Utc>,
    pub snapshots: Vec<LineSnapshot>,
    pub failures: Vec<LineFailure>,
}

impl CollectionBatch {
    pub fn new(run_at: DateTime<Utc>) -> Self {
        Self {
            run_at,
            snapshots: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn line_ids(&self) -> impl Iterator<Item = &LineId> {
        self.snapshots.iter().map(|s| &s.line_id)
    }
}
