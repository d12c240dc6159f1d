//! Service-status normalization.
//!
//! Upstream severity text is folded into a short category that is stable
//! enough to group on: `"Severe Delays"` becomes `severe_delays`. A reason
//! announcing good service "on the rest of the line" marks a split line and
//! overrides the severity with [`ServiceStatus::Partial`].

use serde::{Serialize, Serializer};
use std::fmt;

/// Phrase the operator uses when only part of a line is disrupted.
///
/// Matched case-insensitively against the status reason. Only this phrasing
/// is recognised; other partial-outage wordings fall through to the severity.
pub const PARTIAL_SERVICE_MARKER: &str = "good service on the rest";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceStatus {
    /// Part of the line runs normally, part does not.
    Partial,
    /// Severity description, lowercased with spaces replaced by underscores.
    Severity(String),
}

impl ServiceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ServiceStatus::Partial => "Partial",
            ServiceStatus::Severity(s) => s,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ServiceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Derives the status category for one line.
pub fn normalize_status(severity: &str, reason: Option<&str>) -> ServiceStatus {
    let partial = reason
        .map(|r| r.to_lowercase().contains(PARTIAL_SERVICE_MARKER))
        .unwrap_or(false);

    if partial {
        ServiceStatus::Partial
    } else {
        ServiceStatus::Severity(severity.replace(' ', "_").to_lowercase())
    }
}
