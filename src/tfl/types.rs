//! Response records for the two per-line endpoints.
//!
//! Only the fields the pipeline reads are declared; anything else the API
//! sends is ignored. Fields the API may omit are `Option`.

use serde::Deserialize;

/// One element of the `/Line/{id}/Status` response array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStatusEntry {
    pub line_statuses: Vec<LineStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStatus {
    pub status_severity_description: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// One element of the `/Line/{id}/Arrivals` response array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    #[serde(default)]
    pub vehicle_id: Option<String>,
}
