use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;

use crate::snapshot::{LineId, LineSnapshot};
use crate::status::ServiceStatus;

/// Sink table columns, in the order rows are encoded.
pub const SINK_COLUMNS: [&str; 5] = [
    "timestamp",
    "line_id",
    "status",
    "status_reason",
    "active_trains",
];

/// Written in place of a missing `status_reason`. The bulk load declares it
/// as its NULL string, so an empty reason stays an empty string.
pub const NULL_MARKER: &str = "\\N";

#[derive(Serialize)]
struct CsvRow<'a> {
    timestamp: &'a DateTime<Utc>,
    line_id: &'a LineId,
    status: &'a ServiceStatus,
    status_reason: &'a str,
    active_trains: usize,
}

impl<'a> From<&'a LineSnapshot> for CsvRow<'a> {
    fn from(row: &'a LineSnapshot) -> Self {
        Self {
            timestamp: &row.timestamp,
            line_id: &row.line_id,
            status: &row.status,
            status_reason: row.status_reason.as_deref().unwrap_or(NULL_MARKER),
            active_trains: row.active_trains,
        }
    }
}

/// Encodes rows as comma-delimited CSV in [`SINK_COLUMNS`] order.
///
/// A missing `status_reason` is written as [`NULL_MARKER`].
pub fn encode_rows(rows: &[LineSnapshot], with_header: bool) -> Result<Vec<u8>, csv::Error> {
    let mut writer = WriterBuilder::new()
        .has_headers(with_header)
        .from_writer(Vec::new());

    for row in rows {
        writer.serialize(CsvRow::from(row))?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ServiceStatus;
    use chrono::{TimeZone, Utc};

    fn row(line: &str, reason: Option<&str>) -> LineSnapshot {
        LineSnapshot {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 3, 18, 5, 30).unwrap(),
            line_id: line.parse().unwrap(),
            status: ServiceStatus::Severity("minor_delays".into()),
            status_reason: reason.map(str::to_string),
            active_trains: 21,
        }
    }

    #[test]
    fn test_encode_without_header() {
        let out = encode_rows(&[row("central", None)], false).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "2024-06-03T18:05:30Z,central,minor_delays,\\N,21\n"
        );
    }

    #[test]
    fn test_empty_reason_differs_from_missing_reason() {
        let missing = encode_rows(&[row("circle", None)], false).unwrap();
        let empty = encode_rows(&[row("circle", Some(""))], false).unwrap();

        assert_ne!(missing, empty);
        assert_eq!(
            String::from_utf8(empty).unwrap(),
            "2024-06-03T18:05:30Z,circle,minor_delays,,21\n"
        );
    }

    #[test]
    fn test_header_matches_columns() {
        let out = encode_rows(&[row("central", None)], true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().next().unwrap(), SINK_COLUMNS.join(","));
    }

    #[test]
    fn test_reason_with_comma_is_quoted() {
        let out = encode_rows(&[row("circle", Some("Delays, due to signal failure"))], false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(r#","Delays, due to signal failure","#));

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(text.as_bytes());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(record.len(), 5);
        assert_eq!(&record[3], "Delays, due to signal failure");
    }

    #[test]
    fn test_one_line_per_row() {
        let rows = vec![row("bakerloo", None), row("central", Some("x")), row("circle", None)];
        let out = encode_rows(&rows, false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 3);
    }
}
