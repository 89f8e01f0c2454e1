//! CSV Ingestion
//!
//! Reads event-level data from a headered CSV into an `EventFrame`: the
//! configured date and variant columns are renamed to the canonical
//! `DT`/`TEST_CELL`, every remaining header is upper-cased, and every
//! remaining value is parsed as f64. The frame must contain exactly two
//! distinct variant labels.

use crate::config::ExperimentConfig;
use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime};
use splitstat_core::EventFrame;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Read events from a CSV file.
pub fn read_events(path: impl AsRef<Path>, config: &ExperimentConfig) -> Result<EventFrame> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open events file {}", path.display()))?;
    let frame = read_events_from(file, config)?;
    info!(events = frame.len(), path = %path.display(), "loaded events");
    Ok(frame)
}

/// Read events from any CSV source.
pub fn read_events_from(source: impl Read, config: &ExperimentConfig) -> Result<EventFrame> {
    let mut reader = csv::Reader::from_reader(source);

    let headers = reader
        .headers()
        .context("Failed to read CSV header")?
        .clone();
    let find = |field: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(field))
            .with_context(|| format!("Events CSV is missing the {field:?} column"))
    };
    let date_idx = find(&config.date_field)?;
    let cell_idx = find(&config.test_cell_field)?;

    let metric_headers: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != date_idx && *i != cell_idx)
        .map(|(i, h)| (i, h.trim().to_uppercase()))
        .collect();

    let mut timestamps = Vec::new();
    let mut cells = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); metric_headers.len()];

    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV row {}", row + 2))?;

        let raw_date = record.get(date_idx).unwrap_or_default();
        timestamps.push(
            parse_timestamp(raw_date)
                .with_context(|| format!("Bad date {raw_date:?} on row {}", row + 2))?,
        );
        cells.push(record.get(cell_idx).unwrap_or_default().to_string());

        for (column, (idx, name)) in values.iter_mut().zip(&metric_headers) {
            let raw = record.get(*idx).unwrap_or_default();
            let value: f64 = raw.trim().parse().with_context(|| {
                format!("Non-numeric value {raw:?} in column {name:?} on row {}", row + 2)
            })?;
            column.push(value);
        }
    }

    if timestamps.is_empty() {
        bail!("Events CSV contains no data rows");
    }

    let columns: BTreeMap<String, Vec<f64>> = metric_headers
        .into_iter()
        .map(|(_, name)| name)
        .zip(values)
        .collect();

    let frame = EventFrame::new(timestamps, cells, columns)
        .context("Events CSV failed schema validation")?;
    frame
        .variant_pair()
        .context("Events CSV failed schema validation")?;
    Ok(frame)
}

/// Parse a timestamp as a full datetime or a bare date.
fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts);
        }
    }
    bail!("Unrecognized timestamp format: {raw:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_fields(date_field: &str, cell_field: &str) -> ExperimentConfig {
        ExperimentConfig::parse(&format!(
            r#"
            test_name = "exp"
            description = "a test"
            date_field = "{date_field}"
            test_cell_field = "{cell_field}"

            [metrics.ctr]
            type = "binary"
            function = "clicks/impressions"
        "#
        ))
        .unwrap()
    }

    #[test]
    fn test_reads_and_renames_columns() {
        let csv_data = "\
event_date,bucket,clicks,impressions
2024-06-01,control,1,10
2024-06-01T09:30:00,treatment,2,12
2024-06-02 14:00:00,control,0,9
";
        let config = config_with_fields("event_date", "bucket");
        let frame = read_events_from(csv_data.as_bytes(), &config).unwrap();

        assert_eq!(frame.len(), 3);
        assert_eq!(frame.column("CLICKS").unwrap(), &[1.0, 2.0, 0.0]);
        assert_eq!(frame.column("IMPRESSIONS").unwrap(), &[10.0, 12.0, 9.0]);

        let pair = frame.variant_pair().unwrap();
        assert_eq!(pair.test, "control");
        assert_eq!(pair.control, "treatment");
    }

    #[test]
    fn test_missing_date_column() {
        let csv_data = "when,bucket,clicks,impressions\n2024-06-01,a,1,2\n";
        let config = config_with_fields("event_date", "bucket");

        let err = read_events_from(csv_data.as_bytes(), &config).unwrap_err();
        assert!(err.to_string().contains("event_date"));
    }

    #[test]
    fn test_non_numeric_value() {
        let csv_data = "\
event_date,bucket,clicks,impressions
2024-06-01,a,one,10
2024-06-01,b,1,10
";
        let config = config_with_fields("event_date", "bucket");
        assert!(read_events_from(csv_data.as_bytes(), &config).is_err());
    }

    #[test]
    fn test_bad_timestamp() {
        let csv_data = "\
event_date,bucket,clicks,impressions
06/01/2024,a,1,10
";
        let config = config_with_fields("event_date", "bucket");
        assert!(read_events_from(csv_data.as_bytes(), &config).is_err());
    }

    #[test]
    fn test_single_cell_rejected() {
        let csv_data = "\
event_date,bucket,clicks,impressions
2024-06-01,only,1,10
2024-06-02,only,2,12
";
        let config = config_with_fields("event_date", "bucket");
        assert!(read_events_from(csv_data.as_bytes(), &config).is_err());
    }

    #[test]
    fn test_empty_file_rejected() {
        let csv_data = "event_date,bucket,clicks,impressions\n";
        let config = config_with_fields("event_date", "bucket");
        assert!(read_events_from(csv_data.as_bytes(), &config).is_err());
    }
}
