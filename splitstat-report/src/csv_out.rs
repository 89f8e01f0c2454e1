//! CSV Output
//!
//! One generator per table. The rollup table has a dynamic column set (one
//! per metric), so its header is the union of metric names across all rows;
//! a row missing a metric, or carrying a null value, writes an empty field.

use crate::report::{RollingStatRecord, RollupRecord};
use std::collections::BTreeSet;
use thiserror::Error;

/// Failures while generating CSV output
#[derive(Debug, Error)]
pub enum ReportCsvError {
    /// Record serialization failed
    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),
    /// Flushing the in-memory writer failed
    #[error("CSV buffer error: {0}")]
    Io(#[from] std::io::Error),
    /// The writer produced invalid UTF-8 (unreachable for our records)
    #[error("CSV output was not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Generate the daily rollup table as CSV.
pub fn rollup_csv(rollup: &[RollupRecord]) -> Result<String, ReportCsvError> {
    let metric_names: BTreeSet<&str> = rollup
        .iter()
        .flat_map(|r| r.metrics.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["DT", "TEST_CELL"];
    header.extend(metric_names.iter().copied());
    writer.write_record(&header)?;

    for record in rollup {
        let mut fields = vec![record.dt.to_string(), record.test_cell.clone()];
        for name in &metric_names {
            let value = record
                .metrics
                .get(*name)
                .copied()
                .flatten()
                .map(|v| v.to_string())
                .unwrap_or_default();
            fields.push(value);
        }
        writer.write_record(&fields)?;
    }

    finish(writer)
}

/// Generate the rolling significance table as CSV.
pub fn rolling_stats_csv(rolling: &[RollingStatRecord]) -> Result<String, ReportCsvError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record([
        "DT",
        "TEST_CELL",
        "METRIC_NAME",
        "METRIC_VALUE",
        "P_VALUE",
        "LOWER_CI",
        "UPPER_CI",
    ])?;

    for record in rolling {
        writer.write_record([
            record.dt.to_string(),
            record.test_cell.clone(),
            record.metric_name.clone(),
            record.metric_value.to_string(),
            record.p_value.to_string(),
            record.lower_ci.to_string(),
            record.upper_ci.to_string(),
        ])?;
    }

    finish(writer)
}

fn finish(mut writer: csv::Writer<Vec<u8>>) -> Result<String, ReportCsvError> {
    writer.flush()?;
    let bytes = writer
        .into_inner()
        .map_err(|e| ReportCsvError::Io(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}
