#![warn(missing_docs)]
//! Splitstat Report - Persistence-Ready Output
//!
//! Converts the engine's row vectors into a serializable `Report` and
//! generates the output formats:
//! - JSON (machine-readable, full report)
//! - CSV (one file per table, spreadsheet/warehouse-compatible)
//!
//! Human-readable terminal output lives with the CLI; this crate never
//! performs I/O itself.

mod csv_out;
mod json;
mod report;

pub use csv_out::{ReportCsvError, rolling_stats_csv, rollup_csv};
pub use json::generate_json_report;
pub use report::{
    EngineInfo, Report, ReportMeta, ReportSummary, RollingStatRecord, RollupRecord, build_report,
};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON with the full report schema
    Json,
    /// CSV tables
    Csv,
    /// Human-readable terminal output
    Human,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("CSV").unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Human);
        assert!(OutputFormat::from_str("yaml").is_err());
    }
}
