//! Report Data Structures

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use splitstat_core::{RollingStatRow, RollupRow};
use std::collections::BTreeMap;

/// Complete evaluation report for one experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Experiment and generation metadata
    pub meta: ReportMeta,
    /// Daily rollup table
    pub rollup: Vec<RollupRecord>,
    /// Rolling significance table
    pub rolling: Vec<RollingStatRecord>,
    /// Row and coverage counts
    pub summary: ReportSummary,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Report schema version
    pub schema_version: u32,
    /// Experiment name from config
    pub test_name: String,
    /// Experiment description from config
    pub description: String,
    /// Generation timestamp
    pub generated_at: DateTime<Utc>,
    /// Engine settings the run used
    pub engine: EngineInfo,
}

/// Engine settings captured in report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineInfo {
    /// Resampling iterations per continuous evaluation
    pub resamples: usize,
    /// Confidence level of the proportion intervals
    pub binary_confidence: f64,
    /// Confidence level of the mean-difference intervals
    pub continuous_confidence: f64,
    /// Seed the resampling ran under, if fixed
    pub seed: Option<u64>,
}

/// One daily rollup row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupRecord {
    /// Day the group covers
    pub dt: NaiveDate,
    /// Variant label
    pub test_cell: String,
    /// Metric name → value; null where the denominator summed to zero
    pub metrics: BTreeMap<String, Option<f64>>,
}

impl From<&RollupRow> for RollupRecord {
    fn from(row: &RollupRow) -> Self {
        Self {
            dt: row.day,
            test_cell: row.cell.clone(),
            metrics: row.values.clone(),
        }
    }
}

/// One rolling significance row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingStatRecord {
    /// Latest event day in the evaluated slice
    pub dt: NaiveDate,
    /// Variant label
    pub test_cell: String,
    /// Metric name
    pub metric_name: String,
    /// This variant's point estimate
    pub metric_value: f64,
    /// Two-sided p-value (shared across the variant pair)
    pub p_value: f64,
    /// Interval lower bound (shared across the variant pair)
    pub lower_ci: f64,
    /// Interval upper bound (shared across the variant pair)
    pub upper_ci: f64,
}

impl From<&RollingStatRow> for RollingStatRecord {
    fn from(row: &RollingStatRow) -> Self {
        Self {
            dt: row.day,
            test_cell: row.cell.clone(),
            metric_name: row.metric.clone(),
            metric_value: row.value,
            p_value: row.p_value,
            lower_ci: row.ci_lower,
            upper_ci: row.ci_upper,
        }
    }
}

/// Report summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Distinct days in the rollup table
    pub days_observed: usize,
    /// Distinct days carried by rolling rows
    pub cutoffs_evaluated: usize,
    /// Distinct metric names across both tables
    pub metrics: usize,
    /// Rollup row count
    pub rollup_rows: usize,
    /// Rolling row count
    pub rolling_rows: usize,
}

/// Assemble a report from the engine's output tables.
pub fn build_report(
    test_name: &str,
    description: &str,
    engine: EngineInfo,
    rollup: &[RollupRow],
    rolling: &[RollingStatRow],
) -> Report {
    let rollup_records: Vec<RollupRecord> = rollup.iter().map(RollupRecord::from).collect();
    let rolling_records: Vec<RollingStatRecord> =
        rolling.iter().map(RollingStatRecord::from).collect();

    let days_observed = distinct(rollup_records.iter().map(|r| r.dt));
    let cutoffs_evaluated = distinct(rolling_records.iter().map(|r| r.dt));
    let metric_names: std::collections::BTreeSet<&str> = rollup_records
        .iter()
        .flat_map(|r| r.metrics.keys().map(String::as_str))
        .chain(rolling_records.iter().map(|r| r.metric_name.as_str()))
        .collect();

    let summary = ReportSummary {
        days_observed,
        cutoffs_evaluated,
        metrics: metric_names.len(),
        rollup_rows: rollup_records.len(),
        rolling_rows: rolling_records.len(),
    };

    Report {
        meta: ReportMeta {
            schema_version: 1,
            test_name: test_name.to_string(),
            description: description.to_string(),
            generated_at: Utc::now(),
            engine,
        },
        rollup: rollup_records,
        rolling: rolling_records,
        summary,
    }
}

fn distinct<T: Ord>(items: impl Iterator<Item = T>) -> usize {
    items.collect::<std::collections::BTreeSet<T>>().len()
}
