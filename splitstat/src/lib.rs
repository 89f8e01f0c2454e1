#![warn(missing_docs)]
//! # Splitstat
//!
//! A/B experiment evaluation from event-level data.
//!
//! Given observations tagged with a timestamp, a variant label, and numeric
//! metric columns, splitstat computes:
//! - a **daily rollup**: one aggregated value per metric per (day, variant)
//! - a **rolling significance series**: for every day since the experiment
//!   started, the cumulative point estimate, two-sided p-value, and
//!   confidence interval for every metric
//!
//! Binary metrics (ratios of summed columns) use a two-proportion z-test
//! with a Wald interval on the rate difference. Continuous metrics use a
//! permutation-style bootstrap p-value on the two-sample t statistic and a
//! percentile bootstrap interval on the mean difference. Resampling fans out
//! on the rayon pool and is reproducible under a fixed seed.
//!
//! ## Quick Start
//!
//! ```ignore
//! use splitstat::{EngineConfig, EventFrame, MetricKind, MetricSpec};
//! use splitstat::{daily_rollup, rolling_stats};
//!
//! let frame = EventFrame::new(timestamps, cells, columns)?;
//! let specs = vec![
//!     MetricSpec::parse("ctr", MetricKind::Binary, "clicks/impressions")?,
//!     MetricSpec::parse("revenue", MetricKind::Continuous, "revenue")?,
//! ];
//!
//! let rollup = daily_rollup(&frame, &specs)?;
//! let rolling = rolling_stats(&frame, &specs, &EngineConfig::default())?;
//! ```

// Re-export the engine
pub use splitstat_core::{
    COUNT, ConfigError, DT, EngineConfig, EventFrame, FrameSlice, MetricKind, MetricSpec,
    MissingDataPolicy, RollingError, RollingStatRow, RollupRow, SchemaError, TEST_CELL,
    VariantPair, daily_rollup, rolling_stats,
};

// Re-export the estimators
pub use splitstat_stats::{
    ArmCounts, MeanTestConfig, MeanTestError, MeanTestResult, ProportionTestConfig,
    ProportionTestError, ProportionTestResult, compare_means, compare_proportions,
};

// Re-export report assembly
pub use splitstat_report::{
    EngineInfo, OutputFormat, Report, build_report, generate_json_report, rolling_stats_csv,
    rollup_csv,
};

/// Run the splitstat CLI harness.
///
/// Call this from a binary's `main()`:
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     splitstat::run()
/// }
/// ```
pub use splitstat_cli::run;
