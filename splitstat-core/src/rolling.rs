//! Rolling Significance Stats
//!
//! Walks every cutoff day in `[first_day, last_day)`, cumulatively slices
//! the frame, evaluates each metric on the slice, and attaches the shared
//! p-value and interval to both variant rows. Cutoffs are independent pure
//! computations over the immutable frame, so they fan out on the rayon pool.

use crate::event::{EventFrame, FrameSlice, SchemaError, VariantPair};
use crate::metric::{MetricKind, MetricSpec};
use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use splitstat_stats::{
    ArmCounts, DEFAULT_BINARY_CONFIDENCE, DEFAULT_CONTINUOUS_CONFIDENCE, DEFAULT_RESAMPLES,
    MeanTestConfig, MeanTestError, ProportionTestConfig, ProportionTestError, compare_means,
    compare_proportions,
};
use thiserror::Error;
use tracing::{debug, warn};

/// One emitted row of the rolling table.
///
/// The day is the latest day actually present in the slice, not the cutoff
/// boundary. For a fixed (day, metric) the p-value and interval are
/// identical on both variant rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingStatRow {
    /// Latest event day in the evaluated slice
    pub day: NaiveDate,
    /// Variant label
    pub cell: String,
    /// Metric name
    pub metric: String,
    /// This variant's point estimate at the cutoff
    pub value: f64,
    /// Two-sided p-value, shared by both variant rows
    pub p_value: f64,
    /// Interval lower bound, shared by both variant rows
    pub ci_lower: f64,
    /// Interval upper bound, shared by both variant rows
    pub ci_upper: f64,
}

/// What to do when a variant has no data for a metric at a cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingDataPolicy {
    /// Emit no rows for that (cutoff, metric) pair and keep going
    #[default]
    Skip,
    /// Abort the whole run
    Strict,
}

/// Engine settings shared by every evaluator call in a run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Resampling iterations per continuous evaluation
    pub resamples: usize,
    /// Confidence level for the proportion interval
    pub binary_confidence: f64,
    /// Confidence level for the mean-difference interval
    pub continuous_confidence: f64,
    /// Base seed for reproducible resampling; each (cutoff, metric) call
    /// derives its own stream from it
    pub seed: Option<u64>,
    /// Whether to fan out across cutoffs and resample trials
    pub parallel: bool,
    /// Insufficient-data handling
    pub policy: MissingDataPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resamples: DEFAULT_RESAMPLES,
            binary_confidence: DEFAULT_BINARY_CONFIDENCE,
            continuous_confidence: DEFAULT_CONTINUOUS_CONFIDENCE,
            seed: None,
            parallel: true,
            policy: MissingDataPolicy::default(),
        }
    }
}

/// Failures that abort a rolling-stats run.
#[derive(Debug, Error)]
pub enum RollingError {
    /// Frame/spec schema violation
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Proportion evaluation failed in strict mode or on bad config
    #[error("Metric {metric:?} at cutoff {cutoff}: {source}")]
    Proportion {
        /// Metric being evaluated
        metric: String,
        /// Cutoff day
        cutoff: NaiveDate,
        /// Underlying evaluator error
        source: ProportionTestError,
    },
    /// Mean evaluation failed in strict mode or on bad config
    #[error("Metric {metric:?} at cutoff {cutoff}: {source}")]
    Mean {
        /// Metric being evaluated
        metric: String,
        /// Cutoff day
        cutoff: NaiveDate,
        /// Underlying evaluator error
        source: MeanTestError,
    },
}

/// Compute the rolling significance table.
///
/// One cutoff per day in `[min_day, max_day)`; the final day never gets its
/// own cutoff. Each cutoff contributes one row pair (test, control) per
/// metric that has data on both arms, with the day set to the latest day in
/// the slice.
pub fn rolling_stats(
    frame: &EventFrame,
    specs: &[MetricSpec],
    config: &EngineConfig,
) -> Result<Vec<RollingStatRow>, RollingError> {
    if frame.is_empty() || specs.is_empty() {
        return Ok(Vec::new());
    }

    let pair = frame.variant_pair()?;
    for spec in specs {
        frame.require_column(&spec.numerator)?;
        frame.require_column(&spec.denominator)?;
    }

    // min/max exist: the frame is non-empty.
    let (Some(first), Some(last)) = (frame.min_day(), frame.max_day()) else {
        return Ok(Vec::new());
    };
    let cutoffs: Vec<NaiveDate> = first.iter_days().take_while(|d| *d < last).collect();
    debug!(
        cutoffs = cutoffs.len(),
        metrics = specs.len(),
        "starting rolling evaluation"
    );

    let per_cutoff: Vec<Result<Vec<RollingStatRow>, RollingError>> = if config.parallel {
        cutoffs
            .par_iter()
            .map(|&cutoff| evaluate_cutoff(frame, specs, &pair, cutoff, config))
            .collect()
    } else {
        cutoffs
            .iter()
            .map(|&cutoff| evaluate_cutoff(frame, specs, &pair, cutoff, config))
            .collect()
    };

    let mut rows = Vec::new();
    for result in per_cutoff {
        rows.extend(result?);
    }
    Ok(rows)
}

/// Evaluate every metric on the cumulative slice at one cutoff.
fn evaluate_cutoff(
    frame: &EventFrame,
    specs: &[MetricSpec],
    pair: &VariantPair,
    cutoff: NaiveDate,
    config: &EngineConfig,
) -> Result<Vec<RollingStatRow>, RollingError> {
    let slice = frame.slice_through(cutoff);
    let Some(day) = slice.max_day() else {
        return Ok(Vec::new());
    };

    let mut rows = Vec::with_capacity(specs.len() * 2);
    for (index, spec) in specs.iter().enumerate() {
        let outcome = match spec.kind {
            MetricKind::Binary => evaluate_binary(&slice, spec, pair, config),
            MetricKind::Continuous => {
                evaluate_continuous(&slice, spec, pair, config, derive_seed(config, cutoff, index))
            }
        };
        match outcome {
            Ok(Some(stat)) => {
                // Test row first, then control, sharing the joint stats.
                rows.push(RollingStatRow {
                    day,
                    cell: pair.test.clone(),
                    metric: spec.name.clone(),
                    value: stat.test_value,
                    p_value: stat.p_value,
                    ci_lower: stat.ci_lower,
                    ci_upper: stat.ci_upper,
                });
                rows.push(RollingStatRow {
                    day,
                    cell: pair.control.clone(),
                    metric: spec.name.clone(),
                    value: stat.control_value,
                    p_value: stat.p_value,
                    ci_lower: stat.ci_lower,
                    ci_upper: stat.ci_upper,
                });
            }
            Ok(None) => {
                warn!(metric = %spec.name, %cutoff, "insufficient data, skipping cutoff");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(rows)
}

struct CutoffStat {
    test_value: f64,
    control_value: f64,
    p_value: f64,
    ci_lower: f64,
    ci_upper: f64,
}

fn evaluate_binary(
    slice: &FrameSlice<'_>,
    spec: &MetricSpec,
    pair: &VariantPair,
    config: &EngineConfig,
) -> Result<Option<CutoffStat>, RollingError> {
    let control = ArmCounts {
        successes: slice.sum_for_cell(&spec.numerator, &pair.control)?,
        trials: slice.sum_for_cell(&spec.denominator, &pair.control)?,
    };
    let test = ArmCounts {
        successes: slice.sum_for_cell(&spec.numerator, &pair.test)?,
        trials: slice.sum_for_cell(&spec.denominator, &pair.test)?,
    };

    let test_config = ProportionTestConfig {
        confidence_level: config.binary_confidence,
    };
    match compare_proportions(control, test, &test_config) {
        Ok(result) => Ok(Some(CutoffStat {
            test_value: result.test_rate,
            control_value: result.control_rate,
            p_value: result.p_value,
            ci_lower: result.ci_lower,
            ci_upper: result.ci_upper,
        })),
        Err(
            err @ (ProportionTestError::ZeroControlTrials | ProportionTestError::ZeroTestTrials),
        ) => match config.policy {
            MissingDataPolicy::Skip => Ok(None),
            MissingDataPolicy::Strict => Err(RollingError::Proportion {
                metric: spec.name.clone(),
                cutoff: slice.max_day().unwrap_or_default(),
                source: err,
            }),
        },
        Err(err) => Err(RollingError::Proportion {
            metric: spec.name.clone(),
            cutoff: slice.max_day().unwrap_or_default(),
            source: err,
        }),
    }
}

fn evaluate_continuous(
    slice: &FrameSlice<'_>,
    spec: &MetricSpec,
    pair: &VariantPair,
    config: &EngineConfig,
    seed: Option<u64>,
) -> Result<Option<CutoffStat>, RollingError> {
    let control = slice.values_for_cell(&spec.numerator, &pair.control)?;
    let test = slice.values_for_cell(&spec.numerator, &pair.test)?;

    let test_config = MeanTestConfig {
        resamples: config.resamples,
        confidence_level: config.continuous_confidence,
        parallel: config.parallel,
        seed,
    };
    match compare_means(&control, &test, &test_config) {
        Ok(result) => Ok(Some(CutoffStat {
            test_value: result.test_mean,
            control_value: result.control_mean,
            p_value: result.p_value,
            ci_lower: result.ci_lower,
            ci_upper: result.ci_upper,
        })),
        Err(err @ (MeanTestError::EmptyControl | MeanTestError::EmptyTest)) => {
            match config.policy {
                MissingDataPolicy::Skip => Ok(None),
                MissingDataPolicy::Strict => Err(RollingError::Mean {
                    metric: spec.name.clone(),
                    cutoff: slice.max_day().unwrap_or_default(),
                    source: err,
                }),
            }
        }
        Err(err) => Err(RollingError::Mean {
            metric: spec.name.clone(),
            cutoff: slice.max_day().unwrap_or_default(),
            source: err,
        }),
    }
}

/// Every (cutoff, metric) call gets its own seed stream so a fixed base seed
/// still gives each evaluation independent resampling noise.
fn derive_seed(config: &EngineConfig, cutoff: NaiveDate, metric_index: usize) -> Option<u64> {
    config
        .seed
        .map(|seed| seed ^ ((cutoff.num_days_from_ce() as u64) << 20) ^ metric_index as u64)
}
