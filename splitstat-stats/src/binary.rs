//! Proportion Comparison
//!
//! Two-proportion z-test with pooled variance for significance, and a
//! Wald-type interval on the rate difference with unpooled per-arm variances.
//! Fully deterministic; no resampling on this path.

use crate::DEFAULT_BINARY_CONFIDENCE;
use crate::normal::{normal_cdf, normal_quantile};
use thiserror::Error;

/// Success and trial sums for one experiment arm.
///
/// Sums come straight off the event columns, so they are carried as floats;
/// a binary metric over an integer column simply has integral sums.
#[derive(Debug, Clone, Copy)]
pub struct ArmCounts {
    /// Sum of the numerator column
    pub successes: f64,
    /// Sum of the denominator column
    pub trials: f64,
}

/// Configuration for the proportion test
#[derive(Debug, Clone)]
pub struct ProportionTestConfig {
    /// Confidence level for the interval on the rate difference (default: 0.90)
    pub confidence_level: f64,
}

impl Default for ProportionTestConfig {
    fn default() -> Self {
        Self {
            confidence_level: DEFAULT_BINARY_CONFIDENCE,
        }
    }
}

/// Result of comparing two proportions
#[derive(Debug, Clone, Copy)]
pub struct ProportionTestResult {
    /// Control success rate
    pub control_rate: f64,
    /// Test success rate
    pub test_rate: f64,
    /// Pooled z statistic for the rate difference
    pub z_statistic: f64,
    /// Two-sided p-value
    pub p_value: f64,
    /// Lower bound of the interval on `test_rate - control_rate`
    pub ci_lower: f64,
    /// Upper bound of the interval on `test_rate - control_rate`
    pub ci_upper: f64,
    /// Confidence level the interval was computed at
    pub confidence_level: f64,
}

/// Errors from proportion comparison
#[derive(Debug, Clone, Error)]
pub enum ProportionTestError {
    /// The control arm contributed no trials
    #[error("Control arm has zero trials")]
    ZeroControlTrials,
    /// The test arm contributed no trials
    #[error("Test arm has zero trials")]
    ZeroTestTrials,
    /// Confidence level outside the open unit interval
    #[error("Invalid confidence level: {0} (must be between 0 and 1)")]
    InvalidConfidenceLevel(f64),
}

/// Compare success rates between the control and test arms.
///
/// Significance comes from the pooled two-proportion z-test; the interval is
/// a Wald interval on the rate difference using each arm's own variance.
/// A zero-trial arm is an error — the caller decides whether that skips the
/// cutoff or aborts the run.
pub fn compare_proportions(
    control: ArmCounts,
    test: ArmCounts,
    config: &ProportionTestConfig,
) -> Result<ProportionTestResult, ProportionTestError> {
    if control.trials <= 0.0 {
        return Err(ProportionTestError::ZeroControlTrials);
    }
    if test.trials <= 0.0 {
        return Err(ProportionTestError::ZeroTestTrials);
    }
    if config.confidence_level <= 0.0 || config.confidence_level >= 1.0 {
        return Err(ProportionTestError::InvalidConfidenceLevel(
            config.confidence_level,
        ));
    }

    let control_rate = control.successes / control.trials;
    let test_rate = test.successes / test.trials;
    let diff = test_rate - control_rate;

    let pooled = (control.successes + test.successes) / (control.trials + test.trials);
    let pooled_se =
        (pooled * (1.0 - pooled) * (1.0 / control.trials + 1.0 / test.trials)).sqrt();

    // Both arms degenerate to the same all-success or all-failure proportion:
    // the observed difference is exactly zero, not undefined.
    let (z_statistic, p_value) = if pooled_se > 0.0 {
        let z = diff / pooled_se;
        (z, 2.0 * (1.0 - normal_cdf(z.abs())))
    } else {
        (0.0, 1.0)
    };

    let var_control = control_rate * (1.0 - control_rate) / control.trials;
    let var_test = test_rate * (1.0 - test_rate) / test.trials;
    let z_crit = normal_quantile(1.0 - (1.0 - config.confidence_level) / 2.0);
    let half_width = z_crit * (var_control + var_test).sqrt();

    Ok(ProportionTestResult {
        control_rate,
        test_rate,
        z_statistic,
        p_value,
        ci_lower: diff - half_width,
        ci_upper: diff + half_width,
        confidence_level: config.confidence_level,
    })
}
