//! Mean Comparison
//!
//! Significance via a permutation-style bootstrap: the observed two-sample
//! t statistic is compared against the distribution of t statistics computed
//! on pairs resampled from the pooled values, which stands in for the null
//! hypothesis. The interval on the mean difference comes from a percentile
//! bootstrap with within-arm resampling.
//!
//! Every trial is an independent pure function of the two input slices, so
//! trials run in parallel on the rayon pool and are combined by a count or a
//! percentile afterwards.

use crate::percentile::percentile;
use crate::{DEFAULT_CONTINUOUS_CONFIDENCE, DEFAULT_RESAMPLES};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use thiserror::Error;

/// Configuration for the mean comparison
#[derive(Debug, Clone)]
pub struct MeanTestConfig {
    /// Number of resampling iterations for both the p-value and the interval
    /// (default: 1000)
    pub resamples: usize,
    /// Confidence level for the mean-difference interval (default: 0.95)
    pub confidence_level: f64,
    /// Whether to run trials on the rayon pool
    pub parallel: bool,
    /// Fixed seed for reproducible resampling; `None` draws fresh entropy
    pub seed: Option<u64>,
}

impl Default for MeanTestConfig {
    fn default() -> Self {
        Self {
            resamples: DEFAULT_RESAMPLES,
            confidence_level: DEFAULT_CONTINUOUS_CONFIDENCE,
            parallel: true,
            seed: None,
        }
    }
}

/// Result of comparing two means
#[derive(Debug, Clone, Copy)]
pub struct MeanTestResult {
    /// Arithmetic mean of the control samples
    pub control_mean: f64,
    /// Arithmetic mean of the test samples
    pub test_mean: f64,
    /// Magnitude of the observed pooled-variance t statistic
    pub observed_t: f64,
    /// Fraction of null-resampled statistics exceeding the observed one
    pub p_value: f64,
    /// Lower percentile-bootstrap bound on `test_mean - control_mean`
    pub ci_lower: f64,
    /// Upper percentile-bootstrap bound on `test_mean - control_mean`
    pub ci_upper: f64,
    /// Confidence level the interval was computed at
    pub confidence_level: f64,
}

/// Errors from mean comparison
#[derive(Debug, Clone, Error)]
pub enum MeanTestError {
    /// No control samples at this cutoff
    #[error("Control samples are empty")]
    EmptyControl,
    /// No test samples at this cutoff
    #[error("Test samples are empty")]
    EmptyTest,
    /// Confidence level outside the open unit interval
    #[error("Invalid confidence level: {0} (must be between 0 and 1)")]
    InvalidConfidenceLevel(f64),
    /// Zero resampling iterations leave both outputs undefined
    #[error("Resample count must be positive")]
    ZeroResamples,
}

// Distinct streams keep the p-value and interval trials independent when a
// fixed seed is supplied.
const PVALUE_STREAM: u64 = 0x70;
const INTERVAL_STREAM: u64 = 0xC1;

/// Compare means between the control and test arms.
pub fn compare_means(
    control: &[f64],
    test: &[f64],
    config: &MeanTestConfig,
) -> Result<MeanTestResult, MeanTestError> {
    if control.is_empty() {
        return Err(MeanTestError::EmptyControl);
    }
    if test.is_empty() {
        return Err(MeanTestError::EmptyTest);
    }
    if config.confidence_level <= 0.0 || config.confidence_level >= 1.0 {
        return Err(MeanTestError::InvalidConfidenceLevel(
            config.confidence_level,
        ));
    }
    if config.resamples == 0 {
        return Err(MeanTestError::ZeroResamples);
    }

    let control_mean = mean(control);
    let test_mean = mean(test);
    let observed_t = t_statistic(control, test).abs();

    let pooled: Vec<f64> = control.iter().chain(test.iter()).copied().collect();
    let (n_control, n_test) = (control.len(), test.len());

    // Null distribution: both arms drawn from the common pool.
    let null_stats = run_trials(config, PVALUE_STREAM, |rng| {
        let control_boot = resample(&pooled, n_control, rng);
        let test_boot = resample(&pooled, n_test, rng);
        t_statistic(&control_boot, &test_boot).abs()
    });
    let exceeding = null_stats.iter().filter(|&&t| t > observed_t).count();
    let p_value = exceeding as f64 / config.resamples as f64;

    // Interval: within-arm resampling of the mean difference.
    let diffs = run_trials(config, INTERVAL_STREAM, |rng| {
        resampled_mean(test, rng) - resampled_mean(control, rng)
    });
    let alpha = (1.0 - config.confidence_level) / 2.0 * 100.0;
    let ci_lower = percentile(&diffs, alpha);
    let ci_upper = percentile(&diffs, 100.0 - alpha);

    Ok(MeanTestResult {
        control_mean,
        test_mean,
        observed_t,
        p_value,
        ci_lower,
        ci_upper,
        confidence_level: config.confidence_level,
    })
}

/// Run `config.resamples` independent trials.
///
/// Under a fixed seed, each trial derives its own generator from the seed,
/// the stream id, and the trial index, so parallel and serial execution
/// produce identical output.
fn run_trials<F>(config: &MeanTestConfig, stream: u64, trial: F) -> Vec<f64>
where
    F: Fn(&mut StdRng) -> f64 + Sync,
{
    match (config.parallel, config.seed) {
        (true, Some(seed)) => (0..config.resamples)
            .into_par_iter()
            .map(|i| trial(&mut trial_rng(seed, stream, i as u64)))
            .collect(),
        (true, None) => (0..config.resamples)
            .into_par_iter()
            .map_init(StdRng::from_entropy, |rng, _| trial(rng))
            .collect(),
        (false, Some(seed)) => (0..config.resamples)
            .map(|i| trial(&mut trial_rng(seed, stream, i as u64)))
            .collect(),
        (false, None) => {
            let mut rng = StdRng::from_entropy();
            (0..config.resamples).map(|_| trial(&mut rng)).collect()
        }
    }
}

fn trial_rng(seed: u64, stream: u64, index: u64) -> StdRng {
    StdRng::seed_from_u64(
        seed ^ stream.rotate_left(32) ^ index.wrapping_mul(0x9e37_79b9_7f4a_7c15),
    )
}

/// Draw `len` values with replacement.
fn resample(pool: &[f64], len: usize, rng: &mut StdRng) -> Vec<f64> {
    (0..len).map(|_| pool[rng.gen_range(0..pool.len())]).collect()
}

/// Mean of a same-size resample drawn with replacement.
fn resampled_mean(samples: &[f64], rng: &mut StdRng) -> f64 {
    let mut sum = 0.0;
    for _ in 0..samples.len() {
        sum += samples[rng.gen_range(0..samples.len())];
    }
    sum / samples.len() as f64
}

fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Pooled-variance two-sample t statistic.
///
/// A degenerate pair (fewer than three values total, or zero pooled
/// variance) yields 0.0 so that resampled statistics stay well-defined.
fn t_statistic(control: &[f64], test: &[f64]) -> f64 {
    let n_control = control.len() as f64;
    let n_test = test.len() as f64;
    let df = n_control + n_test - 2.0;
    if df <= 0.0 {
        return 0.0;
    }

    let mean_control = mean(control);
    let mean_test = mean(test);
    let ss_control: f64 = control.iter().map(|x| (x - mean_control).powi(2)).sum();
    let ss_test: f64 = test.iter().map(|x| (x - mean_test).powi(2)).sum();

    let pooled_variance = (ss_control + ss_test) / df;
    let standard_error = (pooled_variance * (1.0 / n_control + 1.0 / n_test)).sqrt();
    if standard_error == 0.0 {
        return 0.0;
    }

    (mean_test - mean_control) / standard_error
}
