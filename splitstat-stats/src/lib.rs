#![warn(missing_docs)]
//! Splitstat Statistical Engine
//!
//! Provides the two estimators used to compare the arms of an A/B experiment:
//! - Proportion comparison via a two-proportion z-test with a Wald-type
//!   interval on the rate difference
//! - Mean comparison via a permutation-style bootstrap p-value and a
//!   percentile bootstrap interval on the mean difference
//!
//! Both estimators are pure functions over immutable inputs. The resampling
//! paths run on the rayon pool and accept an optional seed for reproducible
//! output.

mod binary;
mod continuous;
mod normal;
mod percentile;

pub use binary::{
    ArmCounts, ProportionTestConfig, ProportionTestError, ProportionTestResult,
    compare_proportions,
};
pub use continuous::{
    MeanTestConfig, MeanTestError, MeanTestResult, compare_means,
};
pub use normal::{normal_cdf, normal_quantile};
pub use percentile::percentile;

/// Default number of resampling iterations
pub const DEFAULT_RESAMPLES: usize = 1000;

/// Default confidence level for the proportion interval (90%)
pub const DEFAULT_BINARY_CONFIDENCE: f64 = 0.90;

/// Default confidence level for the mean-difference interval (95%)
pub const DEFAULT_CONTINUOUS_CONFIDENCE: f64 = 0.95;
