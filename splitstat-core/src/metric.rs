//! Metric Definitions
//!
//! A metric is declared in config as a type plus a function string of the
//! form `"NUM"` or `"NUM/DENOM"`. Resolution to column names happens exactly
//! once, here; nothing downstream re-parses strings or evaluates per-row
//! closures.

use crate::event::COUNT;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Statistical treatment of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Ratio of summed successes to summed trials; evaluated with the
    /// proportion z-test.
    Binary,
    /// Per-event numeric values; evaluated with the permutation test and
    /// bootstrap interval.
    Continuous,
}

/// Config-string parse failures.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The function string contained no tokens
    #[error("Metric {name:?} has an empty function string")]
    EmptyFunction {
        /// Metric being parsed
        name: String,
    },
    /// A numerator or denominator token was blank
    #[error("Metric {name:?} has a blank token in function {function:?}")]
    BlankToken {
        /// Metric being parsed
        name: String,
        /// Offending function string
        function: String,
    },
    /// More than one `/` has no defined meaning
    #[error("Metric {name:?} has too many tokens in function {function:?}")]
    TooManyTokens {
        /// Metric being parsed
        name: String,
        /// Offending function string
        function: String,
    },
}

/// A metric resolved from its config string.
///
/// Built once at config load, immutable thereafter, shared read-only by the
/// aggregator and the evaluators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSpec {
    /// Metric name as declared in config
    pub name: String,
    /// Statistical treatment
    pub kind: MetricKind,
    /// Column summed as the numerator
    pub numerator: String,
    /// Column summed as the denominator; the implicit count when the
    /// function string has no `/`
    pub denominator: String,
}

impl MetricSpec {
    /// Parse a `"NUM"` or `"NUM/DENOM"` function string.
    ///
    /// Tokens are trimmed and upper-cased for column matching. A missing
    /// denominator resolves to the implicit count column, turning the metric
    /// into a plain per-event average.
    pub fn parse(name: &str, kind: MetricKind, function: &str) -> Result<Self, ConfigError> {
        let tokens: Vec<String> = function
            .split('/')
            .map(|t| t.trim().to_uppercase())
            .collect();

        match tokens.as_slice() {
            [num] if num.is_empty() => Err(ConfigError::EmptyFunction {
                name: name.to_string(),
            }),
            [num] => Ok(Self {
                name: name.to_string(),
                kind,
                numerator: num.clone(),
                denominator: COUNT.to_string(),
            }),
            [num, den] if num.is_empty() || den.is_empty() => Err(ConfigError::BlankToken {
                name: name.to_string(),
                function: function.to_string(),
            }),
            [num, den] => Ok(Self {
                name: name.to_string(),
                kind,
                numerator: num.clone(),
                denominator: den.clone(),
            }),
            _ => Err(ConfigError::TooManyTokens {
                name: name.to_string(),
                function: function.to_string(),
            }),
        }
    }

    /// Division rule shared by the rollup and the evaluator dispatch:
    /// `None` on a non-positive denominator sum, never a division error.
    pub fn ratio(numerator_sum: f64, denominator_sum: f64) -> Option<f64> {
        (denominator_sum > 0.0).then(|| numerator_sum / denominator_sum)
    }
}
