//! Experiment configuration from TOML
//!
//! An experiment is described by a TOML file naming the test, the input
//! column mapping, and the metrics. Required keys are validated at load
//! time, before any event data is read; the engine assumes a validated
//! structure and does not re-check.

use serde::{Deserialize, Serialize};
use splitstat_core::{ConfigError, EngineConfig, MetricKind, MetricSpec, MissingDataPolicy};
use std::collections::BTreeMap;
use std::path::Path;

/// Full experiment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Experiment identifier, used to key persisted output
    pub test_name: String,
    /// Human-readable description
    pub description: String,
    /// Input column holding the event timestamp
    #[serde(default = "default_date_field")]
    pub date_field: String,
    /// Input column holding the variant label
    #[serde(default = "default_cell_field")]
    pub test_cell_field: String,
    /// Metric name → definition
    pub metrics: BTreeMap<String, MetricConfig>,
    /// Engine settings
    #[serde(default)]
    pub engine: EngineSettings,
}

/// One metric as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricConfig {
    /// Statistical treatment: "binary" or "continuous"
    #[serde(rename = "type")]
    pub kind: MetricKind,
    /// Function string: `"NUM"` or `"NUM/DENOM"`
    pub function: String,
}

/// Engine settings block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Resampling iterations per continuous evaluation
    #[serde(default = "default_resamples")]
    pub resamples: usize,
    /// Confidence level for the proportion interval
    #[serde(default = "default_binary_confidence")]
    pub binary_confidence: f64,
    /// Confidence level for the mean-difference interval
    #[serde(default = "default_continuous_confidence")]
    pub continuous_confidence: f64,
    /// Fixed resampling seed (omit for fresh entropy per run)
    #[serde(default)]
    pub seed: Option<u64>,
    /// Worker thread cap (omit to use all cores)
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Abort on insufficient data instead of skipping the cutoff
    #[serde(default)]
    pub strict: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            resamples: default_resamples(),
            binary_confidence: default_binary_confidence(),
            continuous_confidence: default_continuous_confidence(),
            seed: None,
            jobs: None,
            strict: false,
        }
    }
}

fn default_date_field() -> String {
    "DT".to_string()
}
fn default_cell_field() -> String {
    "TEST_CELL".to_string()
}
fn default_resamples() -> usize {
    splitstat_core::EngineConfig::default().resamples
}
fn default_binary_confidence() -> f64 {
    splitstat_core::EngineConfig::default().binary_confidence
}
fn default_continuous_confidence() -> f64 {
    splitstat_core::EngineConfig::default().continuous_confidence
}

impl ExperimentConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse and validate a configuration from TOML text.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.metrics.is_empty() {
            anyhow::bail!("Config defines no metrics");
        }
        Ok(config)
    }

    /// Resolve every metric's function string.
    pub fn metric_specs(&self) -> Result<Vec<MetricSpec>, ConfigError> {
        self.metrics
            .iter()
            .map(|(name, metric)| MetricSpec::parse(name, metric.kind, &metric.function))
            .collect()
    }

    /// Map the settings block onto the engine configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            resamples: self.engine.resamples,
            binary_confidence: self.engine.binary_confidence,
            continuous_confidence: self.engine.continuous_confidence,
            seed: self.engine.seed,
            parallel: true,
            policy: if self.engine.strict {
                MissingDataPolicy::Strict
            } else {
                MissingDataPolicy::Skip
            },
        }
    }

    /// Generate a commented sample configuration as TOML text.
    pub fn sample_toml() -> String {
        r#"# Splitstat experiment configuration

# Experiment identifier; persisted output is keyed on it
test_name = "homepage-cta"
description = "New call-to-action button on the homepage"

# Input column mapping (defaults shown)
date_field = "DT"
test_cell_field = "TEST_CELL"

# A binary metric is a ratio of summed columns
[metrics.ctr]
type = "binary"
function = "clicks / impressions"

# A continuous metric with no denominator averages per-event values
[metrics.revenue]
type = "continuous"
function = "revenue"

[engine]
# Resampling iterations per continuous evaluation
resamples = 1000
# Interval confidence levels
binary_confidence = 0.90
continuous_confidence = 0.95
# Abort on insufficient data instead of skipping the cutoff
strict = false
# Fix the resampling seed for reproducible output (uncomment to enable)
# seed = 42
# Worker thread cap (uncomment to enable)
# jobs = 4
"#
        .to_string()
    }
}
