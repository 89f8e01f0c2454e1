#![warn(missing_docs)]
//! Splitstat CLI Library
//!
//! Wires the collaborators around the evaluation engine: loads the TOML
//! experiment config, ingests the events CSV, runs the daily rollup and the
//! rolling significance computation, and writes the report in the requested
//! format.

mod config;
mod ingest;

pub use config::{EngineSettings, ExperimentConfig, MetricConfig};
pub use ingest::{read_events, read_events_from};

use anyhow::Context;
use clap::Parser;
use regex::Regex;
use splitstat_core::{MetricSpec, MissingDataPolicy, daily_rollup, rolling_stats};
use splitstat_report::{
    EngineInfo, OutputFormat, Report, build_report, generate_json_report, rolling_stats_csv,
    rollup_csv,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Splitstat CLI arguments
#[derive(Parser, Debug)]
#[command(name = "splitstat")]
#[command(author, version, about = "Splitstat - A/B experiment evaluation")]
pub struct Cli {
    /// Experiment config file (TOML)
    #[arg(short, long, required_unless_present = "sample_config")]
    pub config: Option<PathBuf>,

    /// Event-level CSV data
    #[arg(short, long, required_unless_present = "sample_config")]
    pub events: Option<PathBuf>,

    /// Output format: json, csv, human
    #[arg(long, default_value = "human")]
    pub format: String,

    /// Output file (stdout if not specified). With --format csv this is the
    /// rolling-stats table
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output file for the daily rollup table (csv format only)
    #[arg(long)]
    pub rollup_output: Option<PathBuf>,

    /// Evaluate only metrics whose name matches this regex
    #[arg(long)]
    pub metric: Option<String>,

    /// Override the configured number of resampling iterations
    #[arg(long)]
    pub resamples: Option<usize>,

    /// Fix the resampling seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,

    /// Abort on insufficient data instead of skipping the cutoff
    #[arg(long)]
    pub strict: bool,

    /// Number of worker threads (default: all cores)
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Print a sample config file and exit
    #[arg(long)]
    pub sample_config: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse arguments from the environment and run.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(Cli::parse())
}

/// Run with explicit arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("info")
            .with_writer(std::io::stderr)
            .init();
    }

    if cli.sample_config {
        print!("{}", ExperimentConfig::sample_toml());
        return Ok(());
    }

    // clap guarantees both paths are present past this point.
    let (Some(config_path), Some(events_path)) = (cli.config.as_deref(), cli.events.as_deref())
    else {
        anyhow::bail!("--config and --events are required");
    };

    let config = ExperimentConfig::load(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    info!(test_name = %config.test_name, "loaded experiment config");

    let mut engine = config.engine_config();
    if let Some(resamples) = cli.resamples {
        engine.resamples = resamples;
    }
    if let Some(seed) = cli.seed {
        engine.seed = Some(seed);
    }
    if cli.strict {
        engine.policy = MissingDataPolicy::Strict;
    }

    let jobs = cli.jobs.or(config.engine.jobs);
    if let Some(jobs) = jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("Failed to size the worker pool")?;
    }

    let specs = filter_specs(config.metric_specs()?, cli.metric.as_deref())?;
    let frame = read_events(events_path, &config)?;

    info!(metrics = specs.len(), "computing daily rollup");
    let rollup = daily_rollup(&frame, &specs)?;

    info!("computing rolling stats");
    let rolling = rolling_stats(&frame, &specs, &engine)?;

    let report = build_report(
        &config.test_name,
        &config.description,
        EngineInfo {
            resamples: engine.resamples,
            binary_confidence: engine.binary_confidence,
            continuous_confidence: engine.continuous_confidence,
            seed: engine.seed,
        },
        &rollup,
        &rolling,
    );

    let format = OutputFormat::from_str(&cli.format).map_err(|e| anyhow::anyhow!(e))?;
    match format {
        OutputFormat::Json => {
            let json = generate_json_report(&report)?;
            write_output(cli.output.as_deref(), &json)?;
        }
        OutputFormat::Csv => {
            let stats = rolling_stats_csv(&report.rolling)?;
            write_output(cli.output.as_deref(), &stats)?;
            if let Some(rollup_path) = cli.rollup_output.as_deref() {
                let rollup_table = rollup_csv(&report.rollup)?;
                write_output(Some(rollup_path), &rollup_table)?;
            }
        }
        OutputFormat::Human => {
            write_output(cli.output.as_deref(), &format_human_output(&report))?;
        }
    }

    Ok(())
}

/// Keep only metrics matching the filter, erroring when nothing survives.
fn filter_specs(
    specs: Vec<MetricSpec>,
    filter: Option<&str>,
) -> anyhow::Result<Vec<MetricSpec>> {
    let Some(pattern) = filter else {
        return Ok(specs);
    };
    let regex = Regex::new(pattern)
        .with_context(|| format!("Invalid metric filter pattern {pattern:?}"))?;
    let filtered: Vec<MetricSpec> = specs
        .into_iter()
        .filter(|spec| regex.is_match(&spec.name))
        .collect();
    if filtered.is_empty() {
        anyhow::bail!("No metrics match filter {pattern:?}");
    }
    Ok(filtered)
}

fn write_output(path: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, contents)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote output");
        }
        None => print!("{contents}"),
    }
    Ok(())
}

/// Format a report for human-readable terminal display.
pub fn format_human_output(report: &Report) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str(&format!("Splitstat Results: {}\n", report.meta.test_name));
    output.push_str(&"=".repeat(60));
    output.push('\n');
    if !report.meta.description.is_empty() {
        output.push_str(&format!("{}\n", report.meta.description));
    }
    output.push_str(&format!(
        "{} rollup rows over {} days, {} rolling rows over {} cutoffs\n\n",
        report.summary.rollup_rows,
        report.summary.days_observed,
        report.summary.rolling_rows,
        report.summary.cutoffs_evaluated,
    ));

    output.push_str("Daily rollup\n");
    output.push_str(&"-".repeat(60));
    output.push('\n');
    for record in &report.rollup {
        output.push_str(&format!("  {}  {:<12}", record.dt, record.test_cell));
        for (name, value) in &record.metrics {
            match value {
                Some(v) => output.push_str(&format!("  {name}: {v:.4}")),
                None => output.push_str(&format!("  {name}: -")),
            }
        }
        output.push('\n');
    }

    output.push('\n');
    output.push_str("Rolling stats (latest cutoff)\n");
    output.push_str(&"-".repeat(60));
    output.push('\n');
    if let Some(latest) = report.rolling.iter().map(|r| r.dt).max() {
        for record in report.rolling.iter().filter(|r| r.dt == latest) {
            let marker = if record.p_value < 0.05 { "*" } else { " " };
            output.push_str(&format!(
                "  {} {:<16} {:<12} value: {:>10.4}  p: {:.4}  CI: [{:.4}, {:.4}]\n",
                marker,
                record.metric_name,
                record.test_cell,
                record.metric_value,
                record.p_value,
                record.lower_ci,
                record.upper_ci,
            ));
        }
    } else {
        output.push_str("  (no cutoffs evaluated)\n");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitstat_core::MetricKind;

    fn spec(name: &str) -> MetricSpec {
        MetricSpec::parse(name, MetricKind::Continuous, name).unwrap()
    }

    #[test]
    fn test_filter_specs_passthrough() {
        let specs = vec![spec("ctr"), spec("revenue")];
        let filtered = filter_specs(specs, None).unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_filter_specs_matching() {
        let specs = vec![spec("ctr"), spec("revenue"), spec("rev_per_user")];
        let filtered = filter_specs(specs, Some("^rev")).unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|s| s.name.starts_with("rev")));
    }

    #[test]
    fn test_filter_specs_no_match() {
        let specs = vec![spec("ctr")];
        assert!(filter_specs(specs, Some("bounce")).is_err());
    }

    #[test]
    fn test_filter_specs_bad_pattern() {
        let specs = vec![spec("ctr")];
        assert!(filter_specs(specs, Some("(")).is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::parse_from([
            "splitstat",
            "--config",
            "exp.toml",
            "--events",
            "events.csv",
            "--format",
            "json",
            "--seed",
            "42",
        ]);
        assert_eq!(cli.format, "json");
        assert_eq!(cli.seed, Some(42));
        assert!(!cli.strict);
    }
}
