//! Integration tests for splitstat
//!
//! These tests verify the end-to-end behavior of the evaluation engine over
//! the public API: event frame in, rollup and rolling tables out.

use chrono::{NaiveDate, NaiveDateTime};
use splitstat::{
    EngineConfig, EventFrame, MetricKind, MetricSpec, daily_rollup, rolling_stats,
};
use std::collections::BTreeMap;

fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// 4 days x 2 variants, several events per group, with a click/impression
/// ratio and a per-event revenue column.
fn experiment_frame() -> EventFrame {
    let mut timestamps = Vec::new();
    let mut cells = Vec::new();
    let mut clicks = Vec::new();
    let mut impressions = Vec::new();
    let mut revenue = Vec::new();

    for (i, date) in ["2024-06-01", "2024-06-02", "2024-06-03", "2024-06-04"]
        .iter()
        .enumerate()
    {
        for event in 0..5 {
            // Test cell: higher click rate and revenue.
            timestamps.push(ts(&format!("{date} 0{event}:15:00")));
            cells.push("treatment".to_string());
            clicks.push(if event % 2 == 0 { 1.0 } else { 0.0 });
            impressions.push(3.0);
            revenue.push(10.0 + event as f64 + i as f64);

            timestamps.push(ts(&format!("{date} 0{event}:45:00")));
            cells.push("holdout".to_string());
            clicks.push(if event == 0 { 1.0 } else { 0.0 });
            impressions.push(3.0);
            revenue.push(7.0 + event as f64);
        }
    }

    let mut columns = BTreeMap::new();
    columns.insert("CLICKS".to_string(), clicks);
    columns.insert("IMPRESSIONS".to_string(), impressions);
    columns.insert("REVENUE".to_string(), revenue);
    EventFrame::new(timestamps, cells, columns).unwrap()
}

fn experiment_specs() -> Vec<MetricSpec> {
    vec![
        MetricSpec::parse("ctr", MetricKind::Binary, "clicks/impressions").unwrap(),
        MetricSpec::parse("revenue", MetricKind::Continuous, "revenue").unwrap(),
    ]
}

fn seeded_engine() -> EngineConfig {
    EngineConfig {
        resamples: 500,
        seed: Some(2024),
        ..Default::default()
    }
}

/// The §8-style scenario: 4 days x 2 variants x 2 metrics produce exactly
/// 8 rollup rows and 3 cutoffs x 2 variants x 2 metrics = 12 rolling rows.
#[test]
fn test_end_to_end_row_counts() {
    let frame = experiment_frame();
    let specs = experiment_specs();

    let rollup = daily_rollup(&frame, &specs).unwrap();
    assert_eq!(rollup.len(), 8);

    let rolling = rolling_stats(&frame, &specs, &seeded_engine()).unwrap();
    assert_eq!(rolling.len(), 12);
}

#[test]
fn test_rollup_values_hand_computed() {
    let frame = experiment_frame();
    let rollup = daily_rollup(&frame, &experiment_specs()).unwrap();

    // Day 1, holdout: clicks 1 of impressions 15; revenue mean (7+8+9+10+11)/5.
    let row = rollup
        .iter()
        .find(|r| r.day == day("2024-06-01") && r.cell == "holdout")
        .unwrap();
    assert!((row.values["ctr"].unwrap() - 1.0 / 15.0).abs() < 1e-12);
    assert!((row.values["revenue"].unwrap() - 9.0).abs() < 1e-12);

    // Day 2, treatment: clicks 3 of impressions 15; revenue mean 11+...+15 -> 13.
    let row = rollup
        .iter()
        .find(|r| r.day == day("2024-06-02") && r.cell == "treatment")
        .unwrap();
    assert!((row.values["ctr"].unwrap() - 0.2).abs() < 1e-12);
    assert!((row.values["revenue"].unwrap() - 13.0).abs() < 1e-12);
}

#[test]
fn test_cutoff_days_are_min_to_max_exclusive() {
    let frame = experiment_frame();
    let rolling = rolling_stats(&frame, &experiment_specs(), &seeded_engine()).unwrap();

    let mut days: Vec<NaiveDate> = rolling.iter().map(|r| r.day).collect();
    days.sort();
    days.dedup();

    // No gap, no duplicate, and no cutoff for the final day.
    assert_eq!(
        days,
        vec![day("2024-06-01"), day("2024-06-02"), day("2024-06-03")]
    );
}

#[test]
fn test_joint_stats_attached_to_both_variants() {
    let frame = experiment_frame();
    let specs = experiment_specs();
    let rolling = rolling_stats(&frame, &specs, &seeded_engine()).unwrap();

    for spec in &specs {
        for cutoff_day in [day("2024-06-01"), day("2024-06-02"), day("2024-06-03")] {
            let rows: Vec<_> = rolling
                .iter()
                .filter(|r| r.metric == spec.name && r.day == cutoff_day)
                .collect();
            assert_eq!(rows.len(), 2, "{} at {}", spec.name, cutoff_day);
            assert_eq!(rows[0].p_value.to_bits(), rows[1].p_value.to_bits());
            assert_eq!(rows[0].ci_lower.to_bits(), rows[1].ci_lower.to_bits());
            assert_eq!(rows[0].ci_upper.to_bits(), rows[1].ci_upper.to_bits());
            assert!(rows[0].ci_lower <= rows[0].ci_upper);
            assert_ne!(rows[0].cell, rows[1].cell);
        }
    }
}

#[test]
fn test_binary_series_is_cumulative() {
    let frame = experiment_frame();
    let rolling = rolling_stats(&frame, &experiment_specs(), &seeded_engine()).unwrap();

    // treatment clicks 3/15 per day, cumulative ratio stays 0.2 at each cutoff.
    for cutoff_day in [day("2024-06-01"), day("2024-06-02"), day("2024-06-03")] {
        let row = rolling
            .iter()
            .find(|r| r.metric == "ctr" && r.day == cutoff_day && r.cell == "treatment")
            .unwrap();
        assert!((row.value - 0.2).abs() < 1e-12);
    }

    // holdout: 1 click per day over 15 impressions per day.
    let row = rolling
        .iter()
        .find(|r| r.metric == "ctr" && r.day == day("2024-06-03") && r.cell == "holdout")
        .unwrap();
    assert!((row.value - 3.0 / 45.0).abs() < 1e-12);
}

#[test]
fn test_continuous_points_are_arm_means() {
    let frame = experiment_frame();
    let rolling = rolling_stats(&frame, &experiment_specs(), &seeded_engine()).unwrap();

    // First cutoff: treatment revenue 10..14 -> mean 12; holdout 7..11 -> 9.
    let treatment = rolling
        .iter()
        .find(|r| r.metric == "revenue" && r.day == day("2024-06-01") && r.cell == "treatment")
        .unwrap();
    let holdout = rolling
        .iter()
        .find(|r| r.metric == "revenue" && r.day == day("2024-06-01") && r.cell == "holdout")
        .unwrap();
    assert!((treatment.value - 12.0).abs() < 1e-12);
    assert!((holdout.value - 9.0).abs() < 1e-12);
}

#[test]
fn test_null_rollup_value_on_zero_denominator() {
    let timestamps = vec![ts("2024-06-01 10:00:00"), ts("2024-06-01 11:00:00")];
    let cells = vec!["a".to_string(), "b".to_string()];
    let mut columns = BTreeMap::new();
    columns.insert("CLICKS".to_string(), vec![2.0, 1.0]);
    columns.insert("IMPRESSIONS".to_string(), vec![0.0, 5.0]);
    let frame = EventFrame::new(timestamps, cells, columns).unwrap();
    let specs = vec![MetricSpec::parse("ctr", MetricKind::Binary, "clicks/impressions").unwrap()];

    let rollup = daily_rollup(&frame, &specs).unwrap();

    let a = rollup.iter().find(|r| r.cell == "a").unwrap();
    let b = rollup.iter().find(|r| r.cell == "b").unwrap();
    assert_eq!(a.values["ctr"], None);
    assert_eq!(b.values["ctr"], Some(0.2));
}

#[test]
fn test_report_assembly_and_json() {
    use splitstat::{EngineInfo, build_report, generate_json_report};

    let frame = experiment_frame();
    let specs = experiment_specs();
    let rollup = daily_rollup(&frame, &specs).unwrap();
    let rolling = rolling_stats(&frame, &specs, &seeded_engine()).unwrap();

    let report = build_report(
        "cta-test",
        "integration scenario",
        EngineInfo {
            resamples: 500,
            binary_confidence: 0.90,
            continuous_confidence: 0.95,
            seed: Some(2024),
        },
        &rollup,
        &rolling,
    );

    assert_eq!(report.summary.rollup_rows, 8);
    assert_eq!(report.summary.rolling_rows, 12);
    assert_eq!(report.summary.days_observed, 4);
    assert_eq!(report.summary.cutoffs_evaluated, 3);
    assert_eq!(report.summary.metrics, 2);

    let json = generate_json_report(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["meta"]["test_name"], "cta-test");
    assert_eq!(value["rolling"].as_array().unwrap().len(), 12);
}

#[test]
fn test_seeded_runs_are_reproducible_end_to_end() {
    let frame = experiment_frame();
    let specs = experiment_specs();
    let engine = seeded_engine();

    let a = rolling_stats(&frame, &specs, &engine).unwrap();
    let b = rolling_stats(&frame, &specs, &engine).unwrap();

    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.cell, y.cell);
        assert_eq!(x.metric, y.metric);
        assert_eq!(x.p_value.to_bits(), y.p_value.to_bits());
        assert_eq!(x.ci_lower.to_bits(), y.ci_lower.to_bits());
        assert_eq!(x.ci_upper.to_bits(), y.ci_upper.to_bits());
    }
}
