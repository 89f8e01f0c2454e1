//! Daily Rollup
//!
//! Aggregates event-level data into one row per (day, variant) pair: a
//! group-sum over the referenced columns followed by a single division pass
//! per metric. No per-row closures, no interpolation of missing days.

use crate::event::{COUNT, EventFrame, SchemaError};
use crate::metric::MetricSpec;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// One aggregated row: a (day, variant) group with one value per metric.
#[derive(Debug, Clone, PartialEq)]
pub struct RollupRow {
    /// Day the group covers (timestamps truncated)
    pub day: NaiveDate,
    /// Variant label
    pub cell: String,
    /// Metric name → value; `None` when the denominator summed to zero
    pub values: BTreeMap<String, Option<f64>>,
}

#[derive(Default)]
struct GroupSums {
    count: f64,
    sums: BTreeMap<String, f64>,
}

/// Aggregate event-level data into the daily rollup table.
///
/// Pure function of the frame and the specs. Rows come out sorted by
/// (day, variant), so repeated runs produce identical tables.
pub fn daily_rollup(
    frame: &EventFrame,
    specs: &[MetricSpec],
) -> Result<Vec<RollupRow>, SchemaError> {
    // Resolve every referenced column before touching the data.
    let mut tracked: BTreeSet<&str> = BTreeSet::new();
    for spec in specs {
        frame.require_column(&spec.numerator)?;
        frame.require_column(&spec.denominator)?;
        if spec.numerator != COUNT {
            tracked.insert(&spec.numerator);
        }
        if spec.denominator != COUNT {
            tracked.insert(&spec.denominator);
        }
    }
    let tracked: Vec<(&str, &[f64])> = tracked
        .into_iter()
        .map(|name| frame.column(name).map(|values| (name, values)))
        .collect::<Result<_, _>>()?;

    let mut groups: BTreeMap<(NaiveDate, &str), GroupSums> = BTreeMap::new();
    for i in 0..frame.len() {
        let key = (frame.day(i), frame.cells()[i].as_str());
        let group = groups.entry(key).or_default();
        group.count += 1.0;
        for (name, values) in &tracked {
            *group.sums.entry((*name).to_string()).or_insert(0.0) += values[i];
        }
    }

    let rows = groups
        .into_iter()
        .map(|((day, cell), group)| {
            let resolve = |column: &str| -> f64 {
                if column == COUNT {
                    group.count
                } else {
                    group.sums.get(column).copied().unwrap_or(0.0)
                }
            };
            let values = specs
                .iter()
                .map(|spec| {
                    let value =
                        MetricSpec::ratio(resolve(&spec.numerator), resolve(&spec.denominator));
                    (spec.name.clone(), value)
                })
                .collect();
            RollupRow {
                day,
                cell: cell.to_string(),
                values,
            }
        })
        .collect();

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MetricKind;
    use chrono::NaiveDateTime;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn frame(rows: &[(&str, &str, f64, f64)]) -> EventFrame {
        let timestamps = rows.iter().map(|r| ts(r.0)).collect();
        let cells = rows.iter().map(|r| r.1.to_string()).collect();
        let mut columns = BTreeMap::new();
        columns.insert("SPEND".to_string(), rows.iter().map(|r| r.2).collect());
        columns.insert("VISITS".to_string(), rows.iter().map(|r| r.3).collect());
        EventFrame::new(timestamps, cells, columns).unwrap()
    }

    #[test]
    fn test_group_sum_then_divide() {
        // Control day 1: spend 40 over 10 visits -> 4.0 per visit.
        let frame = frame(&[
            ("2024-05-01 08:00:00", "control", 10.0, 2.0),
            ("2024-05-01 09:00:00", "control", 30.0, 8.0),
            ("2024-05-01 10:00:00", "test", 12.0, 3.0),
            ("2024-05-02 08:00:00", "test", 9.0, 3.0),
        ]);
        let specs = vec![
            MetricSpec::parse("spend_per_visit", MetricKind::Continuous, "spend/visits").unwrap(),
            MetricSpec::parse("avg_spend", MetricKind::Continuous, "spend").unwrap(),
        ];

        let rows = daily_rollup(&frame, &specs).unwrap();

        assert_eq!(rows.len(), 3);
        let first = &rows[0];
        assert_eq!(first.day, day("2024-05-01"));
        assert_eq!(first.cell, "control");
        assert_eq!(first.values["spend_per_visit"], Some(4.0));
        assert_eq!(first.values["avg_spend"], Some(20.0));
    }

    #[test]
    fn test_one_row_per_group_sorted() {
        let frame = frame(&[
            ("2024-05-02 08:00:00", "b", 1.0, 1.0),
            ("2024-05-01 08:00:00", "a", 1.0, 1.0),
            ("2024-05-01 09:00:00", "b", 1.0, 1.0),
            ("2024-05-01 10:00:00", "a", 1.0, 1.0),
        ]);
        let specs = vec![MetricSpec::parse("m", MetricKind::Continuous, "spend").unwrap()];

        let rows = daily_rollup(&frame, &specs).unwrap();

        let keys: Vec<(NaiveDate, &str)> =
            rows.iter().map(|r| (r.day, r.cell.as_str())).collect();
        assert_eq!(
            keys,
            vec![
                (day("2024-05-01"), "a"),
                (day("2024-05-01"), "b"),
                (day("2024-05-02"), "b"),
            ]
        );
    }

    #[test]
    fn test_zero_denominator_yields_null() {
        let frame = frame(&[
            ("2024-05-01 08:00:00", "a", 5.0, 0.0),
            ("2024-05-01 09:00:00", "b", 5.0, 2.0),
        ]);
        let specs =
            vec![MetricSpec::parse("rate", MetricKind::Binary, "spend/visits").unwrap()];

        let rows = daily_rollup(&frame, &specs).unwrap();

        assert_eq!(rows[0].cell, "a");
        assert_eq!(rows[0].values["rate"], None);
        assert_eq!(rows[1].values["rate"], Some(2.5));
    }

    #[test]
    fn test_missing_metric_column() {
        let frame = frame(&[("2024-05-01 08:00:00", "a", 1.0, 1.0)]);
        let specs =
            vec![MetricSpec::parse("bad", MetricKind::Binary, "clicks/visits").unwrap()];

        assert!(matches!(
            daily_rollup(&frame, &specs),
            Err(SchemaError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_empty_frame_empty_table() {
        let frame = EventFrame::default();
        let specs: Vec<MetricSpec> = Vec::new();
        assert!(daily_rollup(&frame, &specs).unwrap().is_empty());
    }
}
