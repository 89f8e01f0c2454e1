//! Event Frame
//!
//! Columnar container for event-level observations: one timestamp and one
//! variant label per event, plus named numeric columns. Shape is validated
//! once at construction; everything downstream borrows the frame immutably,
//! so concurrent cutoff evaluations can never see each other's slices.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use thiserror::Error;

/// Canonical name of the date column.
pub const DT: &str = "DT";
/// Canonical name of the variant column.
pub const TEST_CELL: &str = "TEST_CELL";
/// Name of the implicit per-event count column.
///
/// Every event counts as 1; a metric whose function string has no
/// denominator divides by this column and degenerates to a per-event mean.
pub const COUNT: &str = "COUNT";

/// Schema violations detected at frame construction or column access.
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    /// A column's length disagrees with the number of events
    #[error("Column {name:?} has {got} values but the frame has {expected} events")]
    LengthMismatch {
        /// Offending column
        name: String,
        /// Values supplied
        got: usize,
        /// Events in the frame
        expected: usize,
    },
    /// A referenced column does not exist in the frame
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    /// A supplied column collides with an implicit or canonical name
    #[error("Column name {0:?} is reserved")]
    ReservedColumn(String),
    /// The frame must contain exactly two distinct variant labels
    #[error("Expected exactly 2 distinct test cells, found {found:?}")]
    BadCellCardinality {
        /// Distinct labels observed, in first-encounter order
        found: Vec<String>,
    },
}

/// The two experiment arms, in role order.
///
/// Role assignment is positional: the first distinct label encountered in
/// frame order is the test arm, the second is the control arm. Deterministic
/// for a given frame; no label sorting is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPair {
    /// Label of the test arm
    pub test: String,
    /// Label of the control arm
    pub control: String,
}

/// Column-oriented table of event-level observations.
#[derive(Debug, Clone, Default)]
pub struct EventFrame {
    timestamps: Vec<NaiveDateTime>,
    cells: Vec<String>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl EventFrame {
    /// Build a frame, validating that every column matches the event count.
    ///
    /// Column names are expected upper-cased (the ingestion layer folds
    /// them); `COUNT` is implicit and may not be supplied.
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        cells: Vec<String>,
        columns: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self, SchemaError> {
        let expected = timestamps.len();
        if cells.len() != expected {
            return Err(SchemaError::LengthMismatch {
                name: TEST_CELL.to_string(),
                got: cells.len(),
                expected,
            });
        }
        for (name, values) in &columns {
            if name == COUNT || name == DT || name == TEST_CELL {
                return Err(SchemaError::ReservedColumn(name.clone()));
            }
            if values.len() != expected {
                return Err(SchemaError::LengthMismatch {
                    name: name.clone(),
                    got: values.len(),
                    expected,
                });
            }
        }
        Ok(Self {
            timestamps,
            cells,
            columns,
        })
    }

    /// Number of events in the frame.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the frame holds no events.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Event timestamps, in input order.
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// Variant label per event, in input order.
    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// Names of the numeric columns (the implicit count is not listed).
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Values of a numeric column.
    pub fn column(&self, name: &str) -> Result<&[f64], SchemaError> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))
    }

    /// Verify a metric-referenced column resolves; the implicit count always
    /// does.
    pub fn require_column(&self, name: &str) -> Result<(), SchemaError> {
        if name == COUNT || self.columns.contains_key(name) {
            Ok(())
        } else {
            Err(SchemaError::MissingColumn(name.to_string()))
        }
    }

    /// Day (date part) of one event.
    pub fn day(&self, index: usize) -> NaiveDate {
        self.timestamps[index].date()
    }

    /// Earliest day observed.
    pub fn min_day(&self) -> Option<NaiveDate> {
        self.timestamps.iter().map(|ts| ts.date()).min()
    }

    /// Latest day observed.
    pub fn max_day(&self) -> Option<NaiveDate> {
        self.timestamps.iter().map(|ts| ts.date()).max()
    }

    /// The two variant labels in first-encounter order.
    pub fn variant_pair(&self) -> Result<VariantPair, SchemaError> {
        let mut distinct: Vec<&str> = Vec::new();
        for cell in &self.cells {
            if !distinct.contains(&cell.as_str()) {
                distinct.push(cell);
            }
        }
        match distinct.as_slice() {
            [test, control] => Ok(VariantPair {
                test: (*test).to_string(),
                control: (*control).to_string(),
            }),
            found => Err(SchemaError::BadCellCardinality {
                found: found.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    /// Cumulative view of every event whose day is at or before `cutoff`.
    pub fn slice_through(&self, cutoff: NaiveDate) -> FrameSlice<'_> {
        let indices = (0..self.len())
            .filter(|&i| self.timestamps[i].date() <= cutoff)
            .collect();
        FrameSlice {
            frame: self,
            indices,
        }
    }
}

/// A borrowed view of the events at or before a cutoff day.
#[derive(Debug)]
pub struct FrameSlice<'a> {
    frame: &'a EventFrame,
    indices: Vec<usize>,
}

impl FrameSlice<'_> {
    /// Number of events in the slice.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the slice holds no events.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Latest day present in the slice. Cumulative stat rows carry this day,
    /// not the cutoff boundary itself.
    pub fn max_day(&self) -> Option<NaiveDate> {
        self.indices
            .iter()
            .map(|&i| self.frame.day(i))
            .max()
    }

    /// Sum of a column over the slice events belonging to `cell`.
    ///
    /// The implicit count column sums to the number of matching events.
    pub fn sum_for_cell(&self, column: &str, cell: &str) -> Result<f64, SchemaError> {
        if column == COUNT {
            let count = self
                .indices
                .iter()
                .filter(|&&i| self.frame.cells[i] == cell)
                .count();
            return Ok(count as f64);
        }
        let values = self.frame.column(column)?;
        Ok(self
            .indices
            .iter()
            .filter(|&&i| self.frame.cells[i] == cell)
            .map(|&i| values[i])
            .sum())
    }

    /// Raw per-event values of a column for the slice events of `cell`.
    pub fn values_for_cell(&self, column: &str, cell: &str) -> Result<Vec<f64>, SchemaError> {
        let values = self.frame.column(column)?;
        Ok(self
            .indices
            .iter()
            .filter(|&&i| self.frame.cells[i] == cell)
            .map(|&i| values[i])
            .collect())
    }
}
