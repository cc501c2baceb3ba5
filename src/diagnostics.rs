//! Data-quality bookkeeping for the silent policies of the revenue and KPI paths.
//!
//! Rows with unparsable dates are dropped, bad durations and revenues are zero-filled,
//! negative durations bill no time-based units, and billing codes missing from the rate table
//! are billed at rate 0. None of these are errors; this report makes them auditable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of sample rows kept per category.
pub const MAX_SAMPLES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSample {
    /// Zero-based index of the row in the input table
    pub row_index: usize,
    /// The offending raw value, rendered as text
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradationCount {
    pub count: usize,
    pub samples: Vec<RowSample>,
}

impl DegradationCount {
    pub fn record(&mut self, row_index: usize, value: impl Into<String>) {
        self.count += 1;
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(RowSample {
                row_index,
                value: value.into(),
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn merge(&mut self, other: DegradationCount) {
        self.count += other.count;
        for sample in other.samples {
            if self.samples.len() >= MAX_SAMPLES {
                break;
            }
            self.samples.push(sample);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub input_rows: usize,
    pub dropped_dates: DegradationCount,
    pub zeroed_durations: DegradationCount,
    /// Durations below zero, kept as-is in `duration_min` but billed as 0 time-based units
    pub negative_durations: DegradationCount,
    pub zeroed_revenues: DegradationCount,
    pub unmapped_codes: DegradationCount,
    /// Rows per billing code that had no rate in the selected table
    pub unmapped_code_rows: BTreeMap<String, usize>,
}

impl DataQualityReport {
    pub fn new(input_rows: usize) -> Self {
        Self {
            input_rows,
            ..Self::default()
        }
    }

    pub fn retained_rows(&self) -> usize {
        self.input_rows.saturating_sub(self.dropped_dates.count)
    }

    pub fn record_unmapped_code(&mut self, row_index: usize, code: &str) {
        self.unmapped_codes.record(row_index, code);
        *self.unmapped_code_rows.entry(code.to_string()).or_insert(0) += 1;
    }

    pub fn is_clean(&self) -> bool {
        self.dropped_dates.is_empty()
            && self.zeroed_durations.is_empty()
            && self.negative_durations.is_empty()
            && self.zeroed_revenues.is_empty()
            && self.unmapped_codes.is_empty()
    }

    /// Folds in the counts gathered by a later pipeline stage.
    pub fn absorb(&mut self, other: DataQualityReport) {
        self.dropped_dates.merge(other.dropped_dates);
        self.zeroed_durations.merge(other.zeroed_durations);
        self.negative_durations.merge(other.negative_durations);
        self.zeroed_revenues.merge(other.zeroed_revenues);
        self.unmapped_codes.merge(other.unmapped_codes);
        for (code, rows) in other.unmapped_code_rows {
            *self.unmapped_code_rows.entry(code).or_insert(0) += rows;
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} input rows: {} dropped (bad date), {} zero-filled durations, {} negative durations, {} zero-filled revenues, {} rows with unmapped codes",
            self.input_rows,
            self.dropped_dates.count,
            self.zeroed_durations.count,
            self.negative_durations.count,
            self.zeroed_revenues.count,
            self.unmapped_codes.count
        )
    }
}
