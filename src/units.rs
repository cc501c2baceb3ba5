use crate::diagnostics::DataQualityReport;
use crate::schema::CellValue;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Minutes per billed unit for time-based codes.
pub const UNIT_MINUTES: f64 = 15.0;

/// Codes billed in 15-minute increments. H0038G (group) is deliberately absent and bills
/// per encounter.
pub const DEFAULT_TIME_BASED_CODES: [&str; 2] = ["H0004", "H0038"];

pub fn default_time_based_codes() -> BTreeSet<String> {
    DEFAULT_TIME_BASED_CODES
        .iter()
        .map(|c| c.to_string())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingBasis {
    /// floor(duration_min / 15) units
    TimeBased,
    /// One unit regardless of duration
    PerEncounter,
}

pub fn classify(code: &str, time_based_codes: &BTreeSet<String>) -> BillingBasis {
    if time_based_codes.contains(code) {
        BillingBasis::TimeBased
    } else {
        BillingBasis::PerEncounter
    }
}

/// Units billed for one encounter. Negative or non-finite durations bill 0 time-based units.
pub fn derive_units(code: &str, duration_min: f64, time_based_codes: &BTreeSet<String>) -> u64 {
    match classify(code, time_based_codes) {
        BillingBasis::PerEncounter => 1,
        BillingBasis::TimeBased => {
            let units = (duration_min / UNIT_MINUTES).floor();
            if units.is_finite() && units > 0.0 {
                units as u64
            } else {
                0
            }
        }
    }
}

/// An encounter whose date has been parsed but whose duration is still raw.
#[derive(Debug, Clone, PartialEq)]
pub struct DatedEncounter {
    pub row_index: usize,
    pub encounter_date: NaiveDate,
    pub month: NaiveDate,
    pub cpt_code: String,
    pub duration_min: CellValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitizedEncounter {
    pub row_index: usize,
    pub encounter_date: NaiveDate,
    pub month: NaiveDate,
    pub cpt_code: String,
    pub duration_min: f64,
    pub units: u64,
}

/// Applies the duration zero-fill policy and derives units for every row.
///
/// Negative durations are kept on the row but recorded, since time-based codes bill them 0 units.
pub fn add_units(
    rows: &[DatedEncounter],
    time_based_codes: &BTreeSet<String>,
) -> (Vec<UnitizedEncounter>, DataQualityReport) {
    let mut report = DataQualityReport::default();

    let unitized = rows
        .iter()
        .map(|row| {
            let duration_min = match row.duration_min.as_f64() {
                Some(minutes) => minutes,
                None => {
                    report
                        .zeroed_durations
                        .record(row.row_index, row.duration_min.as_text().unwrap_or_default());
                    0.0
                }
            };
            if duration_min < 0.0 {
                report
                    .negative_durations
                    .record(row.row_index, duration_min.to_string());
            }

            UnitizedEncounter {
                row_index: row.row_index,
                encounter_date: row.encounter_date,
                month: row.month,
                cpt_code: row.cpt_code.clone(),
                duration_min,
                units: derive_units(&row.cpt_code, duration_min, time_based_codes),
            }
        })
        .collect();

    (unitized, report)
}
