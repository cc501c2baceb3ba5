use crate::schema::CellValue;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Parses an encounter date. Accepts plain dates, ISO date-times and RFC 3339 timestamps;
/// the time component is discarded. Returns `None` for anything else.
pub fn parse_encounter_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(datetime.date());
        }
    }

    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|datetime| datetime.date_naive())
}

/// Date coercion for a table cell. Only text cells can carry a date.
pub fn coerce_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Text(raw) => parse_encounter_date(raw),
        CellValue::Number(_) | CellValue::Empty => None,
    }
}

/// Numeric coercion for a table cell, with the zero-fill policy applied.
/// Returns the value and whether it had to be zero-filled.
pub fn coerce_number_or_zero(cell: Option<&CellValue>) -> (f64, bool) {
    match cell.and_then(CellValue::as_f64) {
        Some(value) => (value, false),
        None => (0.0, true),
    }
}

/// Renders a ratio for display; non-finite values become `N/A`.
pub fn format_ratio(value: f64, precision: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", precision, value)
    } else {
        "N/A".to_string()
    }
}
