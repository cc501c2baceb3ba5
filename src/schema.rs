use crate::aggregation::{validate_fte_hours, DEFAULT_FTE_HOURS_PER_MONTH};
use crate::error::{KpiError, Result};
use crate::units::default_time_based_codes;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const ENCOUNTER_DATE: &str = "encounter_date";
pub const CPT_CODE: &str = "cpt_code";
pub const DURATION_MIN: &str = "duration_min";
pub const REVENUE: &str = "revenue";

pub const DEFAULT_FISCAL_YEAR: &str = "FY24";

/// A single untyped cell from an input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl CellValue {
    /// Numeric coercion: finite numbers and numeric text parse, everything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n).filter(|n| n.is_finite()),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            CellValue::Empty => None,
        }
    }

    /// Text rendering used for billing codes. Whole numbers print without a fraction so a
    /// code read as `90834.0` still matches `"90834"`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 => {
                Some(format!("{}", *n as i64))
            }
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Empty)
    }
}

pub type EncounterRow = BTreeMap<String, CellValue>;

/// Column-oriented view of raw encounter data. Column presence is tracked separately from
/// the rows so an empty table still knows its header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncounterTable {
    pub columns: Vec<String>,
    pub rows: Vec<EncounterRow>,
}

impl EncounterTable {
    pub fn new(columns: Vec<String>, rows: Vec<EncounterRow>) -> Self {
        Self { columns, rows }
    }

    pub fn with_columns(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a revenue-path table (`encounter_date`, `cpt_code`, `duration_min`).
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = EncounterRecord>,
    {
        let mut table = Self::with_columns(&[ENCOUNTER_DATE, CPT_CODE, DURATION_MIN]);
        for record in records {
            table.push_row(record.into_row());
        }
        table
    }

    pub fn push_row(&mut self, row: EncounterRow) {
        for key in row.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Returns the required columns absent from this table, sorted.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        let missing: BTreeSet<String> = required
            .iter()
            .filter(|c| !self.has_column(c))
            .map(|c| c.to_string())
            .collect();
        missing.into_iter().collect()
    }

    pub fn require_columns(&self, required: &[&str]) -> Result<()> {
        let missing = self.missing_columns(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(KpiError::MissingColumns(missing))
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One raw billing row as handed to the revenue path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterRecord {
    pub encounter_date: CellValue,
    pub cpt_code: CellValue,
    pub duration_min: CellValue,
}

impl EncounterRecord {
    pub fn new(
        encounter_date: impl Into<CellValue>,
        cpt_code: impl Into<CellValue>,
        duration_min: impl Into<CellValue>,
    ) -> Self {
        Self {
            encounter_date: encounter_date.into(),
            cpt_code: cpt_code.into(),
            duration_min: duration_min.into(),
        }
    }

    fn into_row(self) -> EncounterRow {
        let mut row = EncounterRow::new();
        row.insert(ENCOUNTER_DATE.to_string(), self.encounter_date);
        row.insert(CPT_CODE.to_string(), self.cpt_code);
        row.insert(DURATION_MIN.to_string(), self.duration_min);
        row
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEncounter {
    pub encounter_date: NaiveDate,
    /// First day of the encounter's calendar month
    pub month: NaiveDate,
    pub cpt_code: String,
    /// Duration after coercion; bad or missing values are 0
    pub duration_min: f64,
    pub units: u64,
    pub rate: f64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyByCodeRow {
    pub month: NaiveDate,
    pub cpt_code: String,
    pub encounters: usize,
    pub total_units: u64,
    pub revenue: f64,
}

/// Monthly totals. The ratio fields are non-finite when their denominator is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotalRow {
    pub month: NaiveDate,
    pub encounters: usize,
    pub total_units: u64,
    pub revenue: f64,
    pub client_hours: f64,
    pub revenue_per_hour: f64,
    pub revenue_per_encounter: f64,
    pub utilization_rate: f64,
}

/// The monthly KPI table handed to reporting collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyKpiRow {
    pub month: NaiveDate,
    pub encounters: usize,
    pub client_hours: f64,
    pub revenue: f64,
    pub revenue_per_hour: f64,
    pub revenue_per_encounter: f64,
    pub utilization_rate: f64,
}

impl From<&MonthlyTotalRow> for MonthlyKpiRow {
    fn from(row: &MonthlyTotalRow) -> Self {
        Self {
            month: row.month,
            encounters: row.encounters,
            client_hours: row.client_hours,
            revenue: row.revenue,
            revenue_per_hour: row.revenue_per_hour,
            revenue_per_encounter: row.revenue_per_encounter,
            utilization_rate: row.utilization_rate,
        }
    }
}

fn default_fiscal_year() -> String {
    DEFAULT_FISCAL_YEAR.to_string()
}

fn default_fte_hours() -> f64 {
    DEFAULT_FTE_HOURS_PER_MONTH
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    #[serde(default = "default_fiscal_year")]
    #[schemars(
        description = "Fiscal year label used to select the rate table (e.g. 'FY24'). Ignored when explicit rates are supplied per call."
    )]
    pub fiscal_year: String,

    #[serde(default)]
    #[schemars(
        description = "Optional path to a versioned rate catalog JSON document. When absent the built-in FY23/FY24/FY25 tables are used."
    )]
    pub rate_catalog_path: Option<PathBuf>,

    #[serde(default = "default_time_based_codes")]
    #[schemars(
        description = "Billing codes billed in 15-minute units from duration_min. All other codes bill one unit per encounter."
    )]
    pub time_based_codes: BTreeSet<String>,

    #[serde(default = "default_fte_hours")]
    #[schemars(
        description = "Full-time-equivalent client hours per month used as the utilization denominator. Defaults to 160."
    )]
    pub fte_hours_per_month: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fiscal_year: default_fiscal_year(),
            rate_catalog_path: None,
            time_based_codes: default_time_based_codes(),
            fte_hours_per_month: DEFAULT_FTE_HOURS_PER_MONTH,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fiscal_year.trim().is_empty() {
            return Err(KpiError::InvalidConfig(
                "fiscal_year must not be empty".to_string(),
            ));
        }
        validate_fte_hours(self.fte_hours_per_month)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(EngineConfig);
        serde_json::to_string_pretty(&schema)
    }
}
