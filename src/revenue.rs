//! Revenue calculator: encounter table → enriched rows → monthly rollups.
//!
//! Data-quality policy is lossy by design and silent at the error level:
//! - rows whose `encounter_date` cannot be parsed are dropped,
//! - non-numeric or missing `duration_min` is treated as 0 minutes,
//! - billing codes absent from the rate table bill at rate 0 but still count as encounters.
//!
//! Every degradation is tallied in the returned [`DataQualityReport`].

use crate::aggregation::MonthlyAggregator;
use crate::diagnostics::DataQualityReport;
use crate::error::Result;
use crate::rates::{lookup_rate, RateCatalog, RateTable};
use crate::schema::{
    EncounterTable, EnrichedEncounter, MonthlyByCodeRow, MonthlyKpiRow, MonthlyTotalRow,
    CPT_CODE, DURATION_MIN, ENCOUNTER_DATE,
};
use crate::units::{add_units, default_time_based_codes, DatedEncounter, UnitizedEncounter};
use crate::utils::{coerce_date, month_start};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const REQUIRED_COLUMNS: [&str; 3] = [ENCOUNTER_DATE, CPT_CODE, DURATION_MIN];

/// Where unit rates come from for a run. Explicit rates bypass the catalog entirely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateSource<'a> {
    FiscalYear(&'a str),
    Explicit(&'a RateTable),
}

impl<'a> From<&'a str> for RateSource<'a> {
    fn from(fiscal_year: &'a str) -> Self {
        RateSource::FiscalYear(fiscal_year)
    }
}

impl<'a> From<&'a RateTable> for RateSource<'a> {
    fn from(rates: &'a RateTable) -> Self {
        RateSource::Explicit(rates)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueReport {
    pub encounters: Vec<EnrichedEncounter>,
    pub monthly_by_code: Vec<MonthlyByCodeRow>,
    pub monthly_total: Vec<MonthlyTotalRow>,
    pub diagnostics: DataQualityReport,
}

impl RevenueReport {
    /// Monthly totals in the column layout reporting collaborators consume.
    pub fn monthly_kpis(&self) -> Vec<MonthlyKpiRow> {
        self.monthly_total.iter().map(MonthlyKpiRow::from).collect()
    }

    pub fn total_revenue(&self) -> f64 {
        self.monthly_total.iter().map(|row| row.revenue).sum()
    }

    pub fn into_parts(
        self,
    ) -> (
        Vec<EnrichedEncounter>,
        Vec<MonthlyByCodeRow>,
        Vec<MonthlyTotalRow>,
    ) {
        (self.encounters, self.monthly_by_code, self.monthly_total)
    }
}

pub struct RevenueCalculator<'a> {
    catalog: &'a RateCatalog,
    time_based_codes: BTreeSet<String>,
    aggregator: MonthlyAggregator,
}

impl<'a> RevenueCalculator<'a> {
    pub fn new(catalog: &'a RateCatalog) -> Self {
        Self {
            catalog,
            time_based_codes: default_time_based_codes(),
            aggregator: MonthlyAggregator::default(),
        }
    }

    pub fn with_time_based_codes(mut self, time_based_codes: BTreeSet<String>) -> Self {
        self.time_based_codes = time_based_codes;
        self
    }

    pub fn with_aggregator(mut self, aggregator: MonthlyAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn time_based_codes(&self) -> &BTreeSet<String> {
        &self.time_based_codes
    }

    pub fn resolve_rates<'r>(&'r self, source: RateSource<'r>) -> Result<&'r RateTable> {
        match source {
            RateSource::Explicit(rates) => Ok(rates),
            RateSource::FiscalYear(fiscal_year) => self.catalog.get_rates(fiscal_year),
        }
    }

    pub fn compute<'r>(
        &'r self,
        table: &EncounterTable,
        source: impl Into<RateSource<'r>>,
    ) -> Result<RevenueReport> {
        let rates = self.resolve_rates(source.into())?;
        table.require_columns(&REQUIRED_COLUMNS)?;

        let (dated, mut diagnostics) = parse_dates(table);
        if !diagnostics.dropped_dates.is_empty() {
            warn!(
                "Dropped {} of {} rows with unparsable encounter_date",
                diagnostics.dropped_dates.count,
                table.len()
            );
        }

        let (unitized, unit_diagnostics) = add_units(&dated, &self.time_based_codes);
        diagnostics.absorb(unit_diagnostics);

        let (encounters, rate_diagnostics) = apply_rates(&unitized, rates);
        diagnostics.absorb(rate_diagnostics);

        if !diagnostics.unmapped_codes.is_empty() {
            warn!(
                "{} rows billed at rate 0 for unmapped codes {:?}",
                diagnostics.unmapped_codes.count,
                diagnostics.unmapped_code_rows.keys().collect::<Vec<_>>()
            );
        }
        debug!("Data quality: {}", diagnostics.summary());

        let monthly_by_code = self.aggregator.monthly_by_code(&encounters);
        let monthly_total = self.aggregator.monthly_totals(&encounters);

        info!(
            "Computed revenue for {} encounters across {} months",
            encounters.len(),
            monthly_total.len()
        );

        Ok(RevenueReport {
            encounters,
            monthly_by_code,
            monthly_total,
            diagnostics,
        })
    }
}

/// Parses `encounter_date` for every row, dropping the rows that fail.
///
/// A missing `cpt_code` cell becomes the empty code, which no rate table maps.
pub fn parse_dates(table: &EncounterTable) -> (Vec<DatedEncounter>, DataQualityReport) {
    let mut report = DataQualityReport::new(table.len());
    let mut dated = Vec::with_capacity(table.len());

    for (row_index, row) in table.rows.iter().enumerate() {
        let date_cell = row.get(ENCOUNTER_DATE).cloned().unwrap_or_default();
        match coerce_date(&date_cell) {
            Some(encounter_date) => dated.push(DatedEncounter {
                row_index,
                encounter_date,
                month: month_start(encounter_date),
                cpt_code: row
                    .get(CPT_CODE)
                    .and_then(|c| c.as_text())
                    .unwrap_or_default(),
                duration_min: row.get(DURATION_MIN).cloned().unwrap_or_default(),
            }),
            None => report
                .dropped_dates
                .record(row_index, date_cell.as_text().unwrap_or_default()),
        }
    }

    (dated, report)
}

/// Joins units with rates. Unknown codes bill at rate 0.
pub fn apply_rates(
    rows: &[UnitizedEncounter],
    rates: &RateTable,
) -> (Vec<EnrichedEncounter>, DataQualityReport) {
    let mut report = DataQualityReport::default();

    let enriched = rows
        .iter()
        .map(|row| {
            let rate = match lookup_rate(rates, &row.cpt_code) {
                Some(rate) => rate,
                None => {
                    report.record_unmapped_code(row.row_index, &row.cpt_code);
                    0.0
                }
            };

            EnrichedEncounter {
                encounter_date: row.encounter_date,
                month: row.month,
                cpt_code: row.cpt_code.clone(),
                duration_min: row.duration_min,
                units: row.units,
                rate,
                revenue: row.units as f64 * rate,
            }
        })
        .collect();

    (enriched, report)
}

/// Revenue path against the built-in rate catalog.
pub fn compute_revenue<'r>(
    table: &EncounterTable,
    source: impl Into<RateSource<'r>>,
    time_based_codes: &BTreeSet<String>,
) -> Result<RevenueReport> {
    let catalog = RateCatalog::builtin();
    RevenueCalculator::new(&catalog)
        .with_time_based_codes(time_based_codes.clone())
        .compute(table, source.into())
}
