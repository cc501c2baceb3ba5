use crate::diagnostics::DataQualityReport;
use crate::error::{KpiError, Result};
use crate::schema::{
    EncounterTable, EnrichedEncounter, MonthlyByCodeRow, MonthlyKpiRow, MonthlyTotalRow,
    DURATION_MIN, ENCOUNTER_DATE, REVENUE,
};
use crate::utils::{coerce_date, coerce_number_or_zero, month_start};
use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Assumed full-time-equivalent client hours per month.
pub const DEFAULT_FTE_HOURS_PER_MONTH: f64 = 160.0;

pub const MINUTES_PER_HOUR: f64 = 60.0;

pub fn validate_fte_hours(hours: f64) -> Result<()> {
    if !hours.is_finite() || hours <= 0.0 {
        return Err(KpiError::InvalidFteHours(hours));
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
struct MonthAccumulator {
    encounters: usize,
    units: u64,
    revenue: f64,
    minutes: f64,
}

impl MonthAccumulator {
    fn add(&mut self, units: u64, revenue: f64, minutes: f64) {
        self.encounters += 1;
        self.units += units;
        self.revenue += revenue;
        self.minutes += minutes;
    }

    fn client_hours(&self) -> f64 {
        self.minutes / MINUTES_PER_HOUR
    }

    /// Ratio KPIs for one month. Zero hours or encounters give non-finite ratios.
    fn kpi_row(&self, month: NaiveDate, fte_hours_per_month: f64) -> MonthlyKpiRow {
        let client_hours = self.client_hours();
        MonthlyKpiRow {
            month,
            encounters: self.encounters,
            client_hours,
            revenue: self.revenue,
            revenue_per_hour: self.revenue / client_hours,
            revenue_per_encounter: self.revenue / self.encounters as f64,
            utilization_rate: client_hours / fte_hours_per_month,
        }
    }
}

/// Output of the KPI path over precomputed revenue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiReport {
    pub monthly: Vec<MonthlyKpiRow>,
    pub diagnostics: DataQualityReport,
}

/// Groups enriched encounters into monthly rollups. Months without encounters produce no
/// row; series may have gaps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyAggregator {
    fte_hours_per_month: f64,
}

impl Default for MonthlyAggregator {
    fn default() -> Self {
        Self {
            fte_hours_per_month: DEFAULT_FTE_HOURS_PER_MONTH,
        }
    }
}

impl MonthlyAggregator {
    pub fn new(fte_hours_per_month: f64) -> Result<Self> {
        validate_fte_hours(fte_hours_per_month)?;
        Ok(Self {
            fte_hours_per_month,
        })
    }

    pub fn fte_hours_per_month(&self) -> f64 {
        self.fte_hours_per_month
    }

    /// One row per (month, code), sorted by month then code.
    pub fn monthly_by_code(&self, rows: &[EnrichedEncounter]) -> Vec<MonthlyByCodeRow> {
        let mut groups: BTreeMap<(NaiveDate, &str), MonthAccumulator> = BTreeMap::new();

        for row in rows {
            groups
                .entry((row.month, row.cpt_code.as_str()))
                .or_default()
                .add(row.units, row.revenue, row.duration_min);
        }

        groups
            .into_iter()
            .map(|((month, code), acc)| MonthlyByCodeRow {
                month,
                cpt_code: code.to_string(),
                encounters: acc.encounters,
                total_units: acc.units,
                revenue: acc.revenue,
            })
            .collect()
    }

    /// One row per month, sorted ascending, with derived ratio KPIs.
    pub fn monthly_totals(&self, rows: &[EnrichedEncounter]) -> Vec<MonthlyTotalRow> {
        let mut groups: BTreeMap<NaiveDate, MonthAccumulator> = BTreeMap::new();

        for row in rows {
            groups
                .entry(row.month)
                .or_default()
                .add(row.units, row.revenue, row.duration_min);
        }

        groups
            .into_iter()
            .map(|(month, acc)| {
                let kpis = acc.kpi_row(month, self.fte_hours_per_month);
                MonthlyTotalRow {
                    month,
                    encounters: kpis.encounters,
                    total_units: acc.units,
                    revenue: kpis.revenue,
                    client_hours: kpis.client_hours,
                    revenue_per_hour: kpis.revenue_per_hour,
                    revenue_per_encounter: kpis.revenue_per_encounter,
                    utilization_rate: kpis.utilization_rate,
                }
            })
            .collect()
    }

    /// Monthly KPIs from a table that already carries `revenue`.
    ///
    /// Rows with unparsable dates are dropped; non-numeric durations and revenues count as 0.
    /// Negative durations are summed as given and recorded.
    pub fn compute_monthly_kpis(&self, table: &EncounterTable) -> Result<KpiReport> {
        table.require_columns(&[ENCOUNTER_DATE, DURATION_MIN, REVENUE])?;

        let mut diagnostics = DataQualityReport::new(table.len());
        let mut groups: BTreeMap<NaiveDate, MonthAccumulator> = BTreeMap::new();

        for (row_index, row) in table.rows.iter().enumerate() {
            let date_cell = row.get(ENCOUNTER_DATE).cloned().unwrap_or_default();
            let Some(date) = coerce_date(&date_cell) else {
                diagnostics
                    .dropped_dates
                    .record(row_index, date_cell.as_text().unwrap_or_default());
                continue;
            };

            let (minutes, duration_zeroed) = coerce_number_or_zero(row.get(DURATION_MIN));
            if duration_zeroed {
                diagnostics.zeroed_durations.record(
                    row_index,
                    row.get(DURATION_MIN)
                        .and_then(|c| c.as_text())
                        .unwrap_or_default(),
                );
            } else if minutes < 0.0 {
                diagnostics
                    .negative_durations
                    .record(row_index, minutes.to_string());
            }

            let (revenue, revenue_zeroed) = coerce_number_or_zero(row.get(REVENUE));
            if revenue_zeroed {
                diagnostics.zeroed_revenues.record(
                    row_index,
                    row.get(REVENUE)
                        .and_then(|c| c.as_text())
                        .unwrap_or_default(),
                );
            }

            groups
                .entry(month_start(date))
                .or_default()
                .add(0, revenue, minutes);
        }

        if !diagnostics.dropped_dates.is_empty() {
            warn!(
                "Dropped {} of {} rows with unparsable encounter_date",
                diagnostics.dropped_dates.count,
                table.len()
            );
        }

        let monthly: Vec<MonthlyKpiRow> = groups
            .into_iter()
            .map(|(month, acc)| acc.kpi_row(month, self.fte_hours_per_month))
            .collect();

        debug!("Computed KPIs for {} months", monthly.len());

        Ok(KpiReport {
            monthly,
            diagnostics,
        })
    }
}

/// KPI path with the default 160-hour utilization baseline.
pub fn compute_monthly_kpis(table: &EncounterTable) -> Result<KpiReport> {
    MonthlyAggregator::default().compute_monthly_kpis(table)
}
