//! # Encounter Revenue KPIs
//!
//! A library for converting per-encounter clinical billing records into per-encounter
//! revenue, monthly rollups by billing code, and monthly KPI trends.
//!
//! ## Core Concepts
//!
//! - **Rate Catalog**: fiscal year label → billing code → unit rate (FY23, FY24, FY25 built in)
//! - **Units**: time-based codes bill `floor(minutes / 15)` units, all others bill one unit
//! - **Revenue**: `units × rate`; codes missing from the rate table bill at rate 0
//! - **Monthly Rollups**: one row per (month, code) and one row per month, ascending
//! - **KPIs**: client hours, revenue per hour, revenue per encounter, utilization against a
//!   monthly FTE baseline (160 hours by default)
//!
//! Bad input degrades silently: unparsable dates drop the row and unreadable durations count
//! as zero minutes. Each run returns a [`DataQualityReport`] describing what was dropped.
//!
//! ## Example
//!
//! ```rust
//! use encounter_revenue_kpis::*;
//!
//! let table = EncounterTable::from_records(vec![
//!     EncounterRecord::new("2024-01-05", "90834", 50.0),
//!     EncounterRecord::new("2024-01-20", "H0038", 47.0),
//! ]);
//!
//! let engine = KpiEngine::new(EngineConfig::default()).unwrap();
//! let report = engine.compute_revenue(&table).unwrap();
//!
//! let january = &report.monthly_total[0];
//! assert_eq!(january.encounters, 2);
//! assert_eq!(january.total_units, 4);
//! assert!((january.revenue - 189.50).abs() < 1e-9);
//! ```

pub mod aggregation;
pub mod diagnostics;
pub mod error;
pub mod ingestion;
pub mod rates;
pub mod report;
pub mod revenue;
pub mod schema;
pub mod units;
pub mod utils;

pub use aggregation::{
    compute_monthly_kpis, KpiReport, MonthlyAggregator, DEFAULT_FTE_HOURS_PER_MONTH,
};
pub use diagnostics::{DataQualityReport, DegradationCount, RowSample};
pub use error::{KpiError, Result};
pub use ingestion::*;
pub use rates::{get_rates, RateCatalog, RateCatalogDocument, RateTable};
pub use report::{write_trend_reports, TrendMetric, TrendReportConfig, TrendReporter};
pub use revenue::{compute_revenue, RateSource, RevenueCalculator, RevenueReport};
pub use schema::*;
pub use units::{add_units, default_time_based_codes, derive_units, BillingBasis};
pub use utils::*;

use log::{debug, info};
use std::path::PathBuf;

/// Configured entry point: resolves the rate catalog once and runs both KPI paths.
#[derive(Debug, Clone)]
pub struct KpiEngine {
    config: EngineConfig,
    catalog: RateCatalog,
    aggregator: MonthlyAggregator,
}

impl KpiEngine {
    /// Loads the catalog named by `config.rate_catalog_path`, or the built-in tables.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let catalog = match &config.rate_catalog_path {
            Some(path) => {
                info!("Loading rate catalog from {}", path.display());
                RateCatalog::from_path(path)?
            }
            None => RateCatalog::builtin(),
        };
        Self::with_catalog(config, catalog)
    }

    /// Fails early with `UnknownFiscalYear` if the configured year is not in `catalog`.
    pub fn with_catalog(config: EngineConfig, catalog: RateCatalog) -> Result<Self> {
        config.validate()?;
        catalog.get_rates(&config.fiscal_year)?;
        let aggregator = MonthlyAggregator::new(config.fte_hours_per_month)?;

        debug!(
            "Engine ready: catalog '{}', fiscal year {}, {} time-based codes, {} FTE hours",
            catalog.version(),
            config.fiscal_year,
            config.time_based_codes.len(),
            config.fte_hours_per_month
        );

        Ok(Self {
            config,
            catalog,
            aggregator,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &RateCatalog {
        &self.catalog
    }

    pub fn calculator(&self) -> RevenueCalculator<'_> {
        RevenueCalculator::new(&self.catalog)
            .with_time_based_codes(self.config.time_based_codes.clone())
            .with_aggregator(self.aggregator)
    }

    /// Revenue path using the configured fiscal year.
    pub fn compute_revenue(&self, table: &EncounterTable) -> Result<RevenueReport> {
        self.calculator()
            .compute(table, RateSource::FiscalYear(&self.config.fiscal_year))
    }

    /// Revenue path for an explicitly named fiscal year.
    pub fn compute_revenue_for_year(
        &self,
        table: &EncounterTable,
        fiscal_year: &str,
    ) -> Result<RevenueReport> {
        self.calculator()
            .compute(table, RateSource::FiscalYear(fiscal_year))
    }

    /// Revenue path with caller-supplied rates; the catalog is not consulted.
    pub fn compute_revenue_with_rates(
        &self,
        table: &EncounterTable,
        rates: &RateTable,
    ) -> Result<RevenueReport> {
        self.calculator().compute(table, RateSource::Explicit(rates))
    }

    /// KPI path over a table with precomputed `revenue`.
    pub fn compute_monthly_kpis(&self, table: &EncounterTable) -> Result<KpiReport> {
        self.aggregator.compute_monthly_kpis(table)
    }

    pub fn write_reports(
        &self,
        report: &RevenueReport,
        report_config: &TrendReportConfig,
    ) -> Result<Vec<PathBuf>> {
        write_trend_reports(&report.monthly_kpis(), report_config)
    }
}

/// Revenue path with a one-off engine built from `config`.
pub fn process_encounters(table: &EncounterTable, config: &EngineConfig) -> Result<RevenueReport> {
    KpiEngine::new(config.clone())?.compute_revenue(table)
}
