//! Rate catalog: fiscal year label → billing code → unit rate.
//!
//! The built-in tables cover FY23 through FY25. A catalog can also be loaded from a
//! versioned JSON document so rate changes do not need a rebuild.

use crate::error::{KpiError, Result};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub type RateTable = BTreeMap<String, f64>;

pub const BUILTIN_CATALOG_VERSION: &str = "builtin";

const FY23_RATES: [(&str, f64); 10] = [
    ("90832", 65.00),
    ("90834", 100.00),
    ("90837", 129.00),
    ("H0001", 176.00),
    ("H0006", 45.50),
    ("T1012", 47.50),
    ("T1012G", 19.00),
    ("H0004", 26.50),
    ("H0038", 24.00),
    ("H0038G", 5.50),
];

const FY24_RATES: [(&str, f64); 10] = [
    ("90832", 71.50),
    ("90834", 110.00),
    ("90837", 142.00),
    ("H0001", 194.00),
    ("H0006", 50.50),
    ("T1012", 52.50),
    ("T1012G", 21.00),
    ("H0004", 29.50),
    ("H0038", 26.50),
    ("H0038G", 6.50),
];

fn table_from(entries: &[(&str, f64)]) -> RateTable {
    entries
        .iter()
        .map(|(code, rate)| (code.to_string(), *rate))
        .collect()
}

/// On-disk form of a rate catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RateCatalogDocument {
    #[schemars(description = "Version label of this rate catalog (e.g. '2024-07-01')")]
    pub version: String,

    #[schemars(
        description = "Map of fiscal year label (e.g. 'FY24') to a map of billing code to unit rate. Rates must be non-negative."
    )]
    pub fiscal_years: BTreeMap<String, BTreeMap<String, f64>>,
}

impl RateCatalogDocument {
    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(RateCatalogDocument);
        serde_json::to_string_pretty(&schema)
    }
}

/// Immutable set of rate tables. Cheap to share across threads once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RateCatalog {
    version: String,
    tables: BTreeMap<String, RateTable>,
}

impl Default for RateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RateCatalog {
    /// FY23 baseline, FY24 increased rates, FY25 unchanged from FY24.
    pub fn builtin() -> Self {
        let fy24 = table_from(&FY24_RATES);
        let mut tables = BTreeMap::new();
        tables.insert("FY23".to_string(), table_from(&FY23_RATES));
        tables.insert("FY24".to_string(), fy24.clone());
        tables.insert("FY25".to_string(), fy24);

        Self {
            version: BUILTIN_CATALOG_VERSION.to_string(),
            tables,
        }
    }

    pub fn from_document(document: RateCatalogDocument) -> Result<Self> {
        if document.fiscal_years.is_empty() {
            return Err(KpiError::InvalidConfig(format!(
                "Rate catalog '{}' defines no fiscal years",
                document.version
            )));
        }

        for (fiscal_year, table) in &document.fiscal_years {
            validate_rate_table(fiscal_year, table)?;
        }

        debug!(
            "Loaded rate catalog '{}' with fiscal years {:?}",
            document.version,
            document.fiscal_years.keys().collect::<Vec<_>>()
        );

        Ok(Self {
            version: document.version,
            tables: document.fiscal_years,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let document: RateCatalogDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Adds or replaces one fiscal year's table.
    pub fn with_fiscal_year(mut self, fiscal_year: &str, table: RateTable) -> Result<Self> {
        validate_rate_table(fiscal_year, &table)?;
        self.tables.insert(fiscal_year.to_string(), table);
        Ok(self)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn fiscal_years(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, fiscal_year: &str) -> bool {
        self.tables.contains_key(fiscal_year)
    }

    /// Full rate table for a registered fiscal year.
    pub fn get_rates(&self, fiscal_year: &str) -> Result<&RateTable> {
        self.tables
            .get(fiscal_year)
            .ok_or_else(|| KpiError::UnknownFiscalYear {
                fiscal_year: fiscal_year.to_string(),
                known: self.tables.keys().cloned().collect(),
            })
    }

    /// Rate for one code. Unknown codes in a known year are 0; unknown years fail.
    pub fn rate_for(&self, fiscal_year: &str, code: &str) -> Result<f64> {
        let rates = self.get_rates(fiscal_year)?;
        Ok(lookup_rate(rates, code).unwrap_or(0.0))
    }

    pub fn to_document(&self) -> RateCatalogDocument {
        RateCatalogDocument {
            version: self.version.clone(),
            fiscal_years: self.tables.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }
}

pub fn lookup_rate(rates: &RateTable, code: &str) -> Option<f64> {
    rates.get(code).copied()
}

/// Rate table for a fiscal year from the built-in catalog.
pub fn get_rates(fiscal_year: &str) -> Result<RateTable> {
    RateCatalog::builtin().get_rates(fiscal_year).cloned()
}

pub fn validate_rate_table(fiscal_year: &str, table: &RateTable) -> Result<()> {
    for (code, &rate) in table {
        if !rate.is_finite() || rate < 0.0 {
            return Err(KpiError::InvalidRate {
                fiscal_year: fiscal_year.to_string(),
                code: code.clone(),
                rate,
            });
        }
    }
    Ok(())
}
