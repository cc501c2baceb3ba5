use thiserror::Error;

#[derive(Error, Debug)]
pub enum KpiError {
    #[error("Unknown fiscal year '{fiscal_year}'. Use one of: {known:?}")]
    UnknownFiscalYear {
        fiscal_year: String,
        known: Vec<String>,
    },

    #[error("Missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("Invalid rate {rate} for code '{code}' in {fiscal_year}: must be finite and non-negative")]
    InvalidRate {
        fiscal_year: String,
        code: String,
        rate: f64,
    },

    #[error("Invalid FTE hours per month {0}: must be finite and greater than 0")]
    InvalidFteHours(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KpiError>;
