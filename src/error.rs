//! Error types for the boundaries of the costing core.
//!
//! The calculators themselves never fail: malformed numbers become zero and
//! unknown catalog ids price at zero. Errors only exist where data crosses
//! into or out of the crate.

use thiserror::Error;

/// Failure to load a replacement tariff.
#[derive(Debug, Error)]
pub enum TariffError {
    #[error("tariff JSON could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("tariff table '{table}' has no tiers")]
    EmptyTable { table: &'static str },

    #[error("tariff table '{table}' tier {index} ({upper}) does not exceed the previous tier")]
    UnorderedTier {
        table: &'static str,
        index: usize,
        upper: f64,
    },

    #[error("GST rate {0} is outside [0, 1)")]
    InvalidGstRate(f64),
}

/// Failure reported by the persistence collaborator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("calculation store unavailable: {0}")]
    Unavailable(String),

    #[error("calculation store rejected the payload: {0}")]
    Rejected(String),
}

/// Result alias for tariff loading.
pub type Result<T> = std::result::Result<T, TariffError>;
