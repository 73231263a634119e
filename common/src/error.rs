//! Validation errors shared across RateBridge crates.

use crate::CurrencyCode;
use thiserror::Error;

/// Errors raised while parsing or admitting a currency code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    /// No currency code was supplied.
    #[error("Currency code is required")]
    Missing,

    /// The code is not three ASCII letters.
    #[error("Invalid currency code: {0}")]
    Malformed(String),

    /// The code is valid but excluded by policy.
    #[error("The currency {0} is not allowed")]
    Disallowed(CurrencyCode),
}

impl CurrencyError {
    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            CurrencyError::Missing => "CURRENCY_REQUIRED",
            CurrencyError::Malformed(_) => "INVALID_CURRENCY",
            CurrencyError::Disallowed(_) => "CURRENCY_NOT_ALLOWED",
        }
    }
}
