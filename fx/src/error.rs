//! Rate provider error types.

use chrono::NaiveDate;
use ratebridge_common::CurrencyError;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching or converting rates.
#[derive(Debug, Error)]
pub enum FxError {
    /// Currency code missing, malformed, or disallowed.
    #[error(transparent)]
    Currency(#[from] CurrencyError),

    /// Range start is after range end.
    #[error("Start date {start} cannot be later than end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Range spans more days than the fetcher will request.
    #[error("Date range of {days} days exceeds the maximum of {max} days")]
    RangeTooLarge { days: usize, max: usize },

    /// Conversion amount below zero.
    #[error("Amount must not be negative: {0}")]
    NegativeAmount(Decimal),

    /// Converted amount does not fit in a decimal.
    #[error("Amount {amount} at rate {rate} is out of range")]
    AmountOutOfRange { amount: Decimal, rate: Decimal },

    /// Page or page size out of bounds.
    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    /// No source registered under the requested name.
    #[error("Unknown rate provider: {0}")]
    UnknownProvider(String),

    /// Upstream call failed, after retries if the failure was transient.
    #[error("Upstream {provider} failed: {message}")]
    Upstream {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// Circuit breaker rejected the call without contacting upstream.
    #[error("Upstream {provider} is unavailable (circuit open)")]
    CircuitOpen {
        provider: String,
        retry_after: Option<Duration>,
    },

    /// Upstream payload could not be decoded.
    #[error("Invalid payload from {provider}: {message}")]
    Decode { provider: String, message: String },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FxError {
    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::Currency(e) => e.error_code(),
            FxError::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            FxError::RangeTooLarge { .. } => "DATE_RANGE_TOO_LARGE",
            FxError::NegativeAmount(_) => "NEGATIVE_AMOUNT",
            FxError::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            FxError::InvalidPagination(_) => "INVALID_PAGINATION",
            FxError::UnknownProvider(_) => "UNKNOWN_PROVIDER",
            FxError::Upstream { .. } => "UPSTREAM_ERROR",
            FxError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            FxError::Decode { .. } => "UPSTREAM_PAYLOAD_INVALID",
            FxError::Cancelled => "CANCELLED",
            FxError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Whether the caller supplied bad input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FxError::Currency(_)
                | FxError::InvalidDateRange { .. }
                | FxError::RangeTooLarge { .. }
                | FxError::NegativeAmount(_)
                | FxError::AmountOutOfRange { .. }
                | FxError::InvalidPagination(_)
                | FxError::UnknownProvider(_)
        )
    }

    /// Whether a later attempt by the client may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FxError::CircuitOpen { .. } => true,
            FxError::Upstream { status, .. } => status.map_or(true, |s| s >= 500),
            _ => false,
        }
    }

    /// Whether the failure originated upstream.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            FxError::Upstream { .. } | FxError::CircuitOpen { .. } | FxError::Decode { .. }
        )
    }
}

/// Result type for rate operations.
pub type FxResult<T> = Result<T, FxError>;
