//! Currency conversion types.

use ratebridge_common::CurrencyCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FxError, FxResult};

/// Result of converting an amount at the latest rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub base: CurrencyCode,
    pub target: CurrencyCode,
    /// Input amount in the base currency.
    pub amount: Decimal,
    /// Rate used, `None` when the provider quoted nothing for the target.
    pub rate: Option<Decimal>,
    /// `amount * rate`, or zero when no rate was quoted.
    pub converted_amount: Decimal,
    /// Provider that supplied the rate.
    pub provider: String,
}

impl Conversion {
    /// Create a conversion record, computing the converted amount.
    ///
    /// Fails when `amount * rate` overflows.
    pub fn new(
        base: CurrencyCode,
        target: CurrencyCode,
        amount: Decimal,
        rate: Option<Decimal>,
        provider: impl Into<String>,
    ) -> FxResult<Self> {
        let converted_amount = match rate {
            Some(rate) => amount
                .checked_mul(rate)
                .ok_or(FxError::AmountOutOfRange { amount, rate })?,
            None => Decimal::ZERO,
        };
        Ok(Self {
            base,
            target,
            amount,
            rate,
            converted_amount,
            provider: provider.into(),
        })
    }

    /// Whether the provider quoted a rate.
    pub fn is_rate_available(&self) -> bool {
        self.rate.is_some()
    }
}

/// Request to perform a conversion. Codes are raw caller input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub base_currency: String,
    pub target_currency: String,
    pub amount: Decimal,
    /// Provider name; the primary provider when absent.
    #[serde(default)]
    pub provider: Option<String>,
}

impl ConversionRequest {
    /// Create a new conversion request.
    pub fn new(base: impl Into<String>, target: impl Into<String>, amount: Decimal) -> Self {
        Self {
            base_currency: base.into(),
            target_currency: target.into(),
            amount,
            provider: None,
        }
    }

    /// Use a specific provider.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}
