//! Frankfurter API payloads.

use ratebridge_common::{CurrencyCode, RateTable};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

/// Body of `/latest` and `/{date}` responses. Every field may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrankfurterResponse {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub rates: Option<HashMap<String, Decimal>>,
}

impl FrankfurterResponse {
    /// Decode a body. A JSON `null` decodes to an empty response.
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        let parsed: Option<Self> = serde_json::from_str(body)?;
        Ok(parsed.unwrap_or_default())
    }

    /// Quotes as a table. Entries with unusable currency codes are dropped.
    pub fn into_table(self) -> RateTable {
        self.rates
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(code, rate)| match CurrencyCode::parse(&code) {
                Ok(currency) => Some((currency, rate)),
                Err(e) => {
                    warn!(code = %code, error = %e, "Dropping quote with invalid currency code");
                    None
                }
            })
            .collect()
    }
}
