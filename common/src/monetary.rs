//! Currency and rate table types for RateBridge.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::CurrencyError;

/// Currencies rejected by default before any upstream call is made.
pub const DEFAULT_DISALLOWED_CURRENCIES: [&str; 4] = ["TRY", "PLN", "THB", "MXN"];

/// ISO 4217 style currency code, always three uppercase ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parse and normalize a currency code.
    pub fn parse(code: &str) -> Result<Self, CurrencyError> {
        let normalized = code.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(CurrencyError::Missing);
        }
        if normalized.len() != 3 || !normalized.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(CurrencyError::Malformed(code.to_string()));
        }
        Ok(Self(normalized))
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn eur() -> Self {
        Self("EUR".to_string())
    }

    pub fn gbp() -> Self {
        Self("GBP".to_string())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// Admission policy for currency codes.
#[derive(Debug, Clone)]
pub struct CurrencyPolicy {
    disallowed: HashSet<CurrencyCode>,
}

impl CurrencyPolicy {
    /// Build a policy from raw codes. Malformed codes are rejected.
    pub fn from_codes<'a>(codes: impl IntoIterator<Item = &'a str>) -> Result<Self, CurrencyError> {
        let disallowed = codes
            .into_iter()
            .map(CurrencyCode::parse)
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(Self { disallowed })
    }

    /// Policy that admits every well-formed code.
    pub fn permissive() -> Self {
        Self {
            disallowed: HashSet::new(),
        }
    }

    /// Check whether a code is excluded.
    pub fn is_disallowed(&self, code: &CurrencyCode) -> bool {
        self.disallowed.contains(code)
    }

    /// Reject a parsed code if it is excluded.
    pub fn check(&self, code: &CurrencyCode) -> Result<(), CurrencyError> {
        if self.is_disallowed(code) {
            return Err(CurrencyError::Disallowed(code.clone()));
        }
        Ok(())
    }

    /// Parse a raw code and apply the policy.
    pub fn admit(&self, raw: &str) -> Result<CurrencyCode, CurrencyError> {
        let code = CurrencyCode::parse(raw)?;
        self.check(&code)?;
        Ok(code)
    }
}

impl Default for CurrencyPolicy {
    fn default() -> Self {
        Self {
            disallowed: DEFAULT_DISALLOWED_CURRENCIES
                .iter()
                .map(|c| CurrencyCode(c.to_string()))
                .collect(),
        }
    }
}

/// Exchange rates for one base currency at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateTable(BTreeMap<CurrencyCode, Decimal>);

impl RateTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert or replace a quote.
    pub fn insert(&mut self, currency: CurrencyCode, rate: Decimal) {
        self.0.insert(currency, rate);
    }

    /// Look up a quote. `None` means the table has no entry for the currency.
    pub fn get(&self, currency: &CurrencyCode) -> Option<Decimal> {
        self.0.get(currency).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CurrencyCode, &Decimal)> {
        self.0.iter()
    }
}

impl FromIterator<(CurrencyCode, Decimal)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (CurrencyCode, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_code_normalizes() {
        let code = CurrencyCode::parse(" usd ").unwrap();
        assert_eq!(code.code(), "USD");
        assert_eq!(code, CurrencyCode::usd());
    }

    #[test]
    fn test_currency_code_rejects_malformed() {
        assert_eq!(CurrencyCode::parse(""), Err(CurrencyError::Missing));
        assert_eq!(CurrencyCode::parse("   "), Err(CurrencyError::Missing));
        assert!(matches!(CurrencyCode::parse("US"), Err(CurrencyError::Malformed(_))));
        assert!(matches!(CurrencyCode::parse("USDX"), Err(CurrencyError::Malformed(_))));
        assert!(matches!(CurrencyCode::parse("U1D"), Err(CurrencyError::Malformed(_))));
        assert!(matches!(CurrencyCode::parse("ÜSD"), Err(CurrencyError::Malformed(_))));
    }

    #[test]
    fn test_default_policy_rejects_excluded_currencies() {
        let policy = CurrencyPolicy::default();
        for raw in ["try", "PLN", "Thb", "mxn"] {
            let err = policy.admit(raw).unwrap_err();
            assert!(matches!(err, CurrencyError::Disallowed(_)), "{raw} should be rejected");
        }
        assert_eq!(policy.admit("eur").unwrap(), CurrencyCode::eur());
    }

    #[test]
    fn test_custom_policy() {
        let policy = CurrencyPolicy::from_codes(["gbp"]).unwrap();
        assert!(policy.is_disallowed(&CurrencyCode::gbp()));
        assert!(policy.admit("TRY").is_ok());
        assert!(CurrencyPolicy::from_codes(["GB"]).is_err());
        assert!(CurrencyPolicy::permissive().admit("MXN").is_ok());
    }

    #[test]
    fn test_rate_table_json() {
        let table: RateTable = serde_json::from_str(r#"{"GBP": 0.79, "EUR": 0.9}"#).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&CurrencyCode::eur()), Some(dec!(0.9)));
        assert_eq!(table.get(&CurrencyCode::usd()), None);

        // Keys come out sorted.
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.find("EUR").unwrap() < json.find("GBP").unwrap());
    }

    #[test]
    fn test_rate_table_rejects_bad_keys() {
        let result: Result<RateTable, _> = serde_json::from_str(r#"{"EURO": 1.0}"#);
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn prop_parse_is_case_insensitive(code in "[a-zA-Z]{3}") {
            let parsed = CurrencyCode::parse(&code).unwrap();
            prop_assert_eq!(parsed.code(), code.to_ascii_uppercase());
            prop_assert_eq!(CurrencyCode::parse(&code.to_ascii_lowercase()).unwrap(), parsed);
        }

        #[test]
        fn prop_wrong_length_is_rejected(code in "[A-Z]{4,8}") {
            prop_assert!(CurrencyCode::parse(&code).is_err());
        }
    }
}
