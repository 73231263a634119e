//! Fixed-quote secondary source.
//!
//! Serves a static quote table without network access. It stands in for a
//! second vendor so provider selection can be exercised end to end.

use async_trait::async_trait;
use chrono::NaiveDate;
use ratebridge_common::{CurrencyCode, RateTable};
use rust_decimal::Decimal;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::FxResult;
use crate::provider::RateSource;

/// Rate source answering from a fixed quote table.
#[derive(Debug, Clone)]
pub struct SecondaryRateSource {
    quotes: RateTable,
}

impl SecondaryRateSource {
    pub const NAME: &'static str = "secondary";

    pub fn new(quotes: RateTable) -> Self {
        Self { quotes }
    }

    /// Quotes served when none are configured.
    pub fn default_quotes() -> RateTable {
        [
            (CurrencyCode::eur(), Decimal::new(11, 1)),
            (CurrencyCode::gbp(), Decimal::new(9, 1)),
        ]
        .into_iter()
        .collect()
    }

    /// Quotes with the base itself removed.
    fn table_for(&self, base: &CurrencyCode) -> RateTable {
        self.quotes
            .iter()
            .filter(|(code, _)| *code != base)
            .map(|(code, rate)| (code.clone(), *rate))
            .collect()
    }
}

impl Default for SecondaryRateSource {
    fn default() -> Self {
        Self::new(Self::default_quotes())
    }
}

#[async_trait]
impl RateSource for SecondaryRateSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn get_rate(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        ctx: &RequestContext,
    ) -> FxResult<Option<Decimal>> {
        debug!(correlation_id = %ctx.correlation_id(), %base, %target, "Serving fixed quote");
        if base == target {
            return Ok(Some(Decimal::ONE));
        }
        Ok(self.quotes.get(target))
    }

    async fn get_latest_table(
        &self,
        base: &CurrencyCode,
        ctx: &RequestContext,
    ) -> FxResult<RateTable> {
        debug!(correlation_id = %ctx.correlation_id(), %base, "Serving fixed quote table");
        Ok(self.table_for(base))
    }

    async fn get_table_for_date(
        &self,
        base: &CurrencyCode,
        _date: NaiveDate,
        _ctx: &RequestContext,
    ) -> FxResult<RateTable> {
        Ok(self.table_for(base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_fixed_quotes() {
        let source = SecondaryRateSource::default();
        let ctx = RequestContext::new();

        let rate = source
            .get_rate(&CurrencyCode::usd(), &CurrencyCode::eur(), &ctx)
            .await
            .unwrap();
        assert_eq!(rate, Some(dec!(1.1)));

        let table = source.get_latest_table(&CurrencyCode::usd(), &ctx).await.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&CurrencyCode::gbp()), Some(dec!(0.9)));
    }

    #[tokio::test]
    async fn test_base_is_excluded_from_table() {
        let source = SecondaryRateSource::default();
        let table = source
            .get_latest_table(&CurrencyCode::eur(), &RequestContext::new())
            .await
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&CurrencyCode::eur()), None);
    }

    #[tokio::test]
    async fn test_historical_series_covers_every_day() {
        let source = SecondaryRateSource::default();
        let start = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();

        let series = source
            .get_historical_series(&CurrencyCode::usd(), start, end, &RequestContext::new())
            .await
            .unwrap();
        assert_eq!(series.len(), 3);
    }

    #[tokio::test]
    async fn test_unquoted_target() {
        let rate = SecondaryRateSource::default()
            .get_rate(&CurrencyCode::usd(), &CurrencyCode::parse("JPY").unwrap(), &RequestContext::new())
            .await
            .unwrap();
        assert_eq!(rate, None);
    }
}
