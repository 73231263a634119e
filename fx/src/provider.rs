//! Rate source trait and test double.

use async_trait::async_trait;
use chrono::NaiveDate;
use ratebridge_common::{CurrencyCode, HistoricalRateSeries, RateTable};
use rust_decimal::Decimal;

use crate::circuit_breaker::CircuitState;
use crate::context::RequestContext;
use crate::error::FxResult;
use crate::historical::HistoricalRangeFetcher;
use crate::metrics::MetricsSnapshot;

/// A provider of exchange rates.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Latest rate from `base` to `target`. `Ok(None)` means the provider
    /// answered but quoted no rate for `target`.
    async fn get_rate(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        ctx: &RequestContext,
    ) -> FxResult<Option<Decimal>>;

    /// Latest rates from `base` to every currency the provider quotes.
    async fn get_latest_table(
        &self,
        base: &CurrencyCode,
        ctx: &RequestContext,
    ) -> FxResult<RateTable>;

    /// Rates published for one calendar day.
    async fn get_table_for_date(
        &self,
        base: &CurrencyCode,
        date: NaiveDate,
        ctx: &RequestContext,
    ) -> FxResult<RateTable>;

    /// Daily tables for an inclusive range, one request per day.
    ///
    /// Days that fail are skipped. Cancellation returns what was collected.
    async fn get_historical_series(
        &self,
        base: &CurrencyCode,
        start: NaiveDate,
        end: NaiveDate,
        ctx: &RequestContext,
    ) -> FxResult<HistoricalRateSeries> {
        HistoricalRangeFetcher::default()
            .fetch(self, base, start, end, ctx)
            .await
    }

    /// Circuit state of the upstream, if the source has one.
    fn circuit_state(&self) -> Option<CircuitState> {
        None
    }

    /// Counters for the source, if it keeps any.
    fn metrics(&self) -> Option<MetricsSnapshot> {
        None
    }
}

/// Mock rate source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateSource {
    name: String,
    latest: dashmap::DashMap<CurrencyCode, RateTable>,
    dated: dashmap::DashMap<NaiveDate, RateTable>,
    failing_days: dashmap::DashSet<NaiveDate>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateSource {
    /// Create a new mock source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latest: dashmap::DashMap::new(),
            dated: dashmap::DashMap::new(),
            failing_days: dashmap::DashSet::new(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Set the latest table for a base currency.
    pub fn set_latest(&self, base: CurrencyCode, table: RateTable) {
        self.latest.insert(base, table);
    }

    /// Set the table returned for a day.
    pub fn set_day(&self, date: NaiveDate, table: RateTable) {
        self.dated.insert(date, table);
    }

    /// Make requests for a day fail.
    pub fn fail_on(&self, date: NaiveDate) {
        self.failing_days.insert(date);
    }

    /// Number of calls made through the trait.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateSource for MockRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_rate(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        _ctx: &RequestContext,
    ) -> FxResult<Option<Decimal>> {
        self.record_call();
        Ok(self.latest.get(base).and_then(|table| table.get(target)))
    }

    async fn get_latest_table(
        &self,
        base: &CurrencyCode,
        _ctx: &RequestContext,
    ) -> FxResult<RateTable> {
        self.record_call();
        Ok(self
            .latest
            .get(base)
            .map(|table| table.clone())
            .unwrap_or_default())
    }

    async fn get_table_for_date(
        &self,
        _base: &CurrencyCode,
        date: NaiveDate,
        _ctx: &RequestContext,
    ) -> FxResult<RateTable> {
        self.record_call();
        if self.failing_days.contains(&date) {
            return Err(crate::error::FxError::Upstream {
                provider: self.name.clone(),
                status: Some(503),
                message: format!("no data for {date}"),
            });
        }
        Ok(self
            .dated
            .get(&date)
            .map(|table| table.clone())
            .unwrap_or_default())
    }
}
