//! Rate caching with TTL support.

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use ratebridge_common::{CurrencyCode, HistoricalRateSeries, RateTable};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::circuit_breaker::CircuitState;
use crate::context::RequestContext;
use crate::error::FxResult;
use crate::metrics::{MetricsSnapshot, ProviderMetrics};
use crate::provider::RateSource;

/// Which query a cache entry answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Rate,
    LatestTable,
}

/// Cache key: base, target (absent for whole tables), and query kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    base: CurrencyCode,
    target: Option<CurrencyCode>,
    kind: QueryKind,
}

impl CacheKey {
    pub fn rate(base: &CurrencyCode, target: &CurrencyCode) -> Self {
        Self {
            base: base.clone(),
            target: Some(target.clone()),
            kind: QueryKind::Rate,
        }
    }

    pub fn latest_table(base: &CurrencyCode) -> Self {
        Self {
            base: base.clone(),
            target: None,
            kind: QueryKind::LatestTable,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = self.target.as_ref().map(|t| t.code()).unwrap_or("*");
        write!(f, "{}_{}_{:?}", self.base, target, self.kind)
    }
}

/// A memoized answer.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Rate(Option<Decimal>),
    Table(RateTable),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    cached_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(value: CachedValue, ttl: Duration) -> Self {
        Self {
            value,
            cached_at: Instant::now(),
            ttl,
        }
    }

    fn is_valid(&self) -> bool {
        self.cached_at.elapsed() < self.ttl
    }
}

/// Configuration for rate cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// Default TTL for cached answers.
    pub default_ttl: Duration,
    /// Upper bound on stored entries. Expired entries are swept first,
    /// then the oldest fresh ones.
    pub max_entries: usize,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60 * 60),
            max_entries: 10_000,
        }
    }
}

/// Thread-safe rate cache with TTL.
pub struct RateCache {
    cache: DashMap<CacheKey, CacheEntry>,
    config: RateCacheConfig,
}

impl RateCache {
    /// Create a new rate cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(RateCacheConfig::default())
    }

    /// Create a new rate cache with custom configuration.
    pub fn with_config(config: RateCacheConfig) -> Self {
        Self {
            cache: DashMap::new(),
            config,
        }
    }

    /// Get an answer if it is still fresh.
    pub fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        if let Some(entry) = self.cache.get(key) {
            if entry.is_valid() {
                debug!(key = %key, "Cache hit");
                return Some(entry.value.clone());
            }
            debug!(key = %key, "Cache entry expired");
            drop(entry);
            self.cache.remove_if(key, |_, entry| !entry.is_valid());
        }

        debug!(key = %key, "Cache miss");
        None
    }

    /// Insert with the default TTL.
    pub fn insert(&self, key: CacheKey, value: CachedValue) {
        self.insert_with_ttl(key, value, self.config.default_ttl);
    }

    /// Insert with a custom TTL.
    pub fn insert_with_ttl(&self, key: CacheKey, value: CachedValue, ttl: Duration) {
        if !self.cache.contains_key(&key) && self.cache.len() >= self.config.max_entries {
            self.evict_expired();
            while self.cache.len() >= self.config.max_entries {
                if !self.evict_oldest() {
                    break;
                }
            }
        }
        self.cache.insert(key, CacheEntry::new(value, ttl));
    }

    /// Remove the entry cached longest ago. Returns false when empty.
    fn evict_oldest(&self) -> bool {
        let oldest = self
            .cache
            .iter()
            .min_by_key(|entry| entry.cached_at)
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                debug!(key = %key, "Cache full, evicting oldest entry");
                self.cache.remove(&key);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, key: &CacheKey) {
        self.cache.remove(key);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Evict expired entries.
    pub fn evict_expired(&self) {
        self.cache.retain(|_, entry| entry.is_valid());
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let total = self.cache.len();
        let valid = self.cache.iter().filter(|e| e.is_valid()).count();

        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total - valid,
        }
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

/// [`RateSource`] decorator memoizing latest rates and tables.
///
/// Dated tables and historical series pass straight through. Errors are
/// never cached. Two concurrent misses on one key may both reach the inner
/// source.
pub struct CachedRateSource<S> {
    inner: S,
    cache: RateCache,
    metrics: Arc<ProviderMetrics>,
}

impl<S: RateSource> CachedRateSource<S> {
    pub fn new(inner: S, config: RateCacheConfig) -> Self {
        Self::with_metrics(inner, config, Arc::new(ProviderMetrics::new()))
    }

    /// Share counters with the inner source's transport.
    pub fn with_metrics(inner: S, config: RateCacheConfig, metrics: Arc<ProviderMetrics>) -> Self {
        Self {
            inner,
            cache: RateCache::with_config(config),
            metrics,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cache(&self) -> &RateCache {
        &self.cache
    }
}

#[async_trait]
impl<S: RateSource> RateSource for CachedRateSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_rate(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        ctx: &RequestContext,
    ) -> FxResult<Option<Decimal>> {
        let key = CacheKey::rate(base, target);
        if let Some(CachedValue::Rate(rate)) = self.cache.get(&key) {
            self.metrics.cache_hit();
            return Ok(rate);
        }

        self.metrics.cache_miss();
        let rate = self.inner.get_rate(base, target, ctx).await?;
        self.cache.insert(key, CachedValue::Rate(rate));
        Ok(rate)
    }

    async fn get_latest_table(
        &self,
        base: &CurrencyCode,
        ctx: &RequestContext,
    ) -> FxResult<RateTable> {
        let key = CacheKey::latest_table(base);
        if let Some(CachedValue::Table(table)) = self.cache.get(&key) {
            self.metrics.cache_hit();
            return Ok(table);
        }

        self.metrics.cache_miss();
        let table = self.inner.get_latest_table(base, ctx).await?;
        self.cache.insert(key, CachedValue::Table(table.clone()));
        Ok(table)
    }

    async fn get_table_for_date(
        &self,
        base: &CurrencyCode,
        date: NaiveDate,
        ctx: &RequestContext,
    ) -> FxResult<RateTable> {
        self.inner.get_table_for_date(base, date, ctx).await
    }

    async fn get_historical_series(
        &self,
        base: &CurrencyCode,
        start: NaiveDate,
        end: NaiveDate,
        ctx: &RequestContext,
    ) -> FxResult<HistoricalRateSeries> {
        self.inner.get_historical_series(base, start, end, ctx).await
    }

    fn circuit_state(&self) -> Option<CircuitState> {
        self.inner.circuit_state()
    }

    fn metrics(&self) -> Option<MetricsSnapshot> {
        Some(self.metrics.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FxError;
    use crate::provider::MockRateSource;
    use rust_decimal_macros::dec;

    fn usd_table() -> RateTable {
        [
            (CurrencyCode::eur(), dec!(0.90)),
            (CurrencyCode::gbp(), dec!(0.79)),
        ]
        .into_iter()
        .collect()
    }

    fn cached() -> CachedRateSource<MockRateSource> {
        let mock = MockRateSource::new("mock");
        mock.set_latest(CurrencyCode::usd(), usd_table());
        CachedRateSource::new(mock, RateCacheConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_table_cached_within_ttl() {
        let source = cached();
        let ctx = RequestContext::new();

        let first = source.get_latest_table(&CurrencyCode::usd(), &ctx).await.unwrap();
        tokio::time::advance(Duration::from_secs(59 * 60)).await;
        let second = source.get_latest_table(&CurrencyCode::usd(), &ctx).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.inner().calls(), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        source.get_latest_table(&CurrencyCode::usd(), &ctx).await.unwrap();
        assert_eq!(source.inner().calls(), 2);

        let snapshot = source.metrics().unwrap();
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_rate_is_cached() {
        let source = cached();
        let ctx = RequestContext::new();
        let jpy = CurrencyCode::parse("JPY").unwrap();

        assert_eq!(source.get_rate(&CurrencyCode::usd(), &jpy, &ctx).await.unwrap(), None);
        assert_eq!(source.get_rate(&CurrencyCode::usd(), &jpy, &ctx).await.unwrap(), None);
        assert_eq!(source.inner().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_and_table_keys_are_distinct() {
        let source = cached();
        let ctx = RequestContext::new();

        source.get_latest_table(&CurrencyCode::usd(), &ctx).await.unwrap();
        let rate = source
            .get_rate(&CurrencyCode::usd(), &CurrencyCode::eur(), &ctx)
            .await
            .unwrap();

        assert_eq!(rate, Some(dec!(0.90)));
        assert_eq!(source.inner().calls(), 2);
        assert_eq!(source.cache().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dated_tables_pass_through() {
        let source = cached();
        let ctx = RequestContext::new();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        source.get_table_for_date(&CurrencyCode::usd(), date, &ctx).await.unwrap();
        source.get_table_for_date(&CurrencyCode::usd(), date, &ctx).await.unwrap();
        assert_eq!(source.inner().calls(), 2);
        assert!(source.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_not_cached() {
        let source = CachedRateSource::new(FailingSource, RateCacheConfig::default());
        let ctx = RequestContext::new();

        assert!(source.get_latest_table(&CurrencyCode::usd(), &ctx).await.is_err());
        assert!(source.get_latest_table(&CurrencyCode::usd(), &ctx).await.is_err());
        assert!(source.cache().is_empty());
        assert_eq!(source.metrics().unwrap().cache_misses, 2);
    }

    struct FailingSource;

    #[async_trait]
    impl RateSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn get_rate(
            &self,
            _base: &CurrencyCode,
            _target: &CurrencyCode,
            _ctx: &RequestContext,
        ) -> FxResult<Option<Decimal>> {
            Err(FxError::Cancelled)
        }

        async fn get_latest_table(
            &self,
            _base: &CurrencyCode,
            _ctx: &RequestContext,
        ) -> FxResult<RateTable> {
            Err(FxError::Upstream {
                provider: "failing".into(),
                status: Some(503),
                message: "HTTP 503".into(),
            })
        }

        async fn get_table_for_date(
            &self,
            _base: &CurrencyCode,
            _date: NaiveDate,
            _ctx: &RequestContext,
        ) -> FxResult<RateTable> {
            Err(FxError::Cancelled)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_expired() {
        let cache = RateCache::with_config(RateCacheConfig {
            default_ttl: Duration::from_secs(10),
            max_entries: 2,
        });
        cache.insert(CacheKey::latest_table(&CurrencyCode::usd()), CachedValue::Table(RateTable::new()));
        cache.insert(CacheKey::latest_table(&CurrencyCode::eur()), CachedValue::Table(RateTable::new()));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.stats().expired_entries, 2);

        // At capacity, inserting sweeps expired entries first.
        cache.insert(CacheKey::latest_table(&CurrencyCode::gbp()), CachedValue::Table(RateTable::new()));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_is_enforced() {
        let cache = RateCache::with_config(RateCacheConfig {
            default_ttl: Duration::from_secs(3600),
            max_entries: 10,
        });
        let usd = CurrencyCode::usd();

        let targets: Vec<CurrencyCode> = ('A'..='Z')
            .flat_map(|x| ('A'..='D').map(move |y| format!("Q{x}{y}")))
            .map(|code| CurrencyCode::parse(&code).unwrap())
            .collect();
        assert!(targets.len() > 100);

        for target in &targets {
            cache.insert(CacheKey::rate(&usd, target), CachedValue::Rate(None));
            tokio::time::advance(Duration::from_millis(1)).await;
            assert!(cache.len() <= 10);
        }

        // The newest entries survive.
        let last = targets.last().unwrap();
        assert_eq!(cache.get(&CacheKey::rate(&usd, last)), Some(CachedValue::Rate(None)));
        assert_eq!(cache.get(&CacheKey::rate(&usd, &targets[0])), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshing_existing_key_at_capacity_keeps_others() {
        let cache = RateCache::with_config(RateCacheConfig {
            default_ttl: Duration::from_secs(3600),
            max_entries: 2,
        });
        let usd = CacheKey::latest_table(&CurrencyCode::usd());
        let eur = CacheKey::latest_table(&CurrencyCode::eur());
        cache.insert(usd.clone(), CachedValue::Table(RateTable::new()));
        cache.insert(eur.clone(), CachedValue::Table(RateTable::new()));

        cache.insert(usd.clone(), CachedValue::Table(usd_table()));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&eur).is_some());
        assert_eq!(cache.get(&usd), Some(CachedValue::Table(usd_table())));
    }

    #[test]
    fn test_key_display() {
        let key = CacheKey::rate(&CurrencyCode::usd(), &CurrencyCode::eur());
        assert_eq!(key.to_string(), "USD_EUR_Rate");
        assert_eq!(CacheKey::latest_table(&CurrencyCode::usd()).to_string(), "USD_*_LatestTable");
    }
}
