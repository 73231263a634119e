//! Rate layer configuration.

use ratebridge_common::{CurrencyPolicy, DEFAULT_DISALLOWED_CURRENCIES};
use std::time::Duration;

use crate::cache::RateCacheConfig;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::{FxError, FxResult};
use crate::factory::ProviderKind;
use crate::frankfurter::FrankfurterRateSource;
use crate::historical::HistoricalFetchConfig;
use crate::retry::RetryPolicy;

/// Configuration for every provider and the orchestrator.
#[derive(Debug, Clone)]
pub struct FxConfig {
    /// Frankfurter API root.
    pub frankfurter_base_url: String,
    /// Timeout for a single HTTP attempt.
    pub request_timeout: Duration,
    pub cache: RateCacheConfig,
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
    pub historical: HistoricalFetchConfig,
    /// Largest page size accepted for historical queries.
    pub max_page_size: usize,
    /// Currencies rejected before any fetch.
    pub disallowed_currencies: Vec<String>,
    /// Provider used when a caller names none.
    pub primary_provider: ProviderKind,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            frankfurter_base_url: FrankfurterRateSource::DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            cache: RateCacheConfig::default(),
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            historical: HistoricalFetchConfig::default(),
            max_page_size: 100,
            disallowed_currencies: DEFAULT_DISALLOWED_CURRENCIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            primary_provider: ProviderKind::Frankfurter,
        }
    }
}

impl FxConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup. Unparseable values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let secs = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
        };
        let count = |key: &str| lookup(key).and_then(|v| v.trim().parse::<usize>().ok());
        let small = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u32>().ok());

        if let Some(url) = lookup("FX_FRANKFURTER_URL") {
            config.frankfurter_base_url = url;
        }
        if let Some(timeout) = secs("FX_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = timeout;
        }
        if let Some(ttl) = secs("FX_CACHE_TTL_SECS") {
            config.cache.default_ttl = ttl;
        }
        if let Some(max) = count("FX_CACHE_MAX_ENTRIES") {
            config.cache.max_entries = max;
        }
        if let Some(retries) = small("FX_MAX_RETRIES") {
            config.retry.max_retries = retries;
        }
        if let Some(threshold) = small("FX_CIRCUIT_FAILURE_THRESHOLD") {
            config.circuit_breaker.failure_threshold = threshold;
        }
        if let Some(cooldown) = secs("FX_CIRCUIT_COOLDOWN_SECS") {
            config.circuit_breaker.cooldown = cooldown;
        }
        if let Some(concurrency) = count("FX_HISTORICAL_CONCURRENCY") {
            config.historical.max_concurrent_days = concurrency;
        }
        if let Some(days) = count("FX_HISTORICAL_MAX_DAYS") {
            config.historical.max_range_days = days;
        }
        if let Some(size) = count("FX_MAX_PAGE_SIZE") {
            config.max_page_size = size;
        }
        if let Some(codes) = lookup("FX_DISALLOWED_CURRENCIES") {
            config.disallowed_currencies = codes
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(kind) = lookup("FX_PRIMARY_PROVIDER").and_then(|v| v.parse().ok()) {
            config.primary_provider = kind;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.frankfurter_base_url.starts_with("http://")
            && !self.frankfurter_base_url.starts_with("https://")
        {
            return Err("Frankfurter URL must be http(s)".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout cannot be 0".to_string());
        }

        if self.cache.default_ttl.is_zero() {
            return Err("Cache TTL cannot be 0".to_string());
        }

        if self.cache.max_entries == 0 {
            return Err("Cache capacity cannot be 0".to_string());
        }

        if self.retry.unit_delay > self.retry.max_delay {
            return Err("Retry unit delay cannot exceed max delay".to_string());
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err("Circuit breaker threshold cannot be 0".to_string());
        }

        if self.historical.max_concurrent_days == 0 {
            return Err("Historical concurrency cannot be 0".to_string());
        }

        if self.historical.max_range_days == 0 {
            return Err("Historical range limit cannot be 0".to_string());
        }

        if self.max_page_size == 0 {
            return Err("Max page size cannot be 0".to_string());
        }

        self.currency_policy().map_err(|e| e.to_string())?;

        Ok(())
    }

    /// Currency admission policy built from the disallowed list.
    pub fn currency_policy(&self) -> FxResult<CurrencyPolicy> {
        CurrencyPolicy::from_codes(self.disallowed_currencies.iter().map(String::as_str))
            .map_err(|e| FxError::Configuration(format!("disallowed currencies: {e}")))
    }
}
