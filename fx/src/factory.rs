//! Provider name resolution.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::cache::CachedRateSource;
use crate::config::FxConfig;
use crate::error::{FxError, FxResult};
use crate::frankfurter::FrankfurterRateSource;
use crate::metrics::ProviderMetrics;
use crate::provider::RateSource;
use crate::secondary::SecondaryRateSource;
use crate::transport::{HttpClient, ReqwestHttpClient, ResilientHttpTransport};

/// Known rate providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Frankfurter,
    Secondary,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Frankfurter, ProviderKind::Secondary];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Frankfurter => FrankfurterRateSource::NAME,
            ProviderKind::Secondary => SecondaryRateSource::NAME,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = FxError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "frankfurter" => Ok(ProviderKind::Frankfurter),
            "secondary" | "another" => Ok(ProviderKind::Secondary),
            _ => Err(FxError::UnknownProvider(s.to_string())),
        }
    }
}

/// Resolves provider names to shared, prebuilt sources.
///
/// Each registered source owns its transport and cache; resolving a name
/// never builds anything.
pub struct RateSourceFactory {
    sources: HashMap<ProviderKind, Arc<dyn RateSource>>,
    primary: ProviderKind,
}

impl RateSourceFactory {
    /// Empty factory. Register sources with [`with_source`](Self::with_source).
    pub fn new(primary: ProviderKind) -> Self {
        Self {
            sources: HashMap::new(),
            primary,
        }
    }

    /// Register or replace the source for a provider.
    pub fn with_source(mut self, kind: ProviderKind, source: Arc<dyn RateSource>) -> Self {
        self.sources.insert(kind, source);
        self
    }

    /// Build every provider from configuration with a reqwest client.
    pub fn from_config(config: &FxConfig) -> FxResult<Self> {
        let client = Arc::new(ReqwestHttpClient::new(config.request_timeout)?);
        Ok(Self::with_http_client(config, client))
    }

    /// Build every provider from configuration over a given HTTP client.
    pub fn with_http_client(config: &FxConfig, client: Arc<dyn HttpClient>) -> Self {
        let frankfurter_metrics = Arc::new(ProviderMetrics::new());
        let transport = ResilientHttpTransport::new(
            FrankfurterRateSource::NAME,
            client,
            config.retry.clone(),
            config.circuit_breaker.clone(),
            frankfurter_metrics.clone(),
        );
        let frankfurter = CachedRateSource::with_metrics(
            FrankfurterRateSource::new(config.frankfurter_base_url.clone(), Arc::new(transport)),
            config.cache.clone(),
            frankfurter_metrics,
        );
        // Fixed quotes, nothing to memoize.
        let secondary = SecondaryRateSource::default();

        info!(
            primary = %config.primary_provider,
            frankfurter_url = %config.frankfurter_base_url,
            "Rate providers initialized"
        );

        Self::new(config.primary_provider)
            .with_source(ProviderKind::Frankfurter, Arc::new(frankfurter))
            .with_source(ProviderKind::Secondary, Arc::new(secondary))
    }

    /// Resolve a provider by name.
    pub fn create_source(&self, name: &str) -> FxResult<Arc<dyn RateSource>> {
        let kind: ProviderKind = name.parse()?;
        self.sources
            .get(&kind)
            .cloned()
            .ok_or_else(|| FxError::UnknownProvider(name.to_string()))
    }

    /// Resolve a provider by kind.
    pub fn source(&self, kind: ProviderKind) -> FxResult<Arc<dyn RateSource>> {
        self.sources
            .get(&kind)
            .cloned()
            .ok_or_else(|| FxError::UnknownProvider(kind.to_string()))
    }

    /// Resolve an optional name, falling back to the primary provider.
    pub fn resolve(&self, name: Option<&str>) -> FxResult<Arc<dyn RateSource>> {
        match name {
            Some(name) => self.create_source(name),
            None => self.source(self.primary),
        }
    }

    pub fn primary(&self) -> ProviderKind {
        self.primary
    }

    /// Registered providers, in declaration order.
    pub fn providers(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.sources.keys().copied().collect();
        kinds.sort();
        kinds
    }
}
