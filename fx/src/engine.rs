//! Conversion orchestrator: validation, provider selection, and paging.

use chrono::NaiveDate;
use ratebridge_common::{CurrencyPolicy, HistoricalPage, RateTable};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};

use crate::circuit_breaker::CircuitState;
use crate::config::FxConfig;
use crate::context::RequestContext;
use crate::conversion::{Conversion, ConversionRequest};
use crate::error::{FxError, FxResult};
use crate::factory::{ProviderKind, RateSourceFactory};
use crate::historical::{HistoricalFetchConfig, HistoricalRangeFetcher};
use crate::metrics::MetricsSnapshot;
use crate::provider::RateSource;

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Largest accepted page size for historical queries.
    pub max_page_size: usize,
    pub historical: HistoricalFetchConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            historical: HistoricalFetchConfig::default(),
        }
    }
}

/// Paged historical query. Codes and provider are raw caller input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalQuery {
    pub base_currency: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
    pub provider: Option<String>,
}

impl HistoricalQuery {
    pub fn new(base: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            base_currency: base.into(),
            start,
            end,
            page: 1,
            page_size: 10,
            provider: None,
        }
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

/// Health of one registered provider.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub provider: ProviderKind,
    pub circuit: Option<CircuitState>,
    pub metrics: Option<MetricsSnapshot>,
}

impl ProviderHealth {
    /// Whether the provider is currently accepting calls.
    pub fn is_available(&self) -> bool {
        !matches!(self.circuit, Some(CircuitState::Open))
    }
}

/// Serves latest rates, conversions, and paged history.
///
/// Holds no mutable state of its own; caches and circuits live in the
/// sources the factory hands out.
pub struct ConversionOrchestrator {
    factory: RateSourceFactory,
    policy: CurrencyPolicy,
    fetcher: HistoricalRangeFetcher,
    config: OrchestratorConfig,
}

impl ConversionOrchestrator {
    pub fn new(factory: RateSourceFactory, policy: CurrencyPolicy, config: OrchestratorConfig) -> Self {
        Self {
            factory,
            policy,
            fetcher: HistoricalRangeFetcher::new(config.historical.clone()),
            config,
        }
    }

    /// Build providers and policy from configuration.
    pub fn from_config(config: &FxConfig) -> FxResult<Self> {
        config.validate().map_err(FxError::Configuration)?;
        let factory = RateSourceFactory::from_config(config)?;
        Ok(Self::new(
            factory,
            config.currency_policy()?,
            OrchestratorConfig {
                max_page_size: config.max_page_size,
                historical: config.historical.clone(),
            },
        ))
    }

    pub fn factory(&self) -> &RateSourceFactory {
        &self.factory
    }

    /// Latest rates for a base currency.
    #[instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id()))]
    pub async fn get_latest(
        &self,
        base: &str,
        provider: Option<&str>,
        ctx: &RequestContext,
    ) -> FxResult<RateTable> {
        let base = self.policy.admit(base)?;
        let source = self.factory.resolve(provider)?;

        let table = source.get_latest_table(&base, ctx).await?;
        info!(provider = source.name(), %base, quotes = table.len(), "Latest rates served");
        Ok(table)
    }

    /// Convert an amount at the latest rate.
    #[instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id()))]
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        ctx: &RequestContext,
    ) -> FxResult<Conversion> {
        let base = self.policy.admit(&request.base_currency)?;
        let target = self.policy.admit(&request.target_currency)?;
        if request.amount < Decimal::ZERO {
            return Err(FxError::NegativeAmount(request.amount));
        }
        let source = self.factory.resolve(request.provider.as_deref())?;

        let rate = source.get_rate(&base, &target, ctx).await?;
        let conversion = Conversion::new(base, target, request.amount, rate, source.name())?;

        info!(
            provider = %conversion.provider,
            base = %conversion.base,
            target = %conversion.target,
            rate = ?conversion.rate,
            converted_amount = %conversion.converted_amount,
            "Conversion completed"
        );
        Ok(conversion)
    }

    /// One page of daily rates for a date range.
    #[instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id()))]
    pub async fn get_historical(
        &self,
        query: &HistoricalQuery,
        ctx: &RequestContext,
    ) -> FxResult<HistoricalPage> {
        if query.start > query.end {
            return Err(FxError::InvalidDateRange {
                start: query.start,
                end: query.end,
            });
        }
        let base = self.policy.admit(&query.base_currency)?;
        self.validate_page(query.page, query.page_size)?;
        let source = self.factory.resolve(query.provider.as_deref())?;

        let series = self
            .fetcher
            .fetch(source.as_ref(), &base, query.start, query.end, ctx)
            .await?;
        let page = series.paginate(query.page, query.page_size);

        info!(
            provider = source.name(),
            %base,
            total = page.total_count,
            returned = page.data.len(),
            "Historical rates served"
        );
        Ok(page)
    }

    /// Circuit state and counters for every registered provider.
    pub fn health(&self) -> Vec<ProviderHealth> {
        self.factory
            .providers()
            .into_iter()
            .filter_map(|kind| {
                let source = self.factory.source(kind).ok()?;
                Some(ProviderHealth {
                    provider: kind,
                    circuit: source.circuit_state(),
                    metrics: source.metrics(),
                })
            })
            .collect()
    }

    fn validate_page(&self, page: usize, page_size: usize) -> FxResult<()> {
        if page == 0 {
            return Err(FxError::InvalidPagination("page must be at least 1".to_string()));
        }
        if page_size == 0 || page_size > self.config.max_page_size {
            return Err(FxError::InvalidPagination(format!(
                "page size must be between 1 and {}",
                self.config.max_page_size
            )));
        }
        Ok(())
    }
}
