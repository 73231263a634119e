//! Frankfurter (ECB reference rates) source.

use async_trait::async_trait;
use chrono::NaiveDate;
use ratebridge_common::{format_date, CurrencyCode, RateTable};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use crate::circuit_breaker::CircuitState;
use crate::context::RequestContext;
use crate::error::{FxError, FxResult};
use crate::metrics::MetricsSnapshot;
use crate::provider::RateSource;
use crate::transport::ResilientHttpTransport;
use crate::wire::FrankfurterResponse;

/// Rate source backed by the Frankfurter HTTP API.
pub struct FrankfurterRateSource {
    base_url: String,
    transport: Arc<ResilientHttpTransport>,
}

impl FrankfurterRateSource {
    pub const NAME: &'static str = "frankfurter";
    pub const DEFAULT_BASE_URL: &'static str = "https://api.frankfurter.app";

    pub fn new(base_url: impl Into<String>, transport: Arc<ResilientHttpTransport>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            transport,
        }
    }

    pub fn transport(&self) -> &ResilientHttpTransport {
        &self.transport
    }

    fn latest_url(&self, base: &CurrencyCode, target: Option<&CurrencyCode>) -> String {
        match target {
            Some(target) => format!("{}/latest?base={}&symbols={}", self.base_url, base, target),
            None => format!("{}/latest?base={}", self.base_url, base),
        }
    }

    fn dated_url(&self, base: &CurrencyCode, date: NaiveDate) -> String {
        format!("{}/{}?base={}", self.base_url, format_date(date), base)
    }

    async fn fetch(&self, url: &str, ctx: &RequestContext) -> FxResult<FrankfurterResponse> {
        let response = self.transport.get(url, ctx).await?;
        FrankfurterResponse::parse(&response.body).map_err(|e| FxError::Decode {
            provider: Self::NAME.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl RateSource for FrankfurterRateSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn get_rate(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
        ctx: &RequestContext,
    ) -> FxResult<Option<Decimal>> {
        info!(
            correlation_id = %ctx.correlation_id(),
            %base,
            %target,
            "Fetching exchange rate from Frankfurter"
        );

        let table = self
            .fetch(&self.latest_url(base, Some(target)), ctx)
            .await?
            .into_table();
        let rate = table.get(target);
        if rate.is_none() {
            debug!(
                correlation_id = %ctx.correlation_id(),
                %base,
                %target,
                "Frankfurter returned no quote for target"
            );
        }
        Ok(rate)
    }

    async fn get_latest_table(
        &self,
        base: &CurrencyCode,
        ctx: &RequestContext,
    ) -> FxResult<RateTable> {
        info!(
            correlation_id = %ctx.correlation_id(),
            %base,
            "Fetching latest exchange rates from Frankfurter"
        );
        Ok(self.fetch(&self.latest_url(base, None), ctx).await?.into_table())
    }

    async fn get_table_for_date(
        &self,
        base: &CurrencyCode,
        date: NaiveDate,
        ctx: &RequestContext,
    ) -> FxResult<RateTable> {
        debug!(
            correlation_id = %ctx.correlation_id(),
            %base,
            %date,
            "Fetching historical exchange rates from Frankfurter"
        );
        Ok(self.fetch(&self.dated_url(base, date), ctx).await?.into_table())
    }

    fn circuit_state(&self) -> Option<CircuitState> {
        Some(self.transport.circuit().state())
    }

    fn metrics(&self) -> Option<MetricsSnapshot> {
        Some(self.transport.metrics().snapshot())
    }
}
