//! Day-by-day historical range fetching.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use ratebridge_common::{days_in_range, days_inclusive, CurrencyCode, HistoricalRateSeries};
use std::pin::pin;
use tracing::{debug, info, warn};

use crate::context::RequestContext;
use crate::error::{FxError, FxResult};
use crate::provider::RateSource;

/// Configuration for historical fetching.
#[derive(Debug, Clone)]
pub struct HistoricalFetchConfig {
    /// Day requests kept in flight at once. 1 fetches strictly in order.
    pub max_concurrent_days: usize,
    /// Longest range accepted, in days.
    pub max_range_days: usize,
}

impl Default for HistoricalFetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_days: 1,
            max_range_days: 366,
        }
    }
}

/// Assembles a [`HistoricalRateSeries`] from one request per calendar day.
#[derive(Debug, Clone, Default)]
pub struct HistoricalRangeFetcher {
    config: HistoricalFetchConfig,
}

impl HistoricalRangeFetcher {
    pub fn new(config: HistoricalFetchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HistoricalFetchConfig {
        &self.config
    }

    /// Fetch every day from `start` to `end` inclusive.
    ///
    /// A day that fails is logged and left out of the series. When the
    /// context is cancelled no further days are requested and the series
    /// collected so far is returned.
    pub async fn fetch<S: RateSource + ?Sized>(
        &self,
        source: &S,
        base: &CurrencyCode,
        start: NaiveDate,
        end: NaiveDate,
        ctx: &RequestContext,
    ) -> FxResult<HistoricalRateSeries> {
        if start > end {
            return Err(FxError::InvalidDateRange { start, end });
        }
        let total_days = days_in_range(start, end);
        if total_days > self.config.max_range_days {
            return Err(FxError::RangeTooLarge {
                days: total_days,
                max: self.config.max_range_days,
            });
        }

        let correlation_id = ctx.correlation_id();
        info!(
            %correlation_id,
            provider = source.name(),
            %base,
            %start,
            %end,
            days = total_days,
            "Fetching historical rates"
        );

        let mut series = HistoricalRateSeries::new(base.clone(), start, end);
        let mut failed_days = 0usize;

        let mut days = pin!(stream::iter(days_inclusive(start, end))
            .map(move |day| async move { (day, source.get_table_for_date(base, day, ctx).await) })
            .buffered(self.config.max_concurrent_days.max(1)));

        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => {
                    info!(
                        %correlation_id,
                        provider = source.name(),
                        fetched = series.len(),
                        "Historical fetch cancelled, returning partial series"
                    );
                    return Ok(series);
                }
                next = days.next() => next,
            };

            match next {
                Some((day, Ok(table))) => {
                    debug!(%correlation_id, %day, quotes = table.len(), "Fetched historical day");
                    series.insert(day, table);
                }
                Some((day, Err(FxError::Cancelled))) => {
                    debug!(%correlation_id, %day, "Day fetch cancelled");
                }
                Some((day, Err(e))) => {
                    failed_days += 1;
                    warn!(
                        %correlation_id,
                        provider = source.name(),
                        %day,
                        error = %e,
                        "Skipping day after failed fetch"
                    );
                }
                None => break,
            }
        }

        info!(
            %correlation_id,
            provider = source.name(),
            fetched = series.len(),
            failed = failed_days,
            "Historical fetch complete"
        );
        Ok(series)
    }
}
