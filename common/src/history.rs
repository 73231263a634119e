//! Historical rate series and pagination.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{CurrencyCode, RateTable};

/// Daily rate tables for an inclusive date range, ordered by date.
///
/// Days that could not be fetched are absent rather than zero-filled, so
/// `len()` may be smaller than the number of days in the range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalRateSeries {
    /// Base currency of every table in the series.
    pub base: CurrencyCode,
    /// First requested day (inclusive).
    pub start: NaiveDate,
    /// Last requested day (inclusive).
    pub end: NaiveDate,
    entries: BTreeMap<NaiveDate, RateTable>,
}

impl HistoricalRateSeries {
    /// Create an empty series for a range.
    pub fn new(base: CurrencyCode, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            base,
            start,
            end,
            entries: BTreeMap::new(),
        }
    }

    /// Record the table for one day.
    pub fn insert(&mut self, date: NaiveDate, table: RateTable) {
        self.entries.insert(date, table);
    }

    pub fn get(&self, date: &NaiveDate) -> Option<&RateTable> {
        self.entries.get(date)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dates present in the series, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.entries.keys().copied()
    }

    /// Entries in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &RateTable)> {
        self.entries.iter()
    }

    /// Slice out one page. `page` is 1-based.
    pub fn paginate(&self, page: usize, page_size: usize) -> HistoricalPage {
        let skip = page.saturating_sub(1).saturating_mul(page_size);
        let data = self
            .entries
            .iter()
            .skip(skip)
            .take(page_size)
            .map(|(date, table)| (*date, table.clone()))
            .collect();

        HistoricalPage {
            total_count: self.entries.len(),
            page,
            page_size,
            data,
        }
    }
}

/// One page of a historical series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalPage {
    /// Number of entries in the unpaginated series.
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
    pub data: BTreeMap<NaiveDate, RateTable>,
}
