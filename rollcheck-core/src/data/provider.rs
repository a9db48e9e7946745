//! Data provider trait and structured error types.
//!
//! `DataProvider` abstracts the daily-bar source so the Yahoo client can be
//! swapped for a fixture provider in tests. Providers return split-adjusted
//! prices; retries, pacing and circuit breaking are their responsibility.

use crate::domain::DailyBar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("instrument not found: {instrument}")]
    InstrumentNotFound { instrument: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no cached data for '{instrument}'; run `fetch {instrument}` first")]
    NoCachedData { instrument: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Bars fetched for a single instrument.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub instrument: String,
    pub bars: Vec<DailyBar>,
    pub source: DataSource,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    Cache,
    Fixture,
}

pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for an instrument over an inclusive date range.
    fn fetch(
        &self,
        instrument: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError>;

    /// False while the provider refuses requests (rate limit, ban).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-instrument downloads.
pub trait DownloadProgress: Send {
    fn on_start(&self, instrument: &str, index: usize, total: usize);

    fn on_complete(
        &self,
        instrument: &str,
        index: usize,
        total: usize,
        result: &Result<usize, DataError>,
    );

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that logs through `tracing`.
pub struct LogProgress;

impl DownloadProgress for LogProgress {
    fn on_start(&self, instrument: &str, index: usize, total: usize) {
        tracing::info!("[{}/{}] fetching {instrument}", index + 1, total);
    }

    fn on_complete(
        &self,
        instrument: &str,
        _index: usize,
        _total: usize,
        result: &Result<usize, DataError>,
    ) {
        match result {
            Ok(bars) => tracing::info!(bars, "  ok: {instrument}"),
            Err(e) => tracing::warn!("  failed: {instrument}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!("download complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// In-memory provider serving prepared bars, filtered to the requested range.
#[derive(Debug, Default)]
pub struct FixtureProvider {
    bars: std::collections::HashMap<String, Vec<DailyBar>>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, instrument: &str, bars: Vec<DailyBar>) -> Self {
        self.bars.insert(instrument.to_string(), bars);
        self
    }
}

impl DataProvider for FixtureProvider {
    fn name(&self) -> &str {
        "fixture"
    }

    fn fetch(
        &self,
        instrument: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let bars: Vec<DailyBar> = self
            .bars
            .get(instrument)
            .ok_or_else(|| DataError::InstrumentNotFound {
                instrument: instrument.to_string(),
            })?
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .cloned()
            .collect();
        Ok(FetchResult {
            instrument: instrument.to_string(),
            bars,
            source: DataSource::Fixture,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}
