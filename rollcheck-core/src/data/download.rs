//! Download orchestrator: fetches instruments one by one, cleans the bars,
//! and writes them to the cache, reporting progress as it goes.

use super::cache::{CoverageResult, ParquetCache};
use super::provider::{DataError, DataProvider, DownloadProgress};
use crate::domain::DailyBar;
use chrono::NaiveDate;

/// Download and cache daily bars for each instrument.
///
/// Instruments whose cache already covers `[start, end]` are skipped unless
/// `force` is set. Once the provider reports itself unavailable the remaining
/// instruments are marked failed without being requested.
pub fn download_instruments(
    provider: &dyn DataProvider,
    cache: &ParquetCache,
    instruments: &[&str],
    start: NaiveDate,
    end: NaiveDate,
    force: bool,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = instruments.len();
    let mut summary = DownloadSummary {
        total,
        ..DownloadSummary::default()
    };

    for (i, instrument) in instruments.iter().enumerate() {
        progress.on_start(instrument, i, total);

        if !force && cache.covers_range(instrument, start, end) == CoverageResult::FullyCovered {
            let cached = cache.get_meta(instrument).map_or(0, |m| m.bar_count);
            progress.on_complete(instrument, i, total, &Ok(cached));
            summary.succeeded += 1;
            summary.skipped += 1;
            continue;
        }

        let result = download_single(provider, cache, instrument, start, end);
        progress.on_complete(instrument, i, total, &result);

        match result {
            Ok(_) => summary.succeeded += 1,
            Err(e) => {
                summary.errors.push((instrument.to_string(), e));
                summary.failed += 1;
            }
        }

        if !provider.is_available() {
            for rest in &instruments[(i + 1)..] {
                summary
                    .errors
                    .push((rest.to_string(), DataError::CircuitBreakerTripped));
                summary.failed += 1;
            }
            break;
        }
    }

    progress.on_batch_complete(summary.succeeded, summary.failed, total);
    summary
}

fn download_single(
    provider: &dyn DataProvider,
    cache: &ParquetCache,
    instrument: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<usize, DataError> {
    let fetched = provider.fetch(instrument, start, end)?;
    let bars = clean_bars(instrument, fetched.bars);
    if !bars.iter().any(DailyBar::has_any_price) {
        return Err(DataError::InstrumentNotFound {
            instrument: instrument.to_string(),
        });
    }
    cache.write(instrument, &bars, fetched.source)?;
    Ok(bars.len())
}

/// Sort by date and keep the last bar for a repeated date. Insane bars are
/// kept but logged. Priceless bars are kept too; `rollup` drops and counts them.
pub fn clean_bars(instrument: &str, mut bars: Vec<DailyBar>) -> Vec<DailyBar> {
    bars.sort_by_key(|b| b.date);

    let before = bars.len();
    let mut deduped: Vec<DailyBar> = Vec::with_capacity(before);
    for bar in bars {
        match deduped.last_mut() {
            Some(prev) if prev.date == bar.date => *prev = bar,
            _ => deduped.push(bar),
        }
    }
    if deduped.len() < before {
        tracing::debug!(instrument, duplicates = before - deduped.len(), "duplicate dates collapsed");
    }

    let insane = deduped.iter().filter(|b| !b.is_sane()).count();
    if insane > 0 {
        tracing::warn!(instrument, insane, "bars with non-positive prices or high < low");
    }
    deduped
}

#[derive(Debug, Default)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    /// Subset of `succeeded` served from an already covering cache.
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
