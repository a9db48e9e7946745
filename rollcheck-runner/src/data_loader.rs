//! Bar loading for the runner.
//!
//! Resolution order per instrument:
//! 1. Cached bars (unless `force`)
//! 2. Provider download, written back to the cache (unless `offline`)
//! 3. Otherwise a `LoadError` naming the instrument, or with `skip_missing`
//!    a warning and an entry in `LoadedData::missing`

use chrono::NaiveDate;
use rollcheck_core::data::{
    clean_bars, DataError, DataProvider, DataSource, DownloadProgress, ParquetCache,
};
use rollcheck_core::domain::DailyBar;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no cached data for '{instrument}' and running offline (run `rollcheck fetch {instrument}`)")]
    NoCachedDataOffline { instrument: String },

    #[error("no cached data for '{instrument}' and download failed: {reason}")]
    DownloadFailed { instrument: String, reason: String },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Never make network requests.
    pub offline: bool,
    /// Re-download even if cached.
    pub force: bool,
    /// Record instruments that cannot be loaded instead of failing.
    pub skip_missing: bool,
}

#[derive(Debug)]
pub struct LoadedData {
    /// Bars per instrument, restricted to the requested range.
    pub bars: BTreeMap<String, Vec<DailyBar>>,
    pub sources: BTreeMap<String, DataSource>,
    /// Instruments skipped under `skip_missing`, in request order.
    pub missing: Vec<String>,
    /// BLAKE3 over every loaded bar, in instrument order.
    pub dataset_hash: String,
}

impl LoadedData {
    pub fn bar_count(&self) -> usize {
        self.bars.values().map(Vec::len).sum()
    }
}

pub fn load_bars(
    instruments: &[&str],
    cache: &ParquetCache,
    provider: Option<&dyn DataProvider>,
    progress: Option<&dyn DownloadProgress>,
    opts: &LoadOptions,
) -> Result<LoadedData, LoadError> {
    let total = instruments.len();
    let mut bars = BTreeMap::new();
    let mut sources = BTreeMap::new();
    let mut missing = Vec::new();

    for (i, instrument) in instruments.iter().enumerate() {
        if let Some(p) = progress {
            p.on_start(instrument, i, total);
        }

        if !opts.force {
            if let Ok(cached) = cache.load_range(instrument, opts.start, opts.end) {
                if let Some(p) = progress {
                    p.on_complete(instrument, i, total, &Ok(cached.len()));
                }
                bars.insert(instrument.to_string(), cached);
                sources.insert(instrument.to_string(), DataSource::Cache);
                continue;
            }
        }

        let prov = match provider.filter(|p| p.is_available()) {
            Some(p) if !opts.offline => p,
            _ => {
                let err = if opts.offline {
                    LoadError::NoCachedDataOffline {
                        instrument: instrument.to_string(),
                    }
                } else {
                    LoadError::DownloadFailed {
                        instrument: instrument.to_string(),
                        reason: "no data provider available".into(),
                    }
                };
                if opts.skip_missing {
                    tracing::warn!(%instrument, "skipped: {err}");
                    missing.push(instrument.to_string());
                    continue;
                }
                return Err(err);
            }
        };

        match prov.fetch(instrument, opts.start, opts.end) {
            Ok(fetched) => {
                let cleaned = clean_bars(instrument, fetched.bars);
                if !cleaned.is_empty() {
                    cache.write(instrument, &cleaned, fetched.source)?;
                }
                if let Some(p) = progress {
                    p.on_complete(instrument, i, total, &Ok(cleaned.len()));
                }
                bars.insert(instrument.to_string(), cleaned);
                sources.insert(instrument.to_string(), fetched.source);
            }
            Err(e) => {
                let reason = e.to_string();
                if let Some(p) = progress {
                    p.on_complete(instrument, i, total, &Err(e));
                }
                if opts.skip_missing {
                    tracing::warn!(%instrument, "skipped: download failed: {reason}");
                    missing.push(instrument.to_string());
                    continue;
                }
                return Err(LoadError::DownloadFailed {
                    instrument: instrument.to_string(),
                    reason,
                });
            }
        }
    }

    if let Some(p) = progress {
        p.on_batch_complete(sources.len(), total - sources.len(), total);
    }

    let dataset_hash = compute_dataset_hash(&bars);
    Ok(LoadedData {
        bars,
        sources,
        missing,
        dataset_hash,
    })
}

fn compute_dataset_hash(bars: &BTreeMap<String, Vec<DailyBar>>) -> String {
    let price_bytes = |v: Option<f64>| v.map_or([0xff; 8], f64::to_le_bytes);
    let mut hasher = blake3::Hasher::new();
    for (instrument, series) in bars {
        hasher.update(instrument.as_bytes());
        for bar in series {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&price_bytes(bar.open));
            hasher.update(&price_bytes(bar.high));
            hasher.update(&price_bytes(bar.low));
            hasher.update(&price_bytes(bar.close));
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
