//! Daily-bar cache on Parquet with Hive-style partitioning.
//!
//! Layout: `{cache_dir}/instrument={ID}/{year}.parquet` plus a `meta.json`
//! sidecar per instrument. Price columns are nullable so provider gaps
//! survive the round trip.
//!
//! Writes go to `.tmp` and are renamed into place. Files that fail to load
//! are renamed to `{file}.quarantined` and skipped.

use super::provider::{DataError, DataSource};
use crate::domain::DailyBar;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub instrument: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    /// BLAKE3 of the JSON-serialised bars.
    pub data_hash: String,
    pub source: DataSource,
    pub cached_at: chrono::NaiveDateTime,
}

pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn instrument_dir(&self, instrument: &str) -> PathBuf {
        self.cache_dir.join(format!("instrument={instrument}"))
    }

    fn year_path(&self, instrument: &str, year: i32) -> PathBuf {
        self.instrument_dir(instrument).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, instrument: &str) -> PathBuf {
        self.instrument_dir(instrument).join("meta.json")
    }

    /// Replace the cached bars for an instrument.
    ///
    /// Bars for other instruments are rejected. Year files from an earlier
    /// write that the new bars do not cover are removed.
    pub fn write(
        &self,
        instrument: &str,
        bars: &[DailyBar],
        source: DataSource,
    ) -> Result<(), DataError> {
        if let Some(stray) = bars.iter().find(|b| b.instrument != instrument) {
            return Err(DataError::CacheError(format!(
                "bar for '{}' passed to cache write for '{instrument}'",
                stray.instrument
            )));
        }

        let mut sorted: Vec<&DailyBar> = bars.iter().collect();
        sorted.sort_by_key(|b| b.date);
        let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
            return Err(DataError::CacheError("no bars to cache".into()));
        };
        let (start_date, end_date) = (first.date, last.date);

        let dir = self.instrument_dir(instrument);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut by_year: BTreeMap<i32, Vec<&DailyBar>> = BTreeMap::new();
        for bar in &sorted {
            by_year.entry(bar.date.year()).or_default().push(bar);
        }

        for (year, year_bars) in &by_year {
            let mut df = bars_to_dataframe(year_bars)?;
            let path = self.year_path(instrument, *year);
            let tmp_path = path.with_extension("parquet.tmp");

            write_parquet(&mut df, &tmp_path)?;
            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                DataError::CacheError(format!("atomic rename failed: {e}"))
            })?;
        }
        self.remove_stale_years(instrument, &by_year)?;

        let payload = serde_json::to_vec(&sorted)
            .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
        let meta = CacheMeta {
            instrument: instrument.to_string(),
            start_date,
            end_date,
            bar_count: sorted.len(),
            data_hash: blake3::hash(&payload).to_hex().to_string(),
            source,
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(instrument), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        tracing::debug!(instrument, bars = sorted.len(), years = by_year.len(), "cache written");
        Ok(())
    }

    fn remove_stale_years(
        &self,
        instrument: &str,
        written: &BTreeMap<i32, Vec<&DailyBar>>,
    ) -> Result<(), DataError> {
        let entries = fs::read_dir(self.instrument_dir(instrument))
            .map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }
            let year = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<i32>().ok());
            if year.is_some_and(|y| !written.contains_key(&y)) {
                fs::remove_file(&path)
                    .map_err(|e| DataError::CacheError(format!("remove stale year: {e}")))?;
            }
        }
        Ok(())
    }

    /// All cached bars for an instrument, sorted by date.
    pub fn load(&self, instrument: &str) -> Result<Vec<DailyBar>, DataError> {
        let dir = self.instrument_dir(instrument);
        if !dir.exists() {
            return Err(DataError::NoCachedData {
                instrument: instrument.to_string(),
            });
        }

        let entries =
            fs::read_dir(&dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        let mut all_bars = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let path = entry.path();

            // meta.json, .quarantined and stray .tmp files
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_parquet(instrument, &path) {
                Ok(bars) => all_bars.extend(bars),
                Err(e) => {
                    let quarantine = path.with_extension("parquet.quarantined");
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "quarantining corrupt cache file"
                    );
                    let _ = fs::rename(&path, &quarantine);
                }
            }
        }

        if all_bars.is_empty() {
            return Err(DataError::NoCachedData {
                instrument: instrument.to_string(),
            });
        }

        all_bars.sort_by_key(|b| b.date);
        Ok(all_bars)
    }

    /// Cached bars restricted to an inclusive date range.
    pub fn load_range(
        &self,
        instrument: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, DataError> {
        let mut bars = self.load(instrument)?;
        bars.retain(|b| b.date >= start && b.date <= end);
        Ok(bars)
    }

    pub fn get_meta(&self, instrument: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(instrument)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Instruments that have a cache directory, sorted.
    pub fn list_instruments(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .flatten()
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_prefix("instrument="))
                    .map(str::to_string)
            })
            .collect();
        ids.sort();
        ids
    }

    pub fn status(&self, instruments: &[&str]) -> Vec<CacheStatus> {
        instruments
            .iter()
            .map(|id| {
                let meta = self.get_meta(id);
                CacheStatus {
                    instrument: id.to_string(),
                    cached: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    bar_count: meta.as_ref().map(|m| m.bar_count),
                }
            })
            .collect()
    }

    pub fn covers_range(&self, instrument: &str, start: NaiveDate, end: NaiveDate) -> CoverageResult {
        match self.get_meta(instrument) {
            None => CoverageResult::NotCached,
            Some(meta) if meta.start_date <= start && meta.end_date >= end => {
                CoverageResult::FullyCovered
            }
            Some(meta) => CoverageResult::PartiallyCovered {
                cached_start: meta.start_date,
                cached_end: meta.end_date,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub instrument: String,
    pub cached: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bar_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn bars_to_dataframe(bars: &[&DailyBar]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch()).num_days() as i32)
        .collect();
    let opens: Vec<Option<f64>> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<Option<f64>> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<Option<f64>> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<Option<f64>> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(instrument: &str, path: &Path) -> Result<Vec<DailyBar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }
    for col_name in COLUMNS {
        if df.column(col_name).is_err() {
            return Err(DataError::ValidationError(format!(
                "missing column '{col_name}'"
            )));
        }
    }

    dataframe_to_bars(instrument, &df)
}

fn dataframe_to_bars(instrument: &str, df: &DataFrame) -> Result<Vec<DailyBar>, DataError> {
    let column = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::ParquetError(format!("column read: {e}")))
    };
    let price = |name: &str| -> Result<Float64Chunked, DataError> {
        column(name)?
            .f64()
            .cloned()
            .map_err(|e| DataError::ParquetError(format!("{name} column type: {e}")))
    };

    let date_ca = column("date")?
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
    let open_ca = price("open")?;
    let high_ca = price("high")?;
    let low_ca = price("low")?;
    let close_ca = price("close")?;
    let vol_ca = column("volume")?
        .u64()
        .map_err(|e| DataError::ParquetError(format!("volume column type: {e}")))?;

    let epoch = epoch();
    let n = df.height();
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;

        bars.push(DailyBar {
            instrument: instrument.to_string(),
            date: epoch + chrono::Duration::days(days as i64),
            open: open_ca.get(i),
            high: high_ca.get(i),
            low: low_ca.get(i),
            close: close_ca.get(i),
            volume: vol_ca.get(i).unwrap_or(0),
        });
    }

    Ok(bars)
}
