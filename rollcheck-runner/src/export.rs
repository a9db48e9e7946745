//! CSV artefacts: the daily bar dump and the monthly aggregate table.
//!
//! The monthly file uses the column names downstream sheets expect:
//! `ticker, year, month, open_first, high_max, low_min, close_max,
//! close_last, volume_total, trading_days`. Missing prices are empty cells.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rollcheck_core::domain::{DailyBar, MonthlyAggregate};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct DailyRow {
    ticker: String,
    date: NaiveDate,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct MonthlyRow {
    ticker: String,
    year: i32,
    month: u32,
    open_first: Option<f64>,
    high_max: Option<f64>,
    low_min: Option<f64>,
    close_max: Option<f64>,
    close_last: Option<f64>,
    volume_total: u64,
    trading_days: u32,
}

impl From<&MonthlyAggregate> for MonthlyRow {
    fn from(a: &MonthlyAggregate) -> Self {
        Self {
            ticker: a.instrument.clone(),
            year: a.year,
            month: a.month,
            open_first: a.open_first,
            high_max: a.high_max,
            low_min: a.low_min,
            close_max: a.close_max,
            close_last: a.close_last,
            volume_total: a.volume_total,
            trading_days: a.trading_days,
        }
    }
}

impl From<MonthlyRow> for MonthlyAggregate {
    fn from(r: MonthlyRow) -> Self {
        Self {
            instrument: r.ticker,
            year: r.year,
            month: r.month,
            open_first: r.open_first,
            high_max: r.high_max,
            low_min: r.low_min,
            close_max: r.close_max,
            close_last: r.close_last,
            volume_total: r.volume_total,
            trading_days: r.trading_days,
        }
    }
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Write daily bars, one row per instrument-day, in the order given.
pub fn write_daily_csv<'a>(
    path: &Path,
    bars: impl IntoIterator<Item = &'a DailyBar>,
) -> Result<usize> {
    create_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut rows = 0;
    for b in bars {
        wtr.serialize(DailyRow {
            ticker: b.instrument.clone(),
            date: b.date,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            volume: b.volume,
        })?;
        rows += 1;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(rows)
}

pub fn write_monthly_csv(path: &Path, aggregates: &[MonthlyAggregate]) -> Result<usize> {
    create_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for a in aggregates {
        wtr.serialize(MonthlyRow::from(a))?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(aggregates.len())
}

pub fn read_monthly_csv(path: &Path) -> Result<Vec<MonthlyAggregate>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    rdr.deserialize::<MonthlyRow>()
        .enumerate()
        .map(|(i, row)| {
            row.map(MonthlyAggregate::from)
                .with_context(|| format!("{}: bad row {}", path.display(), i + 2))
        })
        .collect()
}
