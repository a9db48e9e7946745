//! SQLite store for instruments and their monthly aggregates.
//!
//! Re-running a load is idempotent: aggregates are keyed by
//! (instrument, year, month) and an upsert replaces every value column and
//! refreshes `updated_at`.

use crate::domain::MonthlyAggregate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("create database directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("aggregate for '{found}' passed to upsert for '{expected}'")]
    InstrumentMismatch { expected: String, found: String },
}

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS instruments (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    tier INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS monthly_prices (
    instrument TEXT NOT NULL REFERENCES instruments(id),
    year INTEGER NOT NULL,
    month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
    open_first REAL,
    high_max REAL,
    low_min REAL,
    close_max REAL,
    close_last REAL,
    volume_total INTEGER NOT NULL,
    trading_days INTEGER NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (instrument, year, month)
);
"#;

/// Registered instrument row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentRecord {
    pub id: String,
    pub name: String,
    /// 0 marks an ad-hoc benchmark outside the universe tiers.
    pub tier: u8,
}

pub struct MonthlyStore {
    conn: Connection,
}

impl MonthlyStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        tracing::debug!(path = %path.display(), "monthly store opened");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Insert or retier an instrument. An existing name is kept.
    pub fn upsert_instrument(&self, id: &str, name: &str, tier: u8) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO instruments (id, name, tier) VALUES (?1, ?2, ?3)
             ON CONFLICT (id) DO UPDATE SET tier = excluded.tier",
            params![id, name, tier],
        )?;
        Ok(())
    }

    pub fn instrument(&self, id: &str) -> Result<Option<InstrumentRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                "SELECT id, name, tier FROM instruments WHERE id = ?1",
                params![id],
                |row| {
                    Ok(InstrumentRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        tier: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Upsert all aggregates of one instrument in a single transaction.
    ///
    /// The instrument row is created (tier 0) if it does not exist yet.
    /// Returns the number of rows written.
    pub fn upsert_aggregates(
        &mut self,
        instrument: &str,
        aggregates: &[MonthlyAggregate],
    ) -> Result<usize, StoreError> {
        if let Some(stray) = aggregates.iter().find(|a| a.instrument != instrument) {
            return Err(StoreError::InstrumentMismatch {
                expected: instrument.to_string(),
                found: stray.instrument.clone(),
            });
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO instruments (id, name, tier) VALUES (?1, ?1, 0)
             ON CONFLICT (id) DO NOTHING",
            params![instrument],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO monthly_prices (
                    instrument, year, month, open_first, high_max, low_min,
                    close_max, close_last, volume_total, trading_days
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT (instrument, year, month) DO UPDATE SET
                    open_first = excluded.open_first,
                    high_max = excluded.high_max,
                    low_min = excluded.low_min,
                    close_max = excluded.close_max,
                    close_last = excluded.close_last,
                    volume_total = excluded.volume_total,
                    trading_days = excluded.trading_days,
                    updated_at = datetime('now')",
            )?;
            for a in aggregates {
                stmt.execute(params![
                    instrument,
                    a.year,
                    a.month,
                    a.open_first,
                    a.high_max,
                    a.low_min,
                    a.close_max,
                    a.close_last,
                    i64::try_from(a.volume_total).unwrap_or(i64::MAX),
                    a.trading_days,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(instrument, rows = aggregates.len(), "monthly aggregates upserted");
        Ok(aggregates.len())
    }

    /// Stored aggregates for an instrument, ordered by period.
    pub fn load_instrument(&self, instrument: &str) -> Result<Vec<MonthlyAggregate>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT year, month, open_first, high_max, low_min, close_max, close_last,
                    volume_total, trading_days
             FROM monthly_prices WHERE instrument = ?1
             ORDER BY year, month",
        )?;
        let rows = stmt.query_map(params![instrument], |row| {
            let volume: i64 = row.get(7)?;
            Ok(MonthlyAggregate {
                instrument: instrument.to_string(),
                year: row.get(0)?,
                month: row.get(1)?,
                open_first: row.get(2)?,
                high_max: row.get(3)?,
                low_min: row.get(4)?,
                close_max: row.get(5)?,
                close_last: row.get(6)?,
                volume_total: u64::try_from(volume).unwrap_or(0),
                trading_days: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM monthly_prices", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn count_instruments_in_tier(&self, tier: u8) -> Result<usize, StoreError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM instruments WHERE tier = ?1",
            params![tier],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}
