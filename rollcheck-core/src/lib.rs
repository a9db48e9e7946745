//! rollcheck core: monthly OHLCV rollups and their reconciliation against
//! reference spreadsheets.
//!
//! - Domain types (daily bars, monthly aggregates, periods)
//! - Rollup engine folding daily bars into calendar-month aggregates
//! - Reference-series loading and first-section extraction
//! - Tolerance-based reconciliation with PASS / FAIL / NO_OVERLAP verdicts
//! - Market-data providers, Parquet bar cache, SQLite monthly store

pub mod data;
pub mod domain;
pub mod reconcile;
pub mod reference;
pub mod rollup;
pub mod store;
