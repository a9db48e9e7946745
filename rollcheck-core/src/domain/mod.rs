//! Domain types for rollcheck

pub mod bar;
pub mod monthly;

pub use bar::DailyBar;
pub use monthly::{MonthlyAggregate, Period};

/// Instrument identifier (ticker symbol).
pub type InstrumentId = String;
