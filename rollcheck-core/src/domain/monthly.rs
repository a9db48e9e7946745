//! Monthly aggregate records and the (year, month) period key.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar month. Ordered by year then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Monthly summary of one instrument's daily bars.
///
/// Derived data: a pure function of the bars for (instrument, year, month).
/// A price field is `None` only when no contributing bar had that column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub instrument: String,
    pub year: i32,
    pub month: u32,
    pub open_first: Option<f64>,
    pub high_max: Option<f64>,
    pub low_min: Option<f64>,
    pub close_max: Option<f64>,
    pub close_last: Option<f64>,
    pub volume_total: u64,
    pub trading_days: u32,
}

impl MonthlyAggregate {
    pub fn period(&self) -> Period {
        Period::new(self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_orders_by_year_then_month() {
        let mut periods = vec![Period::new(2021, 1), Period::new(2020, 12), Period::new(2020, 2)];
        periods.sort();
        assert_eq!(
            periods,
            vec![Period::new(2020, 2), Period::new(2020, 12), Period::new(2021, 1)]
        );
    }

    #[test]
    fn period_display_is_zero_padded() {
        assert_eq!(Period::new(2020, 3).to_string(), "2020-03");
    }

    #[test]
    fn period_of_date() {
        let date = NaiveDate::from_ymd_opt(2019, 11, 30).unwrap();
        assert_eq!(Period::of(date), Period::new(2019, 11));
    }
}
