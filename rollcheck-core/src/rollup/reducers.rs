//! Per-column reducers for the monthly fold.
//!
//! Each output field of `MonthlyAggregate` is produced by exactly one reducer.
//! Reducers see the bars of a single month in ascending date order and skip
//! absent (`None`) values, so "first" and "last" mean first/last *present* value.

use crate::domain::DailyBar;

/// A single-column reduction over one month of bars.
pub trait Reducer {
    type Output;

    /// Feed the next bar (ascending date order).
    fn push(&mut self, bar: &DailyBar);

    /// Final value for the month.
    fn finish(self) -> Self::Output;
}

/// `open_first`: open of the chronologically first bar.
#[derive(Debug, Default)]
pub struct FirstOpen(Option<f64>);

impl Reducer for FirstOpen {
    type Output = Option<f64>;

    fn push(&mut self, bar: &DailyBar) {
        if self.0.is_none() {
            self.0 = bar.open;
        }
    }

    fn finish(self) -> Option<f64> {
        self.0
    }
}

/// `high_max`: maximum high.
#[derive(Debug, Default)]
pub struct MaxHigh(Option<f64>);

impl Reducer for MaxHigh {
    type Output = Option<f64>;

    fn push(&mut self, bar: &DailyBar) {
        self.0 = fold_max(self.0, bar.high);
    }

    fn finish(self) -> Option<f64> {
        self.0
    }
}

/// `low_min`: minimum low.
#[derive(Debug, Default)]
pub struct MinLow(Option<f64>);

impl Reducer for MinLow {
    type Output = Option<f64>;

    fn push(&mut self, bar: &DailyBar) {
        self.0 = match (self.0, bar.low) {
            (Some(acc), Some(v)) => Some(acc.min(v)),
            (acc, v) => acc.or(v),
        };
    }

    fn finish(self) -> Option<f64> {
        self.0
    }
}

/// `close_max`: maximum close. This is the column reconciled against references.
#[derive(Debug, Default)]
pub struct MaxClose(Option<f64>);

impl Reducer for MaxClose {
    type Output = Option<f64>;

    fn push(&mut self, bar: &DailyBar) {
        self.0 = fold_max(self.0, bar.close);
    }

    fn finish(self) -> Option<f64> {
        self.0
    }
}

/// `close_last`: close of the chronologically last bar.
#[derive(Debug, Default)]
pub struct LastClose(Option<f64>);

impl Reducer for LastClose {
    type Output = Option<f64>;

    fn push(&mut self, bar: &DailyBar) {
        if bar.close.is_some() {
            self.0 = bar.close;
        }
    }

    fn finish(self) -> Option<f64> {
        self.0
    }
}

/// `volume_total`: sum of volume (saturating).
#[derive(Debug, Default)]
pub struct SumVolume(u64);

impl Reducer for SumVolume {
    type Output = u64;

    fn push(&mut self, bar: &DailyBar) {
        self.0 = self.0.saturating_add(bar.volume);
    }

    fn finish(self) -> u64 {
        self.0
    }
}

/// `trading_days`: number of contributing bars.
#[derive(Debug, Default)]
pub struct CountBars(u32);

impl Reducer for CountBars {
    type Output = u32;

    fn push(&mut self, _bar: &DailyBar) {
        self.0 += 1;
    }

    fn finish(self) -> u32 {
        self.0
    }
}

fn fold_max(acc: Option<f64>, value: Option<f64>) -> Option<f64> {
    match (acc, value) {
        (Some(a), Some(v)) => Some(a.max(v)),
        (a, v) => a.or(v),
    }
}
