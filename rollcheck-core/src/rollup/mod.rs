//! Monthly rollup engine.
//!
//! Groups daily bars by (instrument, year, month) and reduces each group with
//! [`MonthFold`], one named reducer per output column. The engine is pure:
//! the same bars always produce the same aggregates, in (instrument, period)
//! order.
//!
//! Bars with no price at all are dropped before grouping and reported through
//! [`RollupOutput::dropped_bars`]; this is a warning, never an error.

pub mod reducers;

use crate::domain::{DailyBar, MonthlyAggregate, Period};
use reducers::{CountBars, FirstOpen, LastClose, MaxClose, MaxHigh, MinLow, Reducer, SumVolume};
use std::collections::BTreeMap;

/// Result of one rollup pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollupOutput {
    pub aggregates: Vec<MonthlyAggregate>,
    /// Bars discarded because every price column was null.
    pub dropped_bars: usize,
}

/// The seven column reducers for one (instrument, month) group.
#[derive(Debug, Default)]
pub struct MonthFold {
    open_first: FirstOpen,
    high_max: MaxHigh,
    low_min: MinLow,
    close_max: MaxClose,
    close_last: LastClose,
    volume_total: SumVolume,
    trading_days: CountBars,
}

impl MonthFold {
    pub fn push(&mut self, bar: &DailyBar) {
        self.open_first.push(bar);
        self.high_max.push(bar);
        self.low_min.push(bar);
        self.close_max.push(bar);
        self.close_last.push(bar);
        self.volume_total.push(bar);
        self.trading_days.push(bar);
    }

    pub fn finish(self, instrument: &str, period: Period) -> MonthlyAggregate {
        MonthlyAggregate {
            instrument: instrument.to_string(),
            year: period.year,
            month: period.month,
            open_first: self.open_first.finish(),
            high_max: self.high_max.finish(),
            low_min: self.low_min.finish(),
            close_max: self.close_max.finish(),
            close_last: self.close_last.finish(),
            volume_total: self.volume_total.finish(),
            trading_days: self.trading_days.finish(),
        }
    }
}

/// Roll daily bars up into monthly aggregates.
///
/// Input order does not matter: bars are stably sorted by (instrument, date)
/// before reduction so first/last semantics hold for unsorted batches too.
pub fn rollup(bars: &[DailyBar]) -> RollupOutput {
    let mut ordered: Vec<&DailyBar> = Vec::with_capacity(bars.len());
    let mut dropped_bars = 0;
    for bar in bars {
        if bar.has_any_price() {
            ordered.push(bar);
        } else {
            dropped_bars += 1;
        }
    }
    ordered.sort_by(|a, b| a.instrument.cmp(&b.instrument).then(a.date.cmp(&b.date)));

    let mut groups: BTreeMap<(&str, Period), MonthFold> = BTreeMap::new();
    for bar in ordered {
        groups
            .entry((bar.instrument.as_str(), Period::of(bar.date)))
            .or_default()
            .push(bar);
    }

    let aggregates: Vec<MonthlyAggregate> = groups
        .into_iter()
        .map(|((instrument, period), fold)| fold.finish(instrument, period))
        .collect();

    if dropped_bars > 0 {
        tracing::warn!(dropped_bars, "dropped bars with no price fields");
    }

    RollupOutput {
        aggregates,
        dropped_bars,
    }
}

/// Roll up only the bars belonging to `instrument`.
pub fn rollup_instrument(instrument: &str, bars: &[DailyBar]) -> RollupOutput {
    let own: Vec<DailyBar> = bars
        .iter()
        .filter(|b| b.instrument == instrument)
        .cloned()
        .collect();
    rollup(&own)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(instrument: &str, y: i32, m: u32, d: u32, close: f64) -> DailyBar {
        DailyBar::new(
            instrument,
            NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            close - 0.5,
            close + 1.0,
            close - 1.0,
            close,
            1_000,
        )
    }

    #[test]
    fn january_2020_scenario() {
        let bars: Vec<DailyBar> = [(2, 10.0), (3, 12.0), (6, 9.0), (7, 15.0)]
            .iter()
            .map(|&(d, c)| bar("AAPL", 2020, 1, d, c))
            .collect();

        let out = rollup(&bars);
        assert_eq!(out.aggregates.len(), 1);
        let jan = &out.aggregates[0];
        assert_eq!((jan.year, jan.month), (2020, 1));
        assert_eq!(jan.close_max, Some(15.0));
        assert_eq!(jan.close_last, Some(15.0));
        assert_eq!(jan.open_first, Some(9.5));
        assert_eq!(jan.high_max, Some(16.0));
        assert_eq!(jan.low_min, Some(8.0));
        assert_eq!(jan.volume_total, 4_000);
        assert_eq!(jan.trading_days, 4);
    }

    #[test]
    fn empty_input_yields_no_aggregates() {
        let out = rollup(&[]);
        assert!(out.aggregates.is_empty());
        assert_eq!(out.dropped_bars, 0);
    }

    #[test]
    fn unsorted_input_is_sorted_before_reduction() {
        let bars = vec![
            bar("AAPL", 2020, 1, 31, 20.0),
            bar("AAPL", 2020, 1, 2, 10.0),
            bar("AAPL", 2020, 1, 15, 30.0),
        ];
        let out = rollup(&bars);
        let jan = &out.aggregates[0];
        assert_eq!(jan.open_first, Some(9.5));
        assert_eq!(jan.close_last, Some(20.0));
        assert_eq!(jan.close_max, Some(30.0));
    }

    #[test]
    fn groups_by_instrument_and_month() {
        let bars = vec![
            bar("MSFT", 2020, 2, 3, 50.0),
            bar("AAPL", 2020, 1, 2, 10.0),
            bar("AAPL", 2020, 2, 3, 11.0),
            bar("AAPL", 2021, 1, 4, 12.0),
        ];
        let out = rollup(&bars);
        let keys: Vec<(&str, i32, u32)> = out
            .aggregates
            .iter()
            .map(|a| (a.instrument.as_str(), a.year, a.month))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("AAPL", 2020, 1),
                ("AAPL", 2020, 2),
                ("AAPL", 2021, 1),
                ("MSFT", 2020, 2),
            ]
        );
    }

    #[test]
    fn null_close_still_counts_as_trading_day() {
        let mut no_close = bar("AAPL", 2020, 1, 3, 99.0);
        no_close.close = None;
        let bars = vec![bar("AAPL", 2020, 1, 2, 10.0), no_close];

        let out = rollup(&bars);
        let jan = &out.aggregates[0];
        assert_eq!(jan.trading_days, 2);
        assert_eq!(jan.close_max, Some(10.0));
        assert_eq!(jan.close_last, Some(10.0));
        assert_eq!(out.dropped_bars, 0);
    }

    #[test]
    fn priceless_bar_is_dropped_and_counted() {
        let mut empty = bar("AAPL", 2020, 1, 3, 1.0);
        empty.open = None;
        empty.high = None;
        empty.low = None;
        empty.close = None;
        let bars = vec![bar("AAPL", 2020, 1, 2, 10.0), empty];

        let out = rollup(&bars);
        assert_eq!(out.dropped_bars, 1);
        assert_eq!(out.aggregates[0].trading_days, 1);
    }

    #[test]
    fn month_of_only_priceless_bars_produces_nothing() {
        let mut empty = bar("AAPL", 2020, 3, 2, 1.0);
        empty.open = None;
        empty.high = None;
        empty.low = None;
        empty.close = None;
        let out = rollup(&[empty]);
        assert!(out.aggregates.is_empty());
        assert_eq!(out.dropped_bars, 1);
    }

    #[test]
    fn rollup_instrument_filters_mixed_batch() {
        let bars = vec![bar("AAPL", 2020, 1, 2, 10.0), bar("MSFT", 2020, 1, 2, 50.0)];
        let out = rollup_instrument("MSFT", &bars);
        assert_eq!(out.aggregates.len(), 1);
        assert_eq!(out.aggregates[0].instrument, "MSFT");
        assert_eq!(out.aggregates[0].close_max, Some(50.0));
    }

    #[test]
    fn rerun_is_identical() {
        let bars: Vec<DailyBar> = (1..=28).map(|d| bar("AAPL", 2020, 2, d, 100.0 + d as f64)).collect();
        assert_eq!(rollup(&bars), rollup(&bars));
    }
}
