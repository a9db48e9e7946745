//! Parallel monthly rollup over many instruments.

use rayon::prelude::*;
use rollcheck_core::domain::{DailyBar, MonthlyAggregate};
use rollcheck_core::rollup::rollup_instrument;
use std::collections::BTreeMap;

/// Aggregates for every instrument of a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollupBatch {
    pub monthly: BTreeMap<String, Vec<MonthlyAggregate>>,
    /// Bars dropped for carrying no price or sitting under the wrong
    /// instrument, summed over instruments.
    pub dropped_bars: usize,
}

impl RollupBatch {
    pub fn instrument_count(&self) -> usize {
        self.monthly.len()
    }

    pub fn aggregate_count(&self) -> usize {
        self.monthly.values().map(Vec::len).sum()
    }

    /// Every aggregate in (instrument, period) order.
    pub fn all_aggregates(&self) -> Vec<MonthlyAggregate> {
        self.monthly.values().flatten().cloned().collect()
    }

    /// Regroup a flat list (e.g. read back from CSV) by instrument.
    pub fn from_aggregates(aggregates: Vec<MonthlyAggregate>) -> Self {
        let mut monthly: BTreeMap<String, Vec<MonthlyAggregate>> = BTreeMap::new();
        for a in aggregates {
            monthly.entry(a.instrument.clone()).or_default().push(a);
        }
        for series in monthly.values_mut() {
            series.sort_by_key(MonthlyAggregate::period);
        }
        Self {
            monthly,
            dropped_bars: 0,
        }
    }
}

/// Roll up each instrument's bars on the rayon pool.
///
/// Bars whose `instrument` field does not match their map key are excluded
/// and counted in `dropped_bars` alongside the priceless ones.
pub fn rollup_batch(bars_by_instrument: &BTreeMap<String, Vec<DailyBar>>) -> RollupBatch {
    let results: Vec<(String, Vec<MonthlyAggregate>, usize)> = bars_by_instrument
        .par_iter()
        .map(|(instrument, bars)| {
            let out = rollup_instrument(instrument, bars);
            let stray = bars.iter().filter(|b| b.instrument != *instrument).count();
            if stray > 0 {
                tracing::warn!(%instrument, stray, "bars filed under the wrong instrument");
            }
            (instrument.clone(), out.aggregates, out.dropped_bars + stray)
        })
        .collect();

    let mut batch = RollupBatch::default();
    for (instrument, aggregates, dropped) in results {
        tracing::debug!(%instrument, months = aggregates.len(), dropped, "rolled up");
        batch.dropped_bars += dropped;
        batch.monthly.insert(instrument, aggregates);
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcheck_core::rollup::rollup;
    use chrono::NaiveDate;

    fn bar(id: &str, m: u32, d: u32, close: f64) -> DailyBar {
        DailyBar::new(
            id,
            NaiveDate::from_ymd_opt(2020, m, d).unwrap(),
            close,
            close + 1.0,
            close - 1.0,
            close,
            100,
        )
    }

    #[test]
    fn batch_matches_sequential_rollup() {
        let mut input = BTreeMap::new();
        input.insert(
            "AAPL".to_string(),
            vec![bar("AAPL", 1, 2, 10.0), bar("AAPL", 1, 3, 12.0), bar("AAPL", 2, 3, 11.0)],
        );
        input.insert("MSFT".to_string(), vec![bar("MSFT", 1, 2, 50.0)]);

        let batch = rollup_batch(&input);
        assert_eq!(batch.instrument_count(), 2);
        assert_eq!(batch.aggregate_count(), 3);
        assert_eq!(batch.monthly["AAPL"], rollup(&input["AAPL"]).aggregates);
        assert_eq!(batch.dropped_bars, 0);
    }

    #[test]
    fn dropped_bars_are_summed() {
        let mut empty = bar("AAPL", 1, 6, 1.0);
        empty.open = None;
        empty.high = None;
        empty.low = None;
        empty.close = None;

        let mut input = BTreeMap::new();
        input.insert("AAPL".to_string(), vec![bar("AAPL", 1, 2, 10.0), empty.clone()]);
        input.insert("TSLA".to_string(), vec![empty]);

        let batch = rollup_batch(&input);
        assert_eq!(batch.dropped_bars, 2);
        assert!(batch.monthly["TSLA"].is_empty());
    }

    #[test]
    fn from_aggregates_regroups_and_sorts() {
        let mut input = BTreeMap::new();
        input.insert(
            "AAPL".to_string(),
            vec![bar("AAPL", 3, 2, 10.0), bar("AAPL", 1, 2, 12.0)],
        );
        input.insert("MSFT".to_string(), vec![bar("MSFT", 2, 2, 50.0)]);
        let batch = rollup_batch(&input);

        let mut flat = batch.all_aggregates();
        flat.reverse();
        let regrouped = RollupBatch::from_aggregates(flat);
        assert_eq!(regrouped.monthly, batch.monthly);
    }

    #[test]
    fn bars_under_the_wrong_key_are_counted_as_dropped() {
        let mut input = BTreeMap::new();
        input.insert(
            "AAPL".to_string(),
            vec![bar("AAPL", 1, 2, 10.0), bar("MSFT", 1, 3, 99.0)],
        );

        let batch = rollup_batch(&input);
        assert_eq!(batch.dropped_bars, 1);
        assert_eq!(batch.monthly["AAPL"][0].close_max, Some(10.0));
        assert_eq!(batch.monthly["AAPL"][0].trading_days, 1);
    }
}
