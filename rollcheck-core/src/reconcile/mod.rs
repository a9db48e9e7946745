//! Tolerance-based reconciliation of computed monthly close maxima against a
//! reference series.
//!
//! The two sides are inner-joined on (year, month). Periods present on only
//! one side are counted but never treated as failures. Matching is strict
//! (`relative_difference < tolerance`) and the verdict compares the match
//! ratio against the pass threshold with `>=`.

pub mod compare;
pub mod config;
pub mod result;

pub use compare::{compare, relative_difference, PeriodComparison};
pub use config::{PassThreshold, ReconcileConfig, ReconcileConfigError, Tolerance};
pub use result::{Mismatch, ReconciliationResult, Verdict};

use crate::domain::{MonthlyAggregate, Period};
use crate::reference::ReferencePeriodValue;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Reconcile one instrument's aggregates with its reference values.
///
/// `aggregates` may contain other instruments; only rows for `instrument`
/// are used. Aggregates without a close_max count as absent. Duplicate
/// reference periods keep the first value seen.
pub fn reconcile(
    instrument: &str,
    aggregates: &[MonthlyAggregate],
    references: &[ReferencePeriodValue],
    config: &ReconcileConfig,
) -> ReconciliationResult {
    let computed: BTreeMap<Period, f64> = aggregates
        .iter()
        .filter(|a| a.instrument == instrument)
        .filter_map(|a| a.close_max.map(|v| (a.period(), v)))
        .collect();

    let mut reference: BTreeMap<Period, f64> = BTreeMap::new();
    for r in references {
        match reference.entry(Period::new(r.year, r.month)) {
            Entry::Vacant(slot) => {
                slot.insert(r.reference_close_max);
            }
            Entry::Occupied(slot) => {
                tracing::debug!(instrument, period = %slot.key(), "duplicate reference period ignored");
            }
        }
    }

    let mut matched = 0;
    let mut compared = 0;
    let mut mismatches = Vec::new();
    let mut computed_only = 0;

    for (period, &value) in &computed {
        let Some(&reference_value) = reference.get(period) else {
            computed_only += 1;
            continue;
        };
        compared += 1;
        let cmp = compare(value, reference_value, config.tolerance);
        if cmp.is_match {
            matched += 1;
        } else {
            mismatches.push(Mismatch {
                year: period.year,
                month: period.month,
                computed: value,
                reference: reference_value,
                relative_difference: cmp.relative_difference,
            });
        }
    }
    let reference_only = reference.len() - compared;

    let (match_ratio, verdict) = if compared == 0 {
        (None, Verdict::NoOverlap)
    } else {
        let ratio = matched as f64 / compared as f64;
        let verdict = if ratio >= config.pass_threshold.fraction() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        (Some(ratio), verdict)
    };

    if computed_only > 0 || reference_only > 0 {
        tracing::debug!(
            instrument,
            computed_only,
            reference_only,
            "periods excluded from comparison"
        );
    }

    ReconciliationResult {
        instrument: instrument.to_string(),
        matched,
        compared,
        match_ratio,
        verdict,
        mismatches,
        computed_only,
        reference_only,
        tolerance: config.tolerance.fraction(),
        pass_threshold: config.pass_threshold.fraction(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agg(year: i32, month: u32, close_max: Option<f64>) -> MonthlyAggregate {
        MonthlyAggregate {
            instrument: "AAPL".into(),
            year,
            month,
            open_first: Some(1.0),
            high_max: close_max.map(|c| c + 1.0),
            low_min: Some(0.5),
            close_max,
            close_last: close_max,
            volume_total: 10,
            trading_days: 20,
        }
    }

    fn reference(year: i32, month: u32, v: f64) -> ReferencePeriodValue {
        ReferencePeriodValue {
            year,
            month,
            reference_close_max: v,
        }
    }

    fn cfg(tol_pct: f64, pass_pct: f64) -> ReconcileConfig {
        ReconcileConfig::from_percents(tol_pct, pass_pct).unwrap()
    }

    #[test]
    fn all_matching_passes() {
        let aggs = vec![agg(2020, 1, Some(100.0)), agg(2020, 2, Some(110.0))];
        let refs = vec![reference(2020, 1, 100.05), reference(2020, 2, 110.0)];
        let r = reconcile("AAPL", &aggs, &refs, &cfg(0.1, 99.0));
        assert_eq!(r.verdict, Verdict::Pass);
        assert_eq!((r.matched, r.compared), (2, 2));
        assert_eq!(r.match_ratio, Some(1.0));
        assert!(r.mismatches.is_empty());
    }

    #[test]
    fn mismatches_are_retained_with_detail() {
        let aggs = vec![agg(2020, 1, Some(100.0)), agg(2020, 2, Some(120.0))];
        let refs = vec![reference(2020, 1, 100.0), reference(2020, 2, 100.0)];
        let r = reconcile("AAPL", &aggs, &refs, &cfg(1.0, 95.0));
        assert_eq!(r.verdict, Verdict::Fail);
        assert_eq!(r.mismatches.len(), 1);
        let m = &r.mismatches[0];
        assert_eq!((m.year, m.month), (2020, 2));
        assert_eq!(m.computed, 120.0);
        assert_eq!(m.reference, 100.0);
        assert!((m.relative_difference.unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn one_sided_periods_are_excluded_not_failed() {
        let aggs = vec![agg(2020, 1, Some(100.0)), agg(2020, 2, Some(100.0)), agg(2020, 3, None)];
        let refs = vec![reference(2020, 1, 100.0), reference(2020, 3, 50.0), reference(2019, 12, 1.0)];
        let r = reconcile("AAPL", &aggs, &refs, &cfg(1.0, 95.0));
        assert_eq!(r.compared, 1);
        assert_eq!(r.computed_only, 1);
        assert_eq!(r.reference_only, 2);
        assert_eq!(r.verdict, Verdict::Pass);
    }

    #[test]
    fn disjoint_ranges_yield_no_overlap() {
        let aggs = vec![agg(2021, 1, Some(100.0))];
        let refs = vec![reference(2019, 1, 100.0)];
        let r = reconcile("AAPL", &aggs, &refs, &cfg(1.0, 95.0));
        assert_eq!(r.verdict, Verdict::NoOverlap);
        assert_eq!(r.match_ratio, None);
        assert_eq!((r.matched, r.compared), (0, 0));
        assert_eq!(r.match_pct(), 0.0);
    }

    #[test]
    fn threshold_is_inclusive() {
        // 19 of 20 match -> exactly 95%
        let aggs: Vec<_> = (1..=20).map(|i| agg(2000 + i, 1, Some(100.0))).collect();
        let mut refs: Vec<_> = (1..=20).map(|i| reference(2000 + i, 1, 100.0)).collect();
        refs[0].reference_close_max = 150.0;
        let r = reconcile("AAPL", &aggs, &refs, &cfg(1.0, 95.0));
        assert_eq!(r.matched, 19);
        assert_eq!(r.verdict, Verdict::Pass);

        let strict = reconcile("AAPL", &aggs, &refs, &cfg(1.0, 99.0));
        assert_eq!(strict.verdict, Verdict::Fail);
    }

    #[test]
    fn other_instruments_are_ignored() {
        let mut other = agg(2020, 1, Some(999.0));
        other.instrument = "MSFT".into();
        let aggs = vec![other, agg(2020, 1, Some(100.0))];
        let refs = vec![reference(2020, 1, 100.0)];
        let r = reconcile("AAPL", &aggs, &refs, &cfg(0.1, 99.0));
        assert_eq!(r.verdict, Verdict::Pass);
    }

    #[test]
    fn duplicate_reference_keeps_first() {
        let aggs = vec![agg(2020, 1, Some(100.0))];
        let refs = vec![reference(2020, 1, 100.0), reference(2020, 1, 500.0)];
        let r = reconcile("AAPL", &aggs, &refs, &cfg(0.1, 99.0));
        assert_eq!(r.verdict, Verdict::Pass);
        assert_eq!(r.reference_only, 0);
    }

    #[test]
    fn zero_reference_does_not_panic() {
        let aggs = vec![agg(2020, 1, Some(0.0)), agg(2020, 2, Some(5.0))];
        let refs = vec![reference(2020, 1, 0.0), reference(2020, 2, 0.0)];
        let r = reconcile("AAPL", &aggs, &refs, &cfg(1.0, 95.0));
        assert_eq!(r.matched, 1);
        assert_eq!(r.mismatches.len(), 1);
        assert_eq!(r.mismatches[0].relative_difference, None);
    }

    #[test]
    fn verdict_serializes_screaming_case() {
        assert_eq!(serde_json::to_string(&Verdict::NoOverlap).unwrap(), "\"NO_OVERLAP\"");
        assert_eq!(Verdict::Pass.to_string(), "PASS");
    }
}
