//! End-to-end scenarios: daily bars rolled up, a reference grid extracted,
//! and the two reconciled.

use chrono::NaiveDate;
use rollcheck_core::domain::DailyBar;
use rollcheck_core::reconcile::{reconcile, ReconcileConfig, Verdict};
use rollcheck_core::reference::{extract_monthly_max_close, Cell, ReferenceGrid};
use rollcheck_core::rollup::rollup;

fn bar(y: i32, m: u32, d: u32, close: f64) -> DailyBar {
    DailyBar::new(
        "SBUX",
        NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        close,
        close * 1.01,
        close * 0.99,
        close,
        1_000,
    )
}

/// Two trading days per month of 2020, closes rising with the month.
fn daily_2020() -> Vec<DailyBar> {
    (1..=12u32)
        .flat_map(|m| {
            let base = 80.0 + m as f64;
            [bar(2020, m, 2, base), bar(2020, m, 15, base + 0.5)]
        })
        .collect()
}

/// Pivot-style grid: title, header, one year row, grand total, then a
/// second section that must never be read.
fn grid_for(year: i32, closes: [f64; 12]) -> ReferenceGrid {
    let mut year_row = vec![Cell::Number(year as f64)];
    year_row.extend(closes.iter().map(|&c| Cell::Number(c)));
    let mut decoy = vec![Cell::Number(year as f64)];
    decoy.extend((0..12).map(|_| Cell::Number(1.0)));
    ReferenceGrid::new(vec![
        vec![Cell::Text("Max of Close".into())],
        vec![Cell::Text("Row Labels".into())],
        year_row,
        vec![Cell::Text("Grand Total".into())],
        vec![Cell::Text("Max of High".into())],
        decoy,
        vec![Cell::Text("Grand Total".into())],
    ])
}

fn computed_closes() -> [f64; 12] {
    std::array::from_fn(|i| 80.0 + (i + 1) as f64 + 0.5)
}

#[test]
fn matching_reference_passes_strict_profile() {
    let monthly = rollup(&daily_2020()).aggregates;
    let refs = extract_monthly_max_close(&grid_for(2020, computed_closes())).values;

    let result = reconcile("SBUX", &monthly, &refs, &ReconcileConfig::from_percents(0.1, 99.0).unwrap());
    assert_eq!(result.verdict, Verdict::Pass);
    assert_eq!((result.matched, result.compared), (12, 12));
}

#[test]
fn one_bad_month_fails_strict_but_passes_loose_threshold() {
    let monthly = rollup(&daily_2020()).aggregates;
    let mut closes = computed_closes();
    closes[5] *= 1.5;
    let refs = extract_monthly_max_close(&grid_for(2020, closes)).values;

    let strict = reconcile("SBUX", &monthly, &refs, &ReconcileConfig::from_percents(0.1, 99.0).unwrap());
    assert_eq!(strict.verdict, Verdict::Fail);
    assert_eq!(strict.mismatches.len(), 1);
    assert_eq!(strict.mismatches[0].month, 6);

    // 11 / 12 = 91.7 %
    let lenient = reconcile("SBUX", &monthly, &refs, &ReconcileConfig::from_percents(2.0, 90.0).unwrap());
    assert_eq!(lenient.verdict, Verdict::Pass);
}

#[test]
fn reference_for_another_year_is_no_overlap() {
    let monthly = rollup(&daily_2020()).aggregates;
    let refs = extract_monthly_max_close(&grid_for(2015, computed_closes())).values;

    let result = reconcile("SBUX", &monthly, &refs, &ReconcileConfig::from_percents(1.0, 95.0).unwrap());
    assert_eq!(result.verdict, Verdict::NoOverlap);
    assert_eq!(result.computed_only, 12);
    assert_eq!(result.reference_only, 12);
}

#[test]
fn short_history_is_judged_on_overlap_only() {
    // Listing in November: two computed months against a full reference year.
    let monthly = rollup(&daily_2020()[20..]).aggregates;
    assert_eq!(monthly.len(), 2);
    let refs = extract_monthly_max_close(&grid_for(2020, computed_closes())).values;

    let result = reconcile("SBUX", &monthly, &refs, &ReconcileConfig::from_percents(0.1, 99.0).unwrap());
    assert_eq!(result.verdict, Verdict::Pass);
    assert_eq!(result.compared, 2);
    assert_eq!(result.reference_only, 10);
}
