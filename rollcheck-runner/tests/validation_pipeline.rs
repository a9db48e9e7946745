//! Full pipeline on fixtures: cached daily bars → parallel rollup → monthly
//! CSV → validation against CSV reference exports → reports.

use chrono::NaiveDate;
use rollcheck_core::data::{DataSource, ParquetCache};
use rollcheck_core::domain::DailyBar;
use rollcheck_core::reconcile::Verdict;
use rollcheck_core::store::MonthlyStore;
use rollcheck_runner::{
    load_bars, monthly_from_cache, read_monthly_csv, render_markdown, render_summary,
    rollup_batch, validate_batch, write_monthly_csv, LoadOptions, ReferenceSpec, RollupBatch,
    RunConfig, ValidationOutcome,
};
use std::path::Path;

fn bars(instrument: &str, base: f64) -> Vec<DailyBar> {
    (1..=12u32)
        .flat_map(|m| {
            let close = base + m as f64;
            [2u32, 16].map(|day| {
                DailyBar::new(
                    instrument,
                    NaiveDate::from_ymd_opt(2021, m, day).unwrap(),
                    close - 0.5,
                    close + 1.0,
                    close - 1.0,
                    close + day as f64 / 100.0,
                    1_000,
                )
            })
        })
        .collect()
}

/// Pivot export: max-close section, grand total, then a section that must
/// be ignored.
fn write_reference(path: &Path, base: f64, bump_month: Option<u32>) {
    let mut csv = String::from("Max of Close,Month\nYear,1,2,3,4,5,6,7,8,9,10,11,12,Grand Total\n");
    let months: Vec<String> = (1..=12u32)
        .map(|m| {
            let mut v = base + m as f64 + 0.16;
            if bump_month == Some(m) {
                v *= 1.10;
            }
            format!("{v:.2}")
        })
        .collect();
    csv.push_str(&format!("2021,{},{:.2}\n", months.join(","), base + 12.16));
    csv.push_str("Grand Total\n\nMax of High,Month\n");
    csv.push_str("2021,1,1,1,1,1,1,1,1,1,1,1,1\nGrand Total\n");
    std::fs::write(path, csv).unwrap();
}

#[test]
fn end_to_end_validation() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetCache::new(dir.path().join("cache"));
    cache.write("AAPL", &bars("AAPL", 100.0), DataSource::Fixture).unwrap();
    cache.write("TSLA", &bars("TSLA", 200.0), DataSource::Fixture).unwrap();

    let opts = LoadOptions {
        start: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(),
        offline: true,
        force: false,
        skip_missing: false,
    };
    let loaded = load_bars(&["AAPL", "TSLA"], &cache, None, None, &opts).unwrap();
    assert_eq!(loaded.bar_count(), 48);

    let batch = rollup_batch(&loaded.bars);
    assert_eq!(batch.aggregate_count(), 24);

    // Monthly CSV round trip feeds validation exactly like the in-memory batch.
    let monthly_csv = dir.path().join("monthly.csv");
    write_monthly_csv(&monthly_csv, &batch.all_aggregates()).unwrap();
    let reloaded = RollupBatch::from_aggregates(read_monthly_csv(&monthly_csv).unwrap());
    assert_eq!(reloaded.monthly, batch.monthly);

    write_reference(&dir.path().join("aapl.csv"), 100.0, None);
    write_reference(&dir.path().join("tsla.csv"), 200.0, Some(7));

    let config = RunConfig {
        references: vec![
            ReferenceSpec {
                instrument: "AAPL".into(),
                path: dir.path().join("aapl.csv"),
                profile: None,
            },
            ReferenceSpec {
                instrument: "TSLA".into(),
                path: dir.path().join("tsla.csv"),
                profile: Some("standard".into()),
            },
            ReferenceSpec {
                instrument: "CVX".into(),
                path: dir.path().join("missing.xlsx"),
                profile: None,
            },
        ],
        ..RunConfig::default()
    };

    let report = validate_batch(&config, &reloaded).unwrap();
    let instruments: Vec<&str> = report.outcomes.iter().map(|o| o.instrument()).collect();
    assert_eq!(instruments, vec!["AAPL", "TSLA", "CVX"]);

    assert_eq!(report.outcomes[0].verdict(), Some(Verdict::Pass));
    // 11 of 12 under the 95% standard threshold.
    match &report.outcomes[1] {
        ValidationOutcome::Validated { result, .. } => {
            assert_eq!(result.verdict, Verdict::Fail);
            assert_eq!(result.mismatches.len(), 1);
            assert_eq!(result.mismatches[0].month, 7);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(report.outcomes[2].verdict(), None);
    assert!(!report.all_passed());

    let summary = render_summary(&report);
    assert!(summary.contains("OVERALL: FAIL"));
    let md = render_markdown(&report);
    assert!(md.contains("## TSLA Mismatches"));
    assert!(md.contains("missing.xlsx"));
}

#[test]
fn aggregates_persist_to_store_idempotently() {
    let mut input = std::collections::BTreeMap::new();
    input.insert("AAPL".to_string(), bars("AAPL", 100.0));
    let batch = rollup_batch(&input);

    let mut store = MonthlyStore::open_in_memory().unwrap();
    for _ in 0..2 {
        for (instrument, aggs) in &batch.monthly {
            store.upsert_aggregates(instrument, aggs).unwrap();
        }
    }
    assert_eq!(store.count().unwrap(), 12);
    assert_eq!(store.load_instrument("AAPL").unwrap(), batch.monthly["AAPL"]);
}

#[test]
fn uncached_reference_instrument_reports_no_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RunConfig::default();
    config.data.cache_dir = dir.path().join("cache");
    config.data.start_date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
    config.data.end_date = NaiveDate::from_ymd_opt(2021, 12, 31);
    config.references = ["AAPL", "CVX"]
        .iter()
        .map(|id| ReferenceSpec {
            instrument: id.to_string(),
            path: dir.path().join(format!("{id}.csv")),
            profile: None,
        })
        .collect();

    let cache = ParquetCache::new(&config.data.cache_dir);
    cache.write("AAPL", &bars("AAPL", 100.0), DataSource::Fixture).unwrap();
    write_reference(&dir.path().join("AAPL.csv"), 100.0, None);
    write_reference(&dir.path().join("CVX.csv"), 50.0, None);

    let monthly = monthly_from_cache(&config, &cache).unwrap();
    assert_eq!(monthly.instrument_count(), 1);

    let report = validate_batch(&config, &monthly).unwrap();
    assert_eq!(report.outcomes[0].verdict(), Some(Verdict::Pass));
    match &report.outcomes[1] {
        ValidationOutcome::Validated { result, .. } => {
            assert_eq!(result.verdict, Verdict::NoOverlap);
            assert_eq!(result.compared, 0);
            assert_eq!(result.reference_only, 12);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(render_summary(&report).contains("NO_OVERLAP"));
}
