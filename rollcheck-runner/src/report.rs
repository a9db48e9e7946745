//! Human-readable validation reports: a plain-text summary table for the
//! terminal and a Markdown document for archiving.

use crate::validate::{ValidationOutcome, ValidationReport};
use rollcheck_core::reconcile::ReconciliationResult;

fn pct(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

fn diff_pct(diff: Option<f64>) -> String {
    diff.map_or_else(|| "n/a".to_string(), |d| format!("{:.2}%", d * 100.0))
}

/// Terminal summary: one line per reference plus the overall status.
pub fn render_summary(report: &ValidationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<8} {:<12} {:<10} {:>12} {:>8}\n",
        "ID", "STATUS", "PROFILE", "MATCHES", "%"
    ));
    out.push_str(&format!("{}\n", "-".repeat(54)));

    for outcome in &report.outcomes {
        match outcome {
            ValidationOutcome::Validated {
                profile, result, ..
            } => {
                out.push_str(&format!(
                    "{:<8} {:<12} {:<10} {:>12} {:>7.1}%\n",
                    result.instrument,
                    result.verdict.to_string(),
                    profile,
                    format!("{}/{}", result.matched, result.compared),
                    result.match_pct(),
                ));
            }
            ValidationOutcome::Unavailable { instrument, .. } => {
                out.push_str(&format!(
                    "{:<8} {:<12} {:<10} {:>12} {:>8}\n",
                    instrument, "UNAVAILABLE", "-", "-", "-"
                ));
            }
        }
    }

    out.push_str(&format!("{}\n", "-".repeat(54)));
    let overall = if report.all_passed() {
        "PASS - every reference validated"
    } else {
        "FAIL - check mismatches and unavailable references"
    };
    out.push_str(&format!("OVERALL: {overall}\n"));
    out
}

/// Up to `limit` mismatch lines for one instrument (`limit == 0` shows all).
pub fn render_mismatches(result: &ReconciliationResult, limit: usize) -> String {
    if result.mismatches.is_empty() {
        return format!("{}: all compared months within tolerance\n", result.instrument);
    }

    let shown = if limit == 0 {
        result.mismatches.len()
    } else {
        limit.min(result.mismatches.len())
    };
    let mut out = format!(
        "{}: {} mismatches (tolerance {})\n",
        result.instrument,
        result.mismatches.len(),
        pct(result.tolerance)
    );
    for m in &result.mismatches[..shown] {
        out.push_str(&format!(
            "  {}: computed={:.2}, reference={:.2}, diff={}\n",
            m.period(),
            m.computed,
            m.reference,
            diff_pct(m.relative_difference)
        ));
    }
    if shown < result.mismatches.len() {
        out.push_str(&format!("  ... {} more\n", result.mismatches.len() - shown));
    }
    out
}

/// Full Markdown report, every mismatch included.
pub fn render_markdown(report: &ValidationReport) -> String {
    let mut md = String::new();
    md.push_str("# Monthly Close Validation\n\n");

    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!(
        "| Overall | **{}** |\n",
        if report.all_passed() { "PASS" } else { "FAIL" }
    ));
    md.push_str(&format!("| References | {} |\n", report.outcomes.len()));
    md.push_str(&format!("| Config | `{}` |\n\n", report.config_fingerprint));

    md.push_str("## Summary\n\n");
    md.push_str("| Instrument | Verdict | Profile | Matched | Compared | Match % | Computed only | Reference only |\n");
    md.push_str("| --- | --- | --- | ---: | ---: | ---: | ---: | ---: |\n");
    for outcome in &report.outcomes {
        match outcome {
            ValidationOutcome::Validated {
                profile, result, ..
            } => md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {:.1}% | {} | {} |\n",
                result.instrument,
                result.verdict,
                profile,
                result.matched,
                result.compared,
                result.match_pct(),
                result.computed_only,
                result.reference_only,
            )),
            ValidationOutcome::Unavailable { instrument, .. } => md.push_str(&format!(
                "| {instrument} | UNAVAILABLE | - | - | - | - | - | - |\n"
            )),
        }
    }
    md.push('\n');

    let unavailable: Vec<_> = report
        .outcomes
        .iter()
        .filter_map(|o| match o {
            ValidationOutcome::Unavailable {
                instrument,
                path,
                reason,
            } => Some((instrument, path, reason)),
            ValidationOutcome::Validated { .. } => None,
        })
        .collect();
    if !unavailable.is_empty() {
        md.push_str("## Unavailable References\n\n");
        for (instrument, path, reason) in unavailable {
            md.push_str(&format!("- {instrument} (`{}`): {reason}\n", path.display()));
        }
        md.push('\n');
    }

    for outcome in &report.outcomes {
        let ValidationOutcome::Validated { result, .. } = outcome else {
            continue;
        };
        if result.mismatches.is_empty() {
            continue;
        }
        md.push_str(&format!(
            "## {} Mismatches (tolerance {})\n\n",
            result.instrument,
            pct(result.tolerance)
        ));
        md.push_str("| Period | Computed | Reference | Difference |\n");
        md.push_str("| --- | ---: | ---: | ---: |\n");
        for m in &result.mismatches {
            md.push_str(&format!(
                "| {} | {:.4} | {:.4} | {} |\n",
                m.period(),
                m.computed,
                m.reference,
                diff_pct(m.relative_difference)
            ));
        }
        md.push('\n');
    }

    md
}
