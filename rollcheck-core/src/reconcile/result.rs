//! Per-instrument reconciliation outcome.

use crate::domain::Period;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
    /// No period was present on both sides.
    NoOverlap,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::NoOverlap => "NO_OVERLAP",
        };
        f.write_str(s)
    }
}

/// A compared period outside tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    pub year: i32,
    pub month: u32,
    pub computed: f64,
    pub reference: f64,
    /// `None` when the reference was zero.
    pub relative_difference: Option<f64>,
}

impl Mismatch {
    pub fn period(&self) -> Period {
        Period::new(self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub instrument: String,
    pub matched: usize,
    pub compared: usize,
    /// `matched / compared`; `None` when nothing was compared.
    pub match_ratio: Option<f64>,
    pub verdict: Verdict,
    /// Every mismatching period, in period order.
    pub mismatches: Vec<Mismatch>,
    /// Periods with a computed close_max but no reference value.
    pub computed_only: usize,
    /// Periods with a reference value but no computed close_max.
    pub reference_only: usize,
    pub tolerance: f64,
    pub pass_threshold: f64,
}

impl ReconciliationResult {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// Match ratio as a percentage, 0 when nothing was compared.
    pub fn match_pct(&self) -> f64 {
        self.match_ratio.unwrap_or(0.0) * 100.0
    }
}
