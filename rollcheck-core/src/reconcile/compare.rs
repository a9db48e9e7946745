//! Single-period comparison.

use super::config::Tolerance;

/// Result of comparing one computed value with its reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodComparison {
    pub is_match: bool,
    /// `None` when the reference is zero; the ratio is never evaluated then.
    pub relative_difference: Option<f64>,
}

/// |computed - reference| / |reference|, or `None` for a zero reference.
pub fn relative_difference(computed: f64, reference: f64) -> Option<f64> {
    if reference == 0.0 {
        return None;
    }
    Some((computed - reference).abs() / reference.abs())
}

/// Classify a period. Matching is strict: `relative_difference < tolerance`.
/// A zero reference matches only an exactly-zero computed value.
pub fn compare(computed: f64, reference: f64, tolerance: Tolerance) -> PeriodComparison {
    match relative_difference(computed, reference) {
        Some(diff) => PeriodComparison {
            is_match: diff < tolerance.fraction(),
            relative_difference: Some(diff),
        },
        None => PeriodComparison {
            is_match: computed == 0.0,
            relative_difference: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tol(f: f64) -> Tolerance {
        Tolerance::from_fraction(f).unwrap()
    }

    #[test]
    fn relative_difference_uses_reference_magnitude() {
        let d = relative_difference(99.0, 100.0).unwrap();
        assert!((d - 0.01).abs() < 1e-12);
        let d = relative_difference(-99.0, -100.0).unwrap();
        assert!((d - 0.01).abs() < 1e-12);
    }

    #[test]
    fn strict_less_than_at_boundary() {
        // reference 100, tolerance 0.1% -> boundary at 0.1 absolute difference
        let t = tol(0.001);
        let eps = 1e-6;
        assert!(compare(100.0 + 0.1 - eps, 100.0, t).is_match);
        assert!(!compare(100.0 + 0.1 + eps, 100.0, t).is_match);
    }

    #[test]
    fn exactly_at_tolerance_is_a_mismatch() {
        // 0.5 / 2.0 == 0.25 exactly in binary floating point
        let c = compare(2.5, 2.0, tol(0.25));
        assert_eq!(c.relative_difference, Some(0.25));
        assert!(!c.is_match);
    }

    #[test]
    fn small_deviation_under_tolerance_matches() {
        // 0.09% < 0.1%
        assert!(compare(100.00, 100.09, tol(0.001)).is_match);
        // 0.2% > 0.1%
        assert!(!compare(100.00, 100.20, tol(0.001)).is_match);
    }

    #[test]
    fn zero_reference_is_special_cased() {
        let zero_zero = compare(0.0, 0.0, tol(0.01));
        assert!(zero_zero.is_match);
        assert_eq!(zero_zero.relative_difference, None);

        let five_zero = compare(5.0, 0.0, tol(0.01));
        assert!(!five_zero.is_match);
        assert_eq!(five_zero.relative_difference, None);
    }

    #[test]
    fn nan_computed_never_matches() {
        assert!(!compare(f64::NAN, 10.0, tol(1.0)).is_match);
    }
}
