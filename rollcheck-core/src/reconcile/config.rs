//! Validated comparison parameters.
//!
//! Both values are fractions (0.01 = 1 %). There are no defaults here: each
//! caller decides how strict its reference source deserves to be.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ReconcileConfigError {
    #[error("tolerance must be a finite, non-negative fraction (got {0})")]
    InvalidTolerance(f64),

    #[error("pass threshold must be a fraction in [0, 1] (got {0})")]
    InvalidPassThreshold(f64),
}

/// Maximum relative deviation (exclusive) for a period to count as a match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Tolerance(f64);

impl Tolerance {
    pub fn from_fraction(fraction: f64) -> Result<Self, ReconcileConfigError> {
        if fraction.is_finite() && fraction >= 0.0 {
            Ok(Self(fraction))
        } else {
            Err(ReconcileConfigError::InvalidTolerance(fraction))
        }
    }

    pub fn from_percent(percent: f64) -> Result<Self, ReconcileConfigError> {
        Self::from_fraction(percent / 100.0)
    }

    pub fn fraction(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Tolerance {
    type Error = ReconcileConfigError;

    fn try_from(v: f64) -> Result<Self, Self::Error> {
        Self::from_fraction(v)
    }
}

impl From<Tolerance> for f64 {
    fn from(t: Tolerance) -> f64 {
        t.0
    }
}

/// Minimum share of compared periods that must match for a PASS verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct PassThreshold(f64);

impl PassThreshold {
    pub fn from_fraction(fraction: f64) -> Result<Self, ReconcileConfigError> {
        if (0.0..=1.0).contains(&fraction) {
            Ok(Self(fraction))
        } else {
            Err(ReconcileConfigError::InvalidPassThreshold(fraction))
        }
    }

    pub fn from_percent(percent: f64) -> Result<Self, ReconcileConfigError> {
        Self::from_fraction(percent / 100.0)
    }

    pub fn fraction(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for PassThreshold {
    type Error = ReconcileConfigError;

    fn try_from(v: f64) -> Result<Self, Self::Error> {
        Self::from_fraction(v)
    }
}

impl From<PassThreshold> for f64 {
    fn from(t: PassThreshold) -> f64 {
        t.0
    }
}

/// Parameters for one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    pub tolerance: Tolerance,
    pub pass_threshold: PassThreshold,
}

impl ReconcileConfig {
    pub fn new(tolerance: Tolerance, pass_threshold: PassThreshold) -> Self {
        Self {
            tolerance,
            pass_threshold,
        }
    }

    /// Build from percentages, e.g. `from_percents(1.0, 95.0)`.
    pub fn from_percents(
        tolerance_pct: f64,
        pass_threshold_pct: f64,
    ) -> Result<Self, ReconcileConfigError> {
        Ok(Self::new(
            Tolerance::from_percent(tolerance_pct)?,
            PassThreshold::from_percent(pass_threshold_pct)?,
        ))
    }
}
