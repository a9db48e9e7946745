//! Validation of computed monthly aggregates against every configured
//! reference document.

use crate::config::{ConfigError, ReferenceSpec, RunConfig};
use crate::data_loader::{load_bars, LoadError, LoadOptions};
use crate::pipeline::{rollup_batch, RollupBatch};
use rayon::prelude::*;
use rollcheck_core::data::ParquetCache;
use rollcheck_core::reconcile::{reconcile, ReconciliationResult, Verdict};
use rollcheck_core::reference::{extract_monthly_max_close, load_grid};
use serde::Serialize;
use std::path::PathBuf;

/// Outcome for one reference entry.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Validated {
        profile: String,
        path: PathBuf,
        /// Reference month cells that were blank or non-numeric.
        skipped_cells: usize,
        result: ReconciliationResult,
    },
    /// The reference could not be loaded; the instrument is not judged.
    Unavailable {
        instrument: String,
        path: PathBuf,
        reason: String,
    },
}

impl ValidationOutcome {
    pub fn instrument(&self) -> &str {
        match self {
            ValidationOutcome::Validated { result, .. } => &result.instrument,
            ValidationOutcome::Unavailable { instrument, .. } => instrument,
        }
    }

    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            ValidationOutcome::Validated { result, .. } => Some(result.verdict),
            ValidationOutcome::Unavailable { .. } => None,
        }
    }

    pub fn passed(&self) -> bool {
        match self {
            ValidationOutcome::Validated { result, .. } => result.passed(),
            ValidationOutcome::Unavailable { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub config_fingerprint: String,
    pub outcomes: Vec<ValidationOutcome>,
}

impl ValidationReport {
    /// True when every reference loaded and passed. An empty report does not pass.
    pub fn all_passed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(ValidationOutcome::passed)
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.verdict() == Some(verdict))
            .count()
    }

    pub fn unavailable(&self) -> usize {
        self.outcomes.iter().filter(|o| o.verdict().is_none()).count()
    }
}

/// Monthly aggregates for every referenced instrument, computed from cached
/// bars only. Instruments with nothing cached are left out of the batch, so
/// their references reconcile as `NO_OVERLAP`.
pub fn monthly_from_cache(
    config: &RunConfig,
    cache: &ParquetCache,
) -> Result<RollupBatch, LoadError> {
    let ids: Vec<&str> = config
        .references
        .iter()
        .map(|r| r.instrument.as_str())
        .collect();
    let opts = LoadOptions {
        start: config.data.start_date,
        end: config.data.end_date_or_today(),
        offline: true,
        force: false,
        skip_missing: true,
    };
    let loaded = load_bars(&ids, cache, None, None, &opts)?;
    if !loaded.missing.is_empty() {
        tracing::warn!(
            missing = ?loaded.missing,
            "no cached bars; these references will report NO_OVERLAP"
        );
    }
    Ok(rollup_batch(&loaded.bars))
}

/// Validate one reference entry.
pub fn validate_reference(
    config: &RunConfig,
    reference: &ReferenceSpec,
    monthly: &RollupBatch,
) -> Result<ValidationOutcome, ConfigError> {
    let profile = config.profile_for(reference).to_string();
    let reconcile_config = config.reconcile_config(&profile)?;

    let grid = match load_grid(&reference.path) {
        Ok(grid) => grid,
        Err(e) => {
            tracing::warn!(
                instrument = %reference.instrument,
                path = %reference.path.display(),
                "reference unavailable: {e}"
            );
            return Ok(ValidationOutcome::Unavailable {
                instrument: reference.instrument.clone(),
                path: reference.path.clone(),
                reason: e.to_string(),
            });
        }
    };

    let extraction = extract_monthly_max_close(&grid);
    if extraction.is_empty() {
        tracing::warn!(
            instrument = %reference.instrument,
            path = %reference.path.display(),
            "no monthly values found in reference"
        );
    }

    let aggregates = monthly
        .monthly
        .get(&reference.instrument)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let result = reconcile(
        &reference.instrument,
        aggregates,
        &extraction.values,
        &reconcile_config,
    );
    tracing::info!(
        instrument = %result.instrument,
        verdict = %result.verdict,
        matched = result.matched,
        compared = result.compared,
        "reference validated"
    );

    Ok(ValidationOutcome::Validated {
        profile,
        path: reference.path.clone(),
        skipped_cells: extraction.skipped_cells,
        result,
    })
}

/// Validate every configured reference in parallel, in configuration order.
pub fn validate_batch(
    config: &RunConfig,
    monthly: &RollupBatch,
) -> Result<ValidationReport, ConfigError> {
    let outcomes = config
        .references
        .par_iter()
        .map(|r| validate_reference(config, r, monthly))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidationReport {
        config_fingerprint: config.fingerprint(),
        outcomes,
    })
}
