//! rollcheck runner: batch orchestration on top of `rollcheck-core`.
//!
//! - Run configuration (`rollcheck.toml`) with tolerance profiles
//! - Bar loading with cache/download fallback
//! - Parallel rollup and parallel reference validation
//! - CSV export/import and text/Markdown reports

pub mod config;
pub mod data_loader;
pub mod export;
pub mod pipeline;
pub mod report;
pub mod validate;

pub use config::{builtin_profiles, ConfigError, DataConfig, Profile, ReferenceSpec, RunConfig};
pub use data_loader::{load_bars, LoadError, LoadOptions, LoadedData};
pub use export::{read_monthly_csv, write_daily_csv, write_monthly_csv};
pub use pipeline::{rollup_batch, RollupBatch};
pub use report::{render_markdown, render_mismatches, render_summary};
pub use validate::{
    monthly_from_cache, validate_batch, validate_reference, ValidationOutcome, ValidationReport,
};
