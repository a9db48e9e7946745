//! Run configuration loaded from `rollcheck.toml`.
//!
//! ```toml
//! [data]
//! start_date = "2000-01-01"
//! cache_dir = "data/cache"
//! database = "data/rollcheck.db"
//!
//! [profiles.custom]
//! tolerance_pct = 0.5
//! pass_threshold_pct = 97.0
//!
//! [[references]]
//! instrument = "AAPL"
//! path = "references/StockAnalysis-AAPL.xlsx"
//! profile = "strict"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use chrono::NaiveDate;
use rollcheck_core::reconcile::{ReconcileConfig, ReconcileConfigError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown tolerance profile '{0}'")]
    UnknownProfile(String),

    #[error("profile '{name}': {source}")]
    InvalidProfile {
        name: String,
        source: ReconcileConfigError,
    },

    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("reference for '{0}' is listed more than once")]
    DuplicateReference(String),
}

/// Named tolerance/threshold pair, both in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub tolerance_pct: f64,
    pub pass_threshold_pct: f64,
}

impl Profile {
    pub fn to_reconcile_config(self, name: &str) -> Result<ReconcileConfig, ConfigError> {
        ReconcileConfig::from_percents(self.tolerance_pct, self.pass_threshold_pct).map_err(
            |source| ConfigError::InvalidProfile {
                name: name.to_string(),
                source,
            },
        )
    }
}

/// Built-in profiles. `strict` is the exact-source check; `standard` and
/// `loose` absorb rounding and source differences.
pub fn builtin_profiles() -> BTreeMap<String, Profile> {
    [
        ("strict", 0.1, 99.0),
        ("standard", 1.0, 95.0),
        ("loose", 2.0, 95.0),
    ]
    .into_iter()
    .map(|(name, tolerance_pct, pass_threshold_pct)| {
        (
            name.to_string(),
            Profile {
                tolerance_pct,
                pass_threshold_pct,
            },
        )
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub start_date: NaiveDate,
    /// `None` means today.
    pub end_date: Option<NaiveDate>,
    pub cache_dir: PathBuf,
    pub database: PathBuf,
    /// Minimum spacing between provider requests.
    pub request_delay_ms: u64,
    /// Universe TOML; the built-in tiers are used when absent.
    pub universe: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
            end_date: None,
            cache_dir: PathBuf::from("data/cache"),
            database: PathBuf::from("data/rollcheck.db"),
            request_delay_ms: 1_000,
            universe: None,
        }
    }
}

impl DataConfig {
    pub fn end_date_or_today(&self) -> NaiveDate {
        self.end_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// One reference document and the profile it is judged with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    pub instrument: String,
    pub path: PathBuf,
    /// Falls back to `RunConfig::default_profile`.
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data: DataConfig,
    pub default_profile: String,
    /// User profiles; a name shared with a built-in overrides it.
    pub profiles: BTreeMap<String, Profile>,
    pub references: Vec<ReferenceSpec>,
}

impl Default for RunConfig {
    fn default() -> Self {
        let references = ["AAPL", "AMZN", "CVX", "SBUX", "TSLA"]
            .iter()
            .map(|id| ReferenceSpec {
                instrument: id.to_string(),
                path: PathBuf::from(format!("references/StockAnalysis-{id}.xlsx")),
                profile: None,
            })
            .collect();
        Self {
            data: DataConfig::default(),
            default_profile: "strict".to_string(),
            profiles: BTreeMap::new(),
            references,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse and validate without touching the filesystem.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(end) = self.data.end_date {
            if self.data.start_date > end {
                return Err(ConfigError::InvalidDateRange {
                    start: self.data.start_date,
                    end,
                });
            }
        }
        self.reconcile_config(&self.default_profile)?;
        for (name, profile) in &self.profiles {
            profile.to_reconcile_config(name)?;
        }
        let mut seen = std::collections::HashSet::new();
        for r in &self.references {
            if !seen.insert(r.instrument.as_str()) {
                return Err(ConfigError::DuplicateReference(r.instrument.clone()));
            }
            if let Some(p) = &r.profile {
                self.reconcile_config(p)?;
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.data.cache_dir);
        resolve(&mut self.data.database);
        if let Some(u) = self.data.universe.as_mut() {
            resolve(u);
        }
        for r in &mut self.references {
            resolve(&mut r.path);
        }
    }

    pub fn profile(&self, name: &str) -> Result<Profile, ConfigError> {
        self.profiles
            .get(name)
            .copied()
            .or_else(|| builtin_profiles().get(name).copied())
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }

    pub fn reconcile_config(&self, profile: &str) -> Result<ReconcileConfig, ConfigError> {
        self.profile(profile)?.to_reconcile_config(profile)
    }

    /// Profile name that applies to a reference entry.
    pub fn profile_for<'a>(&'a self, reference: &'a ReferenceSpec) -> &'a str {
        reference.profile.as_deref().unwrap_or(&self.default_profile)
    }

    /// Deterministic BLAKE3 fingerprint of the configuration, shown in reports
    /// so two validation runs can be tied to the same settings.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex()[..16].to_string()
    }
}
