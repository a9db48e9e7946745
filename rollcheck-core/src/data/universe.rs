//! Instrument universe organised in priority tiers.
//!
//! Stored as TOML: one table per tier name, each with an ordered list of
//! instrument ids. Tier 1 holds the instruments that have reference
//! spreadsheets and is fetched first.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize universe: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    #[serde(default)]
    pub description: String,
    pub instruments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    /// Keyed by tier name; `BTreeMap` keeps "tier1" before "tier2".
    pub tiers: BTreeMap<String, Tier>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, UniverseError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Every instrument in tier order, first occurrence wins.
    pub fn all_instruments(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.tiers
            .values()
            .flat_map(|t| t.instruments.iter().map(String::as_str))
            .filter(|id| seen.insert(*id))
            .collect()
    }

    pub fn tier_instruments(&self, tier: &str) -> Option<&[String]> {
        self.tiers.get(tier).map(|t| t.instruments.as_slice())
    }

    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.keys().map(String::as_str).collect()
    }

    /// Name of the first tier listing `instrument`.
    pub fn tier_of(&self, instrument: &str) -> Option<&str> {
        self.tiers
            .iter()
            .find(|(_, t)| t.instruments.iter().any(|i| i == instrument))
            .map(|(name, _)| name.as_str())
    }

    pub fn instrument_count(&self) -> usize {
        self.all_instruments().len()
    }

    /// Built-in universe: the reference-backed priority list plus the
    /// portfolio follow-up list.
    pub fn default_us() -> Self {
        let tier = |description: &str, ids: &[&str]| Tier {
            description: description.to_string(),
            instruments: ids.iter().map(|s| s.to_string()).collect(),
        };

        let mut tiers = BTreeMap::new();
        tiers.insert(
            "tier1".to_string(),
            tier(
                "Priority list; includes every instrument with a reference spreadsheet",
                &[
                    "AAPL", "TSLA", "AMZN", "MSFT", "GOOGL", "NVDA", "RCL", "ASML", "AMD", "WMT",
                    "SBUX", "NFLX", "COIN", "DAKT", "KEN", "CVX",
                ],
            ),
        );
        tiers.insert(
            "tier2".to_string(),
            tier(
                "Portfolio instruments, fetched after tier 1 validates",
                &[
                    "AFRM", "ARKK", "AXON", "BILL", "BROS", "CELH", "CHPT", "CHWY", "CRSP",
                    "CRWD", "CVNA", "DDOG", "DELL", "DIS", "DUOL", "ENPH", "F", "FCX", "FLEX",
                    "FSLR", "FTNT", "GILD", "GM", "GRAB", "GRMN", "GTLB", "HLT", "HOOD", "HPQ",
                    "HUBS", "IONQ", "JBLU", "JD", "KLAC", "LEN", "LRCX", "LUV", "LYFT", "META",
                    "MU", "NET", "NIO", "NOW", "OKTA", "ON", "PANW", "PAYC", "PINS", "PLTR",
                    "PSKY", "PYPL", "QCOM", "RIVN", "ROKU", "SE", "SHOP", "SNAP", "SNOW", "SOFI",
                    "TEVA", "TGT", "TOST", "TTD", "TWLO", "U", "UBER", "UPST", "VRT", "WDAY",
                    "WFC", "XYZ", "ZM", "ZS",
                ],
            ),
        );
        Self { tiers }
    }
}
