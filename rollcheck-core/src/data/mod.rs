//! Market-data acquisition: providers, request governance, Parquet cache,
//! batch download, and the instrument universe.

pub mod cache;
pub mod download;
pub mod governor;
pub mod provider;
pub mod universe;
pub mod yahoo;

pub use cache::{CacheMeta, CacheStatus, CoverageResult, ParquetCache};
pub use download::{clean_bars, download_instruments, DownloadSummary};
pub use governor::RequestGovernor;
pub use provider::{
    DataError, DataProvider, DataSource, DownloadProgress, FetchResult, FixtureProvider,
    LogProgress,
};
pub use universe::{Tier, Universe, UniverseError};
pub use yahoo::YahooProvider;
