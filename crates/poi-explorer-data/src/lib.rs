//! Dataset plumbing for the POI explorer.
//!
//! Two datasets feed the search pipeline:
//! - the world boundary collection ([`boundaries`]), a GeoJSON file of country
//!   features fetched once per process and parsed into [`BoundaryFeature`]s;
//! - the place dataset ([`places`]), a large columnar table of POIs that is only
//!   ever scanned through a bounded, filtered [`polars::prelude::LazyFrame`].
use once_cell::sync::Lazy;
use std::path::PathBuf;
use tracing::warn;

pub mod boundaries;
pub mod places;
pub mod test_data;

static TEST_CACHE_DIR: Lazy<tempfile::TempDir> = Lazy::new(|| {
    tempfile::TempDir::new().expect("Failed to create global temporary cache directory")
});

pub const CACHE_DIR_DEFAULT: &str = "./poi_cache";
pub const CACHE_DIR_ENV: &str = "POI_EXPLORER_CACHE_DIR";

/// Global cache directory used for durable boundary lookups.
///
/// Resolution order: `POI_EXPLORER_CACHE_DIR`, the platform cache directory (with the
/// `system-dirs` feature), then [`CACHE_DIR_DEFAULT`]. Unit tests always get a temporary
/// directory so they never touch a developer's cache.
pub static CACHE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if cfg!(test) {
        let temp_dir = TEST_CACHE_DIR.path().to_path_buf();
        warn!(temp_dir = ?temp_dir, "Using temporary cache directory for tests");
        return temp_dir;
    }
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    system_cache_dir().unwrap_or_else(|| PathBuf::from(CACHE_DIR_DEFAULT))
});

#[cfg(feature = "system-dirs")]
fn system_cache_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "poi-explorer").map(|dirs| dirs.cache_dir().to_path_buf())
}

#[cfg(not(feature = "system-dirs"))]
fn system_cache_dir() -> Option<PathBuf> {
    None
}

mod error {
    use polars::prelude::PolarsError;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum DataError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Polars error: {0}")]
        Polars(#[from] PolarsError),
        #[cfg(feature = "download_boundaries")]
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("Serialization error: {0}")]
        Serde(#[from] serde_json::Error),
        #[error("Invalid GeoJSON: {0}")]
        InvalidGeoJson(String),
        #[error("Place dataset is missing required column '{0}'")]
        MissingColumn(String),
        #[error("Downloading '{0}' requires the download_boundaries feature")]
        DownloadDisabled(String),
    }

    pub type Result<T> = std::result::Result<T, DataError>;
}

pub use error::{DataError, Result};

pub use boundaries::{BoundaryFeature, BoundarySource, RawGeometry, WORLD_BOUNDARIES_URL};
pub use places::PlaceDataset;
