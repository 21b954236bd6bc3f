use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::CountryBoundary;
use crate::error::Result;

const BOUNDARY_DIR: &str = "boundaries";

#[derive(Debug, Serialize, Deserialize)]
struct CachedBoundary {
    cached_at: DateTime<Utc>,
    boundary: CountryBoundary,
}

/// On-disk store of computed boundaries, one JSON file per lookup key.
///
/// Entries never expire. Writes go through a temporary file and an atomic rename, so
/// two processes computing the same code concurrently leave one complete file behind.
#[derive(Debug, Clone)]
pub struct DurableBoundaryCache {
    dir: PathBuf,
}

impl DurableBoundaryCache {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let dir = root.as_ref().join(BOUNDARY_DIR);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_stem: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("{file_stem}.json"))
    }

    /// A previously stored boundary. Unreadable entries count as misses.
    pub fn load(&self, key: &str) -> Option<CountryBoundary> {
        let path = self.path_for(key);
        let text = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<CachedBoundary>(&text) {
            Ok(cached) => {
                debug!(key, cached_at = %cached.cached_at, "Durable boundary cache hit");
                Some(cached.boundary)
            }
            Err(e) => {
                warn!(key, path = ?path, error = %e, "Ignoring corrupt boundary cache entry");
                None
            }
        }
    }

    pub fn store(&self, key: &str, boundary: &CountryBoundary) -> Result<()> {
        let entry = CachedBoundary {
            cached_at: Utc::now(),
            boundary: boundary.clone(),
        };
        let mut file = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut file, &entry)?;
        file.flush()?;
        file.persist(self.path_for(key)).map_err(|e| e.error)?;
        debug!(key, "Stored boundary in durable cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use poi_explorer_data::{boundaries::parse_feature_collection, test_data::sample_boundaries_geojson};

    use super::*;

    fn france() -> CountryBoundary {
        let features = parse_feature_collection(&sample_boundaries_geojson()).unwrap();
        let feature = features
            .iter()
            .find(|f| f.iso_codes().iter().any(|c| c == "FR"))
            .unwrap();
        CountryBoundary::from_feature(feature).unwrap()
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = DurableBoundaryCache::open(dir.path()).unwrap();
        assert!(cache.load("FR").is_none());

        let boundary = france();
        cache.store("FR", &boundary).unwrap();
        assert_eq!(cache.load("FR"), Some(boundary));
        assert!(cache.dir().join("FR.json").exists());
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = DurableBoundaryCache::open(dir.path()).unwrap();
        fs::write(cache.dir().join("FR.json"), "{not json").unwrap();
        assert!(cache.load("FR").is_none());

        cache.store("FR", &france()).unwrap();
        assert!(cache.load("FR").is_some(), "a fresh store replaces the corrupt file");
    }
}
