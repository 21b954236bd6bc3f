use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, info};

use crate::{DataError, Result};

/// Column names of the place dataset.
///
/// The layout mirrors a flattened Overture `places` release: one row per POI with a
/// precomputed bounding box so the spatial predicate never has to decode geometry.
pub mod columns {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const CATEGORY: &str = "category";
    pub const ALTERNATE_CATEGORIES: &str = "alternate_categories";
    pub const TAXONOMY_PRIMARY: &str = "taxonomy_primary";
    pub const TAXONOMY_HIERARCHY: &str = "taxonomy_hierarchy";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const BBOX_XMIN: &str = "bbox_xmin";
    pub const BBOX_XMAX: &str = "bbox_xmax";
    pub const BBOX_YMIN: &str = "bbox_ymin";
    pub const BBOX_YMAX: &str = "bbox_ymax";
    pub const COUNTRY: &str = "country";
    pub const ADDRESS: &str = "address";
    pub const CONFIDENCE: &str = "confidence";
}

/// Columns every place dataset must provide; all others default when absent.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    columns::ID,
    columns::NAME,
    columns::LATITUDE,
    columns::LONGITUDE,
    columns::BBOX_XMIN,
    columns::BBOX_XMAX,
    columns::BBOX_YMIN,
    columns::BBOX_YMAX,
];

/// Columns projected out of the dataset for each candidate row.
pub const CANDIDATE_COLUMNS: [&str; 11] = [
    columns::ID,
    columns::NAME,
    columns::CATEGORY,
    columns::ALTERNATE_CATEGORIES,
    columns::TAXONOMY_PRIMARY,
    columns::TAXONOMY_HIERARCHY,
    columns::LATITUDE,
    columns::LONGITUDE,
    columns::COUNTRY,
    columns::ADDRESS,
    columns::CONFIDENCE,
];

/// The columnar place dataset, never materialized in full.
#[derive(Debug, Clone)]
pub enum PlaceDataset {
    /// Parquet file (or glob) scanned lazily.
    Parquet(PathBuf),
    /// Frame already held in memory, mostly for tests and demos.
    InMemory(DataFrame),
}

impl PlaceDataset {
    pub fn parquet(path: impl AsRef<Path>) -> Self {
        Self::Parquet(path.as_ref().to_path_buf())
    }

    /// A lazy scan over the dataset; nothing is read until the plan is collected.
    pub fn lazy(&self) -> Result<LazyFrame> {
        match self {
            Self::Parquet(path) => {
                debug!(path = ?path, "Scanning place parquet");
                Ok(LazyFrame::scan_parquet(path, Default::default())?)
            }
            Self::InMemory(df) => Ok(df.clone().lazy()),
        }
    }

    /// Names of the candidate columns this dataset actually has.
    pub fn available_candidate_columns(&self) -> Result<Vec<&'static str>> {
        let schema = self.lazy()?.collect_schema()?;
        Ok(CANDIDATE_COLUMNS
            .into_iter()
            .filter(|name| schema.get(name).is_some())
            .collect())
    }

    /// Check the dataset exposes every [`REQUIRED_COLUMNS`] entry.
    pub fn validate_schema(&self) -> Result<()> {
        let schema = self.lazy()?.collect_schema()?;
        if let Some(missing) = REQUIRED_COLUMNS
            .into_iter()
            .find(|name| schema.get(name).is_none())
        {
            return Err(DataError::MissingColumn(missing.to_string()));
        }
        info!(columns = schema.len(), "Place dataset schema validated");
        Ok(())
    }
}
