//! World boundary dataset: country features with ISO identifiers and polygon geometry.
use std::{fmt, path::PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::{DataError, Result};

#[cfg(feature = "download_boundaries")]
mod fetch;

/// 110m Natural Earth country polygons, small enough to fetch once per process.
pub const WORLD_BOUNDARIES_URL: &str =
    "https://raw.githubusercontent.com/datasets/geo-boundaries-world-110m/master/countries.geojson";

const ISO_A2_KEYS: [&str; 3] = ["iso_a2", "iso_a2_eh", "iso_3166_1_alpha_2"];
const ISO_A3_KEYS: [&str; 4] = ["iso_a3", "iso_a3_eh", "adm0_a3", "iso_3166_1_alpha_3"];
const NAME_KEYS: [&str; 3] = ["name", "admin", "name_long"];

/// Where the boundary FeatureCollection comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundarySource {
    /// Fetched over HTTP (requires the `download_boundaries` feature).
    Url(String),
    /// Read from a GeoJSON file on disk.
    File(PathBuf),
    /// GeoJSON text held in memory.
    GeoJson(String),
}

impl fmt::Display for BoundarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::GeoJson(text) => write!(f, "inline GeoJSON ({} bytes)", text.len()),
        }
    }
}

impl Default for BoundarySource {
    fn default() -> Self {
        Self::Url(WORLD_BOUNDARIES_URL.to_string())
    }
}

/// Geometry exactly as it appears in the GeoJSON.
///
/// Coordinates stay an untyped JSON tree: consumers walk it recursively, so 3D
/// positions and unsupported geometry types still parse.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub coordinates: Value,
}

/// A single country feature.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoundaryFeature {
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<RawGeometry>,
}

impl BoundaryFeature {
    pub fn iso_a2(&self) -> Option<String> {
        self.property(&ISO_A2_KEYS)
    }

    pub fn iso_a3(&self) -> Option<String> {
        self.property(&ISO_A3_KEYS)
    }

    pub fn name(&self) -> Option<String> {
        self.property(&NAME_KEYS)
    }

    /// Upper-cased alpha-2 and alpha-3 identifiers carried by this feature.
    pub fn iso_codes(&self) -> Vec<String> {
        [self.iso_a2(), self.iso_a3()]
            .into_iter()
            .flatten()
            .map(|code| code.to_ascii_uppercase())
            .collect()
    }

    /// First usable value among `keys`, matched case-insensitively.
    ///
    /// Natural Earth marks missing codes as `-99`; those count as absent.
    fn property(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| {
            self.properties
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .and_then(|(_, v)| v.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty() && *v != "-99")
                .map(str::to_string)
        })
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<BoundaryFeature>,
}

/// Parse a GeoJSON `FeatureCollection` into boundary features.
pub fn parse_feature_collection(text: &str) -> Result<Vec<BoundaryFeature>> {
    let collection: FeatureCollection = serde_json::from_str(text)?;
    if collection.kind != "FeatureCollection" {
        return Err(DataError::InvalidGeoJson(format!(
            "expected a FeatureCollection, found '{}'",
            collection.kind
        )));
    }
    Ok(collection.features)
}

/// Load every boundary feature from `source`.
#[instrument(name = "Load boundary features", skip_all, level = "info")]
pub async fn load_features(source: &BoundarySource) -> Result<Vec<BoundaryFeature>> {
    let text = match source {
        BoundarySource::Url(url) => download(url).await?,
        BoundarySource::File(path) => {
            info!(path = ?path, "Reading boundary dataset from disk");
            tokio::fs::read_to_string(path).await?
        }
        BoundarySource::GeoJson(text) => text.clone(),
    };
    let features = parse_feature_collection(&text)?;
    info!(features = features.len(), "Boundary dataset loaded");
    Ok(features)
}

#[cfg(feature = "download_boundaries")]
async fn download(url: &str) -> Result<String> {
    fetch::download_to_string(&reqwest::Client::new(), url).await
}

#[cfg(not(feature = "download_boundaries"))]
#[allow(clippy::unused_async)]
async fn download(url: &str) -> Result<String> {
    Err(DataError::DownloadDisabled(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data;

    #[test]
    fn test_parse_sample_collection() {
        let features = parse_feature_collection(&test_data::sample_boundaries_geojson()).unwrap();
        assert!(features.len() >= 3);

        let italy = features
            .iter()
            .find(|f| f.iso_a2().as_deref() == Some("IT"))
            .expect("Italy should be in the sample boundaries");
        assert_eq!(italy.iso_a3().as_deref(), Some("ITA"));
        assert_eq!(italy.name().as_deref(), Some("Italy"));
        assert_eq!(italy.geometry.as_ref().unwrap().kind, "MultiPolygon");
    }

    #[test]
    fn test_missing_codes_are_absent() {
        let feature: BoundaryFeature = serde_json::from_value(serde_json::json!({
            "type": "Feature",
            "properties": { "ISO_A2": "-99", "ADM0_A3": "kos", "NAME": "Kosovo" },
            "geometry": null
        }))
        .unwrap();

        assert_eq!(feature.iso_a2(), None);
        assert_eq!(feature.iso_codes(), vec!["KOS".to_string()]);
        assert_eq!(feature.name().as_deref(), Some("Kosovo"));
        assert!(feature.geometry.is_none());
    }

    #[test]
    fn test_rejects_non_collection() {
        let result = parse_feature_collection(r#"{"type": "Feature", "properties": {}}"#);
        assert!(matches!(result, Err(DataError::InvalidGeoJson(_))));
    }

    #[tokio::test]
    async fn test_load_inline_and_file_sources() {
        let text = test_data::sample_boundaries_geojson();
        let inline = load_features(&BoundarySource::GeoJson(text.clone()))
            .await
            .unwrap();

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), &text).unwrap();
        let from_disk = load_features(&BoundarySource::File(file.path().to_path_buf()))
            .await
            .unwrap();

        assert_eq!(inline, from_disk);
    }
}
