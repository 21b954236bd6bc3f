//! Country boundary resolution.
//!
//! [`BoundaryProvider`] turns an ISO country code into a [`CountryBoundary`]: the
//! envelope used for the engine's coarse spatial predicate and the WKT polygon used for
//! precise containment. The boundary dataset is fetched at most once per provider, and
//! computed boundaries are kept both in memory and in a [`DurableBoundaryCache`].
use std::{
    collections::BTreeSet,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use poi_explorer_data::{BoundaryFeature, BoundarySource, boundaries::load_features};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

mod cache;
mod geometry;

pub use cache::DurableBoundaryCache;
pub use geometry::PolygonConstraint;
use geometry::{PolygonRings, Polygonal, envelope};

use crate::{
    error::{PoiError, Result},
    model::BoundingBox,
};

static ISO_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2,3}$").expect("valid regex"));
static COUNTRY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}][\p{L} .,'()\-]*$").expect("valid regex"));

/// Geometry of a single country. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryBoundary {
    iso_codes: BTreeSet<String>,
    name: Option<String>,
    bbox: BoundingBox,
    polygon_wkt: String,
    polygons: Vec<PolygonRings>,
}

impl CountryBoundary {
    /// Compute the envelope and WKT of a boundary feature.
    ///
    /// Features whose geometry is not a Polygon or MultiPolygon still get an envelope, but
    /// an empty WKT, which disables the polygon constraint for them.
    pub fn from_feature(feature: &BoundaryFeature) -> Result<Self> {
        let label = feature
            .name()
            .or_else(|| feature.iso_a2())
            .unwrap_or_else(|| "<unnamed>".to_string());
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or_else(|| PoiError::NotFound(format!("boundary '{label}' has no geometry")))?;
        let (xmin, xmax, ymin, ymax) = envelope(&geometry.coordinates)
            .ok_or_else(|| PoiError::NotFound(format!("boundary '{label}' has no coordinates")))?;
        let bbox = BoundingBox::new(xmin, xmax, ymin, ymax)?;

        let (polygon_wkt, polygons) = match Polygonal::parse(geometry) {
            Some(polygonal) => (polygonal.to_wkt(), polygonal.into_polygons()),
            None => {
                warn!(country = %label, kind = %geometry.kind, "Unsupported boundary geometry, polygon constraint disabled");
                (String::new(), Vec::new())
            }
        };

        Ok(Self {
            iso_codes: feature.iso_codes().into_iter().collect(),
            name: feature.name(),
            bbox,
            polygon_wkt,
            polygons,
        })
    }

    pub fn iso_codes(&self) -> &BTreeSet<String> {
        &self.iso_codes
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn polygon_wkt(&self) -> &str {
        &self.polygon_wkt
    }

    /// The precise containment test, absent when the WKT is empty.
    pub fn polygon_constraint(&self) -> Option<PolygonConstraint> {
        (!self.polygon_wkt.is_empty())
            .then(|| PolygonConstraint::new(self.polygon_wkt.clone(), &self.polygons))
    }
}

/// Normalized cache key for a country code or name.
fn normalize_code(code: &str) -> Result<String> {
    let key = code.trim().to_uppercase();
    if ISO_CODE.is_match(&key) || COUNTRY_NAME.is_match(&key) {
        Ok(key)
    } else {
        Err(PoiError::InvalidParameters(format!(
            "'{code}' is not an ISO country code or country name"
        )))
    }
}

fn matches_feature(feature: &BoundaryFeature, key: &str) -> bool {
    feature.iso_codes().iter().any(|c| c == key)
}

fn matches_name(feature: &BoundaryFeature, key: &str) -> bool {
    feature.name().is_some_and(|name| name.to_uppercase() == key)
}

/// Resolves country codes to boundaries, loading the boundary dataset lazily.
///
/// Construct one per process and share it by reference; it owns every cache it uses.
pub struct BoundaryProvider {
    source: BoundarySource,
    features: OnceCell<Vec<BoundaryFeature>>,
    memory: RwLock<HashMap<String, Arc<CountryBoundary>>>,
    durable: Option<DurableBoundaryCache>,
    dataset_loads: AtomicUsize,
}

impl BoundaryProvider {
    pub fn new(source: BoundarySource, durable: Option<DurableBoundaryCache>) -> Self {
        Self {
            source,
            features: OnceCell::new(),
            memory: RwLock::new(HashMap::new()),
            durable,
            dataset_loads: AtomicUsize::new(0),
        }
    }

    /// Provider without a durable cache.
    pub fn in_memory(source: BoundarySource) -> Self {
        Self::new(source, None)
    }

    /// How many times the boundary dataset has been fetched.
    pub fn dataset_loads(&self) -> usize {
        self.dataset_loads.load(Ordering::Relaxed)
    }

    /// Keys currently held in the in-memory cache, sorted.
    pub fn cached_codes(&self) -> Vec<String> {
        let memory = self.memory.read().unwrap_or_else(PoisonError::into_inner);
        let mut codes: Vec<String> = memory.keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Drop the in-memory caches; the durable cache is left alone.
    pub fn clear(&self) {
        self.memory
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn cached(&self, key: &str) -> Option<Arc<CountryBoundary>> {
        self.memory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// The lookup key plus every ISO code of the boundary, deduplicated.
    fn keys_for<'a>(key: &'a str, boundary: &'a CountryBoundary) -> BTreeSet<&'a str> {
        let mut keys: BTreeSet<&str> = boundary.iso_codes().iter().map(String::as_str).collect();
        keys.insert(key);
        keys
    }

    fn remember(&self, key: &str, boundary: &Arc<CountryBoundary>) {
        let mut memory = self.memory.write().unwrap_or_else(PoisonError::into_inner);
        for code in Self::keys_for(key, boundary) {
            memory.insert(code.to_string(), Arc::clone(boundary));
        }
    }

    async fn features(&self) -> Result<&[BoundaryFeature]> {
        let features = self
            .features
            .get_or_try_init(|| async {
                self.dataset_loads.fetch_add(1, Ordering::Relaxed);
                info!(source = %self.source, "Loading boundary dataset");
                load_features(&self.source).await.map_err(PoiError::from)
            })
            .await?;
        Ok(features.as_slice())
    }

    /// Resolve `code` (ISO alpha-2/alpha-3, case-insensitive, or a country name).
    ///
    /// Fails with [`PoiError::NotFound`] when no feature matches.
    #[instrument(name = "Resolve country boundary", skip(self), level = "debug")]
    pub async fn lookup(&self, code: &str) -> Result<Arc<CountryBoundary>> {
        let key = normalize_code(code)?;

        if let Some(boundary) = self.cached(&key) {
            debug!(key, "In-memory boundary cache hit");
            return Ok(boundary);
        }

        if let Some(boundary) = self.durable.as_ref().and_then(|d| d.load(&key)) {
            let boundary = Arc::new(boundary);
            self.remember(&key, &boundary);
            return Ok(boundary);
        }

        let features = self.features().await?;
        let feature = features
            .iter()
            .find(|f| matches_feature(f, &key))
            .or_else(|| features.iter().find(|f| matches_name(f, &key)))
            .ok_or_else(|| {
                PoiError::NotFound(format!("no boundary feature matches country code '{code}'"))
            })?;

        let boundary = Arc::new(CountryBoundary::from_feature(feature)?);
        info!(key, bbox = %boundary.bbox(), "Computed country boundary");

        if let Some(durable) = &self.durable {
            for code in Self::keys_for(&key, &boundary) {
                if let Err(e) = durable.store(code, &boundary) {
                    warn!(key = code, error = %e, "Failed to persist boundary, continuing with in-memory copy");
                }
            }
        }
        self.remember(&key, &boundary);
        Ok(boundary)
    }
}

#[cfg(test)]
mod tests {
    use poi_explorer_data::test_data::sample_boundaries_geojson;

    use super::*;

    fn provider() -> BoundaryProvider {
        BoundaryProvider::in_memory(BoundarySource::GeoJson(sample_boundaries_geojson()))
    }

    #[tokio::test]
    async fn test_lookup_italy_envelope() {
        let boundary = provider().lookup("IT").await.unwrap();
        let bbox = boundary.bbox();

        assert_eq!(bbox.west(), 6.6);
        assert_eq!(bbox.east(), 18.5);
        assert_eq!(bbox.south(), 36.6);
        assert_eq!(bbox.north(), 47.1);
        assert!(boundary.polygon_wkt().starts_with("MULTIPOLYGON ((("));
        assert_eq!(boundary.name(), Some("Italy"));
        assert!(boundary.iso_codes().contains("ITA"));
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive_across_alpha2_and_alpha3() {
        let provider = provider();
        let a2 = provider.lookup("it").await.unwrap();
        let a3 = provider.lookup(" Ita ").await.unwrap();
        assert_eq!(a2, a3);
    }

    #[tokio::test]
    async fn test_lookup_is_idempotent_without_refetch() {
        let provider = provider();
        let first = provider.lookup("FR").await.unwrap();
        let second = provider.lookup("FR").await.unwrap();

        assert_eq!(first.bbox(), second.bbox());
        assert_eq!(first.polygon_wkt(), second.polygon_wkt());
        assert_eq!(provider.dataset_loads(), 1);

        provider.lookup("US").await.unwrap();
        assert_eq!(provider.dataset_loads(), 1, "dataset is fetched once per provider");
    }

    #[tokio::test]
    async fn test_lookup_by_name() {
        let boundary = provider().lookup("france").await.unwrap();
        assert!(boundary.iso_codes().contains("FR"));
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let provider = provider();
        let err = provider.lookup("ZZ").await.unwrap_err();
        assert!(matches!(err, PoiError::NotFound(_)));

        let err = provider.lookup("ZZ").await.unwrap_err();
        assert!(matches!(err, PoiError::NotFound(_)));
        assert_eq!(provider.dataset_loads(), 1);
    }

    #[tokio::test]
    async fn test_invalid_code() {
        let err = provider().lookup("I1").await.unwrap_err();
        assert!(matches!(err, PoiError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_unsupported_geometry_disables_polygon() {
        let boundary = provider().lookup("XP").await.unwrap();
        assert_eq!(boundary.polygon_wkt(), "");
        assert!(boundary.polygon_constraint().is_none());
    }

    #[tokio::test]
    async fn test_durable_cache_survives_new_provider() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = BoundarySource::GeoJson(sample_boundaries_geojson());

        let first = BoundaryProvider::new(
            source.clone(),
            Some(DurableBoundaryCache::open(dir.path()).unwrap()),
        );
        let computed = first.lookup("ITA").await.unwrap();
        assert_eq!(first.dataset_loads(), 1);

        let second = BoundaryProvider::new(source, Some(DurableBoundaryCache::open(dir.path()).unwrap()));
        let cached = second.lookup("ita").await.unwrap();
        assert_eq!(second.dataset_loads(), 0, "durable hit skips the dataset fetch");
        assert_eq!(computed, cached);
        assert!(cached.polygon_constraint().is_some());
    }

    #[tokio::test]
    async fn test_durable_entry_serves_every_iso_code() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = BoundarySource::GeoJson(sample_boundaries_geojson());

        let first = BoundaryProvider::new(
            source.clone(),
            Some(DurableBoundaryCache::open(dir.path()).unwrap()),
        );
        first.lookup("ITA").await.unwrap();

        let second = BoundaryProvider::new(source, Some(DurableBoundaryCache::open(dir.path()).unwrap()));
        let boundary = second.lookup("it").await.unwrap();
        assert_eq!(second.dataset_loads(), 0, "alpha-2 lookup served from the alpha-3 lookup's entry");
        assert_eq!(boundary.name(), Some("Italy"));
    }

    #[tokio::test]
    async fn test_clear_keeps_loaded_dataset() {
        let provider = provider();
        provider.lookup("SI").await.unwrap();
        assert_eq!(provider.cached_codes(), vec!["SI", "SVN"]);

        provider.clear();
        assert!(provider.cached_codes().is_empty());
        provider.lookup("SI").await.unwrap();
        assert_eq!(provider.dataset_loads(), 1);
    }
}
