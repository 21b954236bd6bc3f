//! Query, candidate and result types shared by every pipeline stage.
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    config::DEFAULT_LIMIT,
    error::{PoiError, Result, SearchErrorKind},
};

/// Axis-aligned longitude/latitude box with `west < east` and `south < north`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    west: f64,
    east: f64,
    south: f64,
    north: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct RawBoundingBox {
    west: f64,
    east: f64,
    south: f64,
    north: f64,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = PoiError;

    fn try_from(raw: RawBoundingBox) -> Result<Self> {
        Self::new(raw.west, raw.east, raw.south, raw.north)
    }
}

impl BoundingBox {
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Result<Self> {
        if ![west, east, south, north].iter().all(|v| v.is_finite()) {
            return Err(PoiError::InvalidParameters(format!(
                "bounding box values must be finite, got west={west} east={east} south={south} north={north}"
            )));
        }
        if west >= east || south >= north {
            return Err(PoiError::InvalidParameters(format!(
                "bounding box requires west < east and south < north, got west={west} east={east} south={south} north={north}"
            )));
        }
        Ok(Self {
            west,
            east,
            south,
            north,
        })
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    /// Whether the box `[xmin, xmax] x [ymin, ymax]` shares any area (or edge) with this one.
    pub fn overlaps(&self, xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> bool {
        xmax >= self.west && xmin <= self.east && ymax >= self.south && ymin <= self.north
    }

    pub fn contains_point(&self, longitude: f64, latitude: f64) -> bool {
        self.overlaps(longitude, longitude, latitude, latitude)
    }

    /// `true` when `other` lies entirely inside this box.
    pub fn encloses(&self, other: &Self) -> bool {
        other.west >= self.west
            && other.east <= self.east
            && other.south >= self.south
            && other.north <= self.north
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.4}, {:.4}] x [{:.4}, {:.4}]",
            self.west, self.east, self.south, self.north
        )
    }
}

/// The spatial region of a query; each variant carries exactly the fields its mode needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchArea {
    /// Square window of `radius_km` around a point.
    Coordinate {
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    },
    /// A country, by ISO alpha-2/alpha-3 code (or name).
    Country { code: String },
    /// The visible map area.
    Viewport(BoundingBox),
}

impl SearchArea {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Coordinate { .. } => "coordinate",
            Self::Country { .. } => "country",
            Self::Viewport(_) => "viewport",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub keyword: String,
    pub area: SearchArea,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>, area: SearchArea) -> Self {
        Self {
            keyword: keyword.into(),
            area,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn coordinate(
        keyword: impl Into<String>,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Self {
        Self::new(
            keyword,
            SearchArea::Coordinate {
                latitude,
                longitude,
                radius_km,
            },
        )
    }

    pub fn country(keyword: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(keyword, SearchArea::Country { code: code.into() })
    }

    pub fn viewport(keyword: impl Into<String>, bbox: BoundingBox) -> Self {
        Self::new(keyword, SearchArea::Viewport(bbox))
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Same keyword and limit, restricted to a new viewport.
    pub fn requery(&self, bbox: BoundingBox) -> Self {
        Self {
            keyword: self.keyword.clone(),
            area: SearchArea::Viewport(bbox),
            limit: self.limit,
        }
    }

    /// Checks the parts of the query that do not need any I/O.
    pub fn validate(&self) -> Result<()> {
        if self.keyword.trim().is_empty() {
            return Err(PoiError::InvalidParameters(
                "keyword must not be empty".to_string(),
            ));
        }
        if self.limit == 0 {
            return Err(PoiError::InvalidParameters(
                "limit must be at least 1".to_string(),
            ));
        }
        if let SearchArea::Country { code } = &self.area
            && code.trim().is_empty()
        {
            return Err(PoiError::InvalidParameters(
                "country mode requires a country code".to_string(),
            ));
        }
        Ok(())
    }
}

/// Viewport box as sent by map clients.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ViewportBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// Loosely-typed search request, as a JSON client would send it.
///
/// Every mode-specific field is optional here; converting into a [`SearchQuery`] checks
/// that the fields required by `mode` are present.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub keyword: String,
    pub mode: String,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Radius in kilometres.
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default)]
    pub bbox: Option<ViewportBox>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl TryFrom<SearchRequest> for SearchQuery {
    type Error = PoiError;

    fn try_from(request: SearchRequest) -> Result<Self> {
        let missing = |fields: &str| {
            PoiError::InvalidParameters(format!(
                "{} mode requires {fields}",
                request.mode.to_lowercase()
            ))
        };
        let area = match request.mode.to_lowercase().as_str() {
            "coordinate" => match (request.latitude, request.longitude, request.radius) {
                (Some(latitude), Some(longitude), Some(radius_km)) => SearchArea::Coordinate {
                    latitude,
                    longitude,
                    radius_km,
                },
                _ => return Err(missing("latitude, longitude and radius")),
            },
            "country" => match request.country_code.as_deref().map(str::trim) {
                Some(code) if !code.is_empty() => SearchArea::Country {
                    code: code.to_string(),
                },
                _ => return Err(missing("a country_code")),
            },
            "viewport" | "bbox" => match request.bbox {
                Some(b) => SearchArea::Viewport(BoundingBox::new(b.west, b.east, b.south, b.north)?),
                None => return Err(missing("a bbox")),
            },
            other => {
                return Err(PoiError::InvalidParameters(format!(
                    "unknown search mode '{other}'"
                )));
            }
        };
        Ok(Self {
            keyword: request.keyword,
            area,
            limit: request.limit,
        })
    }
}

/// A raw row returned by the query engine.
///
/// Every field beyond `id` defaults, so sparse rows never fail to materialize.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateRecord {
    pub id: String,
    pub primary_name: String,
    pub primary_category: Option<String>,
    pub alternate_categories: Vec<String>,
    /// Leaf taxonomy term; not always repeated in `taxonomy_hierarchy`.
    pub taxonomy_primary: Option<String>,
    pub taxonomy_hierarchy: Vec<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// ISO code of the country the place is in, when the dataset knows it.
    pub country: Option<String>,
    /// Address payload, passed through untouched.
    pub raw_address: Option<String>,
    pub confidence: Option<f64>,
    /// Fast-metric score the record passed the coarse filter with.
    pub coarse_score: f64,
}

impl CandidateRecord {
    /// Text fields matched against the keyword, in a fixed order.
    pub fn text_fields(&self, include_taxonomy: bool) -> impl Iterator<Item = &str> {
        let (taxonomy_primary, taxonomy): (Option<&str>, &[String]) = if include_taxonomy {
            (self.taxonomy_primary.as_deref(), self.taxonomy_hierarchy.as_slice())
        } else {
            (None, &[][..])
        };
        std::iter::once(self.primary_name.as_str())
            .chain(self.primary_category.as_deref())
            .chain(self.alternate_categories.iter().map(String::as_str))
            .chain(taxonomy_primary)
            .chain(taxonomy.iter().map(String::as_str))
    }
}

/// A candidate with its strict similarity score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPoi {
    #[serde(flatten)]
    pub record: CandidateRecord,
    pub similarity_score: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResult {
    /// Matches sorted by descending score, at most `limit` of them.
    pub pois: Vec<ScoredPoi>,
    /// Candidates returned by the coarse filter.
    pub total_candidates: usize,
    /// Candidates at or above the strict threshold, before truncation.
    pub filtered_count: usize,
    pub bbox_used: Option<BoundingBox>,
    pub unique_country_count: usize,
    pub trace: Vec<String>,
    /// Set when the search failed; `pois` is then empty.
    pub error: Option<SearchErrorKind>,
}

impl SearchResult {
    pub(crate) fn failed(error: &PoiError, bbox_used: Option<BoundingBox>, mut trace: SearchTrace) -> Self {
        trace.push(format!("❌ Search failed: {error}"));
        Self {
            bbox_used,
            trace: trace.into_inner(),
            error: Some(error.kind()),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Append-only, human-readable progress log attached to each result.
#[derive(Debug, Clone, Default)]
pub(crate) struct SearchTrace(Vec<String>);

impl SearchTrace {
    pub(crate) fn push(&mut self, entry: impl Into<String>) {
        let entry = entry.into();
        info!(target: "poi_explorer::trace", "{entry}");
        self.0.push(entry);
    }

    pub(crate) fn into_inner(self) -> Vec<String> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_invariant() {
        assert!(BoundingBox::new(-1.0, 1.0, -1.0, 1.0).is_ok());
        assert!(BoundingBox::new(1.0, 1.0, -1.0, 1.0).is_err());
        assert!(BoundingBox::new(-1.0, 1.0, 2.0, 1.0).is_err());
        assert!(BoundingBox::new(f64::NAN, 1.0, -1.0, 1.0).is_err());
    }

    #[test]
    fn test_bounding_box_deserialize_validates() {
        let ok: BoundingBox =
            serde_json::from_str(r#"{"west": 2.2, "east": 2.5, "south": 48.8, "north": 48.9}"#)
                .unwrap();
        assert_eq!(ok.west(), 2.2);

        let bad = serde_json::from_str::<BoundingBox>(
            r#"{"west": 2.5, "east": 2.2, "south": 48.8, "north": 48.9}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_overlap_is_inclusive() {
        let bbox = BoundingBox::new(0.0, 10.0, 0.0, 10.0).unwrap();
        assert!(bbox.overlaps(10.0, 12.0, 5.0, 5.0));
        assert!(bbox.contains_point(0.0, 0.0));
        assert!(!bbox.overlaps(10.1, 12.0, 5.0, 5.0));
        assert!(!bbox.contains_point(5.0, -0.1));
    }

    #[test]
    fn test_request_conversion() {
        let request: SearchRequest = serde_json::from_value(serde_json::json!({
            "keyword": "pizza",
            "mode": "coordinate",
            "latitude": 40.7128,
            "longitude": -74.006,
            "radius": 10.0
        }))
        .unwrap();
        let query = SearchQuery::try_from(request).unwrap();
        assert_eq!(query.limit, DEFAULT_LIMIT);
        assert_eq!(query.area.mode(), "coordinate");

        let request: SearchRequest = serde_json::from_value(serde_json::json!({
            "keyword": "pizza",
            "mode": "viewport",
            "bbox": {"north": 41.0, "south": 40.0, "east": -73.0, "west": -74.0},
            "limit": 5
        }))
        .unwrap();
        let query = SearchQuery::try_from(request).unwrap();
        assert_eq!(query.limit, 5);
        assert!(matches!(query.area, SearchArea::Viewport(b) if b.north() == 41.0));
    }

    #[test]
    fn test_request_missing_mode_fields() {
        let request: SearchRequest = serde_json::from_value(serde_json::json!({
            "keyword": "pizza",
            "mode": "coordinate",
            "latitude": 40.7128
        }))
        .unwrap();
        let err = SearchQuery::try_from(request).unwrap_err();
        assert!(matches!(err, PoiError::InvalidParameters(_)));

        let request: SearchRequest = serde_json::from_value(serde_json::json!({
            "keyword": "pizza",
            "mode": "country",
            "country_code": "  "
        }))
        .unwrap();
        assert!(SearchQuery::try_from(request).is_err());
    }

    #[test]
    fn test_text_fields_order() {
        let record = CandidateRecord {
            primary_name: "Pizza Roma".to_string(),
            primary_category: Some("pizza".to_string()),
            alternate_categories: vec!["italian_restaurant".to_string()],
            taxonomy_primary: Some("pizza_restaurant".to_string()),
            taxonomy_hierarchy: vec!["food_and_drink".to_string()],
            ..Default::default()
        };
        let all: Vec<&str> = record.text_fields(true).collect();
        assert_eq!(
            all,
            ["Pizza Roma", "pizza", "italian_restaurant", "pizza_restaurant", "food_and_drink"]
        );
        assert_eq!(record.text_fields(false).count(), 3);
    }

    #[test]
    fn test_query_validation() {
        assert!(SearchQuery::country("pizza", "IT").validate().is_ok());
        assert!(SearchQuery::country(" ", "IT").validate().is_err());
        assert!(SearchQuery::country("pizza", "IT").with_limit(0).validate().is_err());
    }
}
