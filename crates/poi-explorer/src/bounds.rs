//! Turns a query's search area into the box and polygon the coarse filter works with.
use tracing::debug;

use crate::{
    boundary::{BoundaryProvider, PolygonConstraint},
    error::{PoiError, Result},
    model::{BoundingBox, SearchArea},
};

/// Kilometres per degree of latitude, the flat approximation used for radius windows.
pub const KM_PER_DEGREE: f64 = 111.0;

/// The spatial window a search runs in.
#[derive(Debug, Clone)]
pub struct ResolvedBounds {
    pub bbox: BoundingBox,
    pub polygon: Option<PolygonConstraint>,
}

/// Square window of `radius_km` around a point.
///
/// The offset is the same in both axes and the window is clamped to valid coordinates.
pub fn coordinate_bbox(latitude: f64, longitude: f64, radius_km: f64) -> Result<BoundingBox> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(PoiError::InvalidParameters(format!(
            "radius must be a positive number of kilometres, got {radius_km}"
        )));
    }
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(PoiError::InvalidParameters(format!(
            "coordinate ({latitude}, {longitude}) is out of range"
        )));
    }
    let offset = radius_km / KM_PER_DEGREE;
    BoundingBox::new(
        (longitude - offset).max(-180.0),
        (longitude + offset).min(180.0),
        (latitude - offset).max(-90.0),
        (latitude + offset).min(90.0),
    )
}

/// Resolves search areas; country lookups go through the shared [`BoundaryProvider`].
pub struct BoundsResolver<'a> {
    boundaries: &'a BoundaryProvider,
}

impl<'a> BoundsResolver<'a> {
    pub fn new(boundaries: &'a BoundaryProvider) -> Self {
        Self { boundaries }
    }

    pub async fn resolve(&self, area: &SearchArea) -> Result<ResolvedBounds> {
        let resolved = match area {
            SearchArea::Coordinate {
                latitude,
                longitude,
                radius_km,
            } => ResolvedBounds {
                bbox: coordinate_bbox(*latitude, *longitude, *radius_km)?,
                polygon: None,
            },
            SearchArea::Country { code } => {
                let boundary = self.boundaries.lookup(code).await?;
                ResolvedBounds {
                    bbox: boundary.bbox(),
                    polygon: boundary.polygon_constraint(),
                }
            }
            SearchArea::Viewport(bbox) => ResolvedBounds {
                bbox: *bbox,
                polygon: None,
            },
        };
        debug!(mode = area.mode(), bbox = %resolved.bbox, polygon = resolved.polygon.is_some(), "Resolved search bounds");
        Ok(resolved)
    }
}
