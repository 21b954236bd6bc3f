//! Envelope, WKT and containment helpers for country geometry.
use geo::{Intersects, LineString, MultiPolygon, Point, Polygon};
use poi_explorer_data::RawGeometry;
use serde_json::Value;

pub(crate) type Ring = Vec<[f64; 2]>;
/// Exterior ring followed by any holes.
pub(crate) type PolygonRings = Vec<Ring>;

/// Supported polygonal geometry, parsed from the raw GeoJSON tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Polygonal {
    Polygon(PolygonRings),
    MultiPolygon(Vec<PolygonRings>),
}

impl Polygonal {
    pub(crate) fn parse(geometry: &RawGeometry) -> Option<Self> {
        match geometry.kind.as_str() {
            "Polygon" => parse_polygon(&geometry.coordinates).map(Self::Polygon),
            "MultiPolygon" => geometry
                .coordinates
                .as_array()?
                .iter()
                .map(parse_polygon)
                .collect::<Option<Vec<_>>>()
                .filter(|polygons| !polygons.is_empty())
                .map(Self::MultiPolygon),
            _ => None,
        }
    }

    pub(crate) fn into_polygons(self) -> Vec<PolygonRings> {
        match self {
            Self::Polygon(rings) => vec![rings],
            Self::MultiPolygon(polygons) => polygons,
        }
    }

    pub(crate) fn to_wkt(&self) -> String {
        match self {
            Self::Polygon(rings) => format!("POLYGON {}", polygon_wkt(rings)),
            Self::MultiPolygon(polygons) => format!(
                "MULTIPOLYGON ({})",
                polygons
                    .iter()
                    .map(polygon_wkt)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

fn parse_position(value: &Value) -> Option<[f64; 2]> {
    let items = value.as_array()?;
    Some([items.first()?.as_f64()?, items.get(1)?.as_f64()?])
}

fn parse_polygon(value: &Value) -> Option<PolygonRings> {
    let rings = value
        .as_array()?
        .iter()
        .map(|ring| ring.as_array()?.iter().map(parse_position).collect::<Option<Ring>>())
        .collect::<Option<Vec<_>>>()?;
    (!rings.is_empty() && rings.iter().all(|ring| !ring.is_empty())).then_some(rings)
}

fn ring_wkt(ring: &Ring) -> String {
    let points = ring
        .iter()
        .map(|[x, y]| format!("{x} {y}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("({points})")
}

fn polygon_wkt(rings: &PolygonRings) -> String {
    let rings = rings.iter().map(ring_wkt).collect::<Vec<_>>().join(", ");
    format!("({rings})")
}

/// `(xmin, xmax, ymin, ymax)` over every coordinate pair nested anywhere in `coordinates`.
pub(crate) fn envelope(coordinates: &Value) -> Option<(f64, f64, f64, f64)> {
    let mut extent: Option<(f64, f64, f64, f64)> = None;
    visit_positions(coordinates, &mut |x, y| {
        extent = Some(match extent {
            None => (x, x, y, y),
            Some((xmin, xmax, ymin, ymax)) => (xmin.min(x), xmax.max(x), ymin.min(y), ymax.max(y)),
        });
    });
    extent
}

fn visit_positions<F: FnMut(f64, f64)>(value: &Value, visit: &mut F) {
    let Value::Array(items) = value else {
        return;
    };
    match (
        items.first().and_then(Value::as_f64),
        items.get(1).and_then(Value::as_f64),
    ) {
        (Some(x), Some(y)) => visit(x, y),
        _ => {
            for item in items {
                visit_positions(item, visit);
            }
        }
    }
}

/// Precise spatial constraint for country searches.
#[derive(Debug, Clone)]
pub struct PolygonConstraint {
    wkt: String,
    shape: MultiPolygon<f64>,
}

impl PolygonConstraint {
    pub(crate) fn new(wkt: String, polygons: &[PolygonRings]) -> Self {
        let to_line = |ring: &Ring| LineString::from(ring.iter().map(|[x, y]| (*x, *y)).collect::<Vec<_>>());
        let shape = MultiPolygon(
            polygons
                .iter()
                .filter_map(|rings| {
                    let (exterior, holes) = rings.split_first()?;
                    Some(Polygon::new(to_line(exterior), holes.iter().map(to_line).collect()))
                })
                .collect(),
        );
        Self { wkt, shape }
    }

    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    /// Whether the point intersects the polygon: interior or boundary, holes excluded.
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        self.shape.intersects(&Point::new(longitude, latitude))
    }
}
