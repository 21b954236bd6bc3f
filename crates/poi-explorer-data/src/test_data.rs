//! Small, hand-placed datasets for tests and demos.
//!
//! The boundary polygons are coarse outlines; they only need to be accurate enough that
//! each sample place falls on the expected side of each border.
use polars::prelude::*;
use serde_json::json;
use tracing::info;

use crate::{Result, places::columns};

struct SamplePlace {
    id: &'static str,
    name: &'static str,
    category: Option<&'static str>,
    alternate: &'static [&'static str],
    taxonomy: &'static [&'static str],
    latitude: f64,
    longitude: f64,
    country: Option<&'static str>,
    address: Option<&'static str>,
    confidence: Option<f64>,
}

const RESTAURANT: &[&str] = &["food_and_drink", "restaurant"];
const PIZZA_TAXONOMY: &[&str] = &["food_and_drink", "restaurant", "pizza_restaurant"];

const SAMPLE_PLACES: &[SamplePlace] = &[
    SamplePlace {
        id: "it-caserta-1",
        name: "Pizzeria Caserta",
        category: Some("pizza_restaurant"),
        alternate: &["italian_restaurant", "pizza"],
        taxonomy: PIZZA_TAXONOMY,
        latitude: 41.07,
        longitude: 14.33,
        country: Some("IT"),
        address: Some(r#"{"locality":"Caserta","country":"IT"}"#),
        confidence: Some(0.93),
    },
    SamplePlace {
        id: "it-rome-1",
        name: "Pizza Roma",
        category: Some("pizza"),
        alternate: &[],
        taxonomy: RESTAURANT,
        latitude: 41.89,
        longitude: 12.50,
        country: Some("IT"),
        address: Some(r#"{"locality":"Roma","country":"IT"}"#),
        confidence: Some(0.88),
    },
    SamplePlace {
        id: "it-milan-1",
        name: "Pizzeria Milano",
        category: Some("pizza_restaurant"),
        alternate: &["pizza", "italian_restaurant"],
        taxonomy: PIZZA_TAXONOMY,
        latitude: 45.46,
        longitude: 9.19,
        country: Some("IT"),
        address: None,
        confidence: None,
    },
    SamplePlace {
        id: "it-milan-2",
        name: "Caffè Milano",
        category: Some("cafe"),
        alternate: &["coffee_shop"],
        taxonomy: &["food_and_drink", "cafe"],
        latitude: 45.47,
        longitude: 9.18,
        country: Some("IT"),
        address: None,
        confidence: Some(0.75),
    },
    SamplePlace {
        id: "it-palermo-1",
        name: "Pizzeria Palermo",
        category: Some("pizza_restaurant"),
        alternate: &["pizza"],
        taxonomy: &[],
        latitude: 37.90,
        longitude: 13.50,
        country: Some("IT"),
        address: None,
        confidence: Some(0.81),
    },
    SamplePlace {
        id: "si-ljubljana-1",
        name: "Pizzerija Ljubljana",
        category: Some("pizza_restaurant"),
        alternate: &["pizza"],
        taxonomy: PIZZA_TAXONOMY,
        latitude: 46.05,
        longitude: 14.50,
        country: Some("SI"),
        address: None,
        confidence: Some(0.9),
    },
    SamplePlace {
        id: "fr-paris-1",
        name: "Pizza Paris",
        category: Some("pizza"),
        alternate: &[],
        taxonomy: RESTAURANT,
        latitude: 48.86,
        longitude: 2.35,
        country: Some("FR"),
        address: Some(r#"{"locality":"Paris","country":"FR"}"#),
        confidence: Some(0.95),
    },
    SamplePlace {
        id: "fr-paris-2",
        name: "Boulangerie du Marais",
        category: Some("bakery"),
        alternate: &["patisserie"],
        taxonomy: &["food_and_drink", "bakery"],
        latitude: 48.857,
        longitude: 2.36,
        country: Some("FR"),
        address: None,
        confidence: None,
    },
    SamplePlace {
        id: "us-nyc-1",
        name: "Joe's Pizza",
        category: Some("pizza_restaurant"),
        alternate: &["pizza"],
        taxonomy: PIZZA_TAXONOMY,
        latitude: 40.7306,
        longitude: -73.9897,
        country: Some("US"),
        address: Some(r#"{"locality":"New York","country":"US"}"#),
        confidence: Some(0.97),
    },
    SamplePlace {
        id: "us-nyc-2",
        name: "Prince Street Pizza",
        category: Some("pizza_restaurant"),
        alternate: &["pizza"],
        taxonomy: PIZZA_TAXONOMY,
        latitude: 40.7231,
        longitude: -73.9945,
        country: Some("US"),
        address: None,
        confidence: Some(0.92),
    },
    SamplePlace {
        id: "us-nyc-3",
        name: "Katz's Delicatessen",
        category: Some("delicatessen"),
        alternate: &[],
        taxonomy: &[],
        latitude: 40.7223,
        longitude: -73.9874,
        country: None,
        address: None,
        confidence: None,
    },
    SamplePlace {
        id: "us-nyc-4",
        name: "Pizzeria",
        category: Some("italian_restaurant"),
        alternate: &[],
        taxonomy: RESTAURANT,
        latitude: 40.7150,
        longitude: -74.0010,
        country: Some("US"),
        address: None,
        confidence: Some(0.6),
    },
    SamplePlace {
        id: "us-boston-1",
        name: "Boston Pizza",
        category: Some("pizza"),
        alternate: &[],
        taxonomy: RESTAURANT,
        latitude: 42.3601,
        longitude: -71.0589,
        country: Some("US"),
        address: None,
        confidence: Some(0.8),
    },
];

fn str_list(items: &[&str]) -> Series {
    Series::new(PlSmallStr::EMPTY, items)
}

/// Sample place dataset covering Italy, Slovenia, France and the US east coast.
///
/// Each row's bounding box is the degenerate box around its point, which is how point
/// POIs appear in Overture releases. The primary taxonomy term is the hierarchy's leaf.
pub fn sample_places_df() -> Result<DataFrame> {
    info!(rows = SAMPLE_PLACES.len(), "Creating sample place dataset");

    let ids: Vec<&str> = SAMPLE_PLACES.iter().map(|p| p.id).collect();
    let names: Vec<&str> = SAMPLE_PLACES.iter().map(|p| p.name).collect();
    let categories: Vec<Option<&str>> = SAMPLE_PLACES.iter().map(|p| p.category).collect();
    let alternates: Vec<Series> = SAMPLE_PLACES.iter().map(|p| str_list(p.alternate)).collect();
    let taxonomy_primaries: Vec<Option<&str>> =
        SAMPLE_PLACES.iter().map(|p| p.taxonomy.last().copied()).collect();
    let taxonomies: Vec<Series> = SAMPLE_PLACES.iter().map(|p| str_list(p.taxonomy)).collect();
    let latitudes: Vec<f64> = SAMPLE_PLACES.iter().map(|p| p.latitude).collect();
    let longitudes: Vec<f64> = SAMPLE_PLACES.iter().map(|p| p.longitude).collect();
    let countries: Vec<Option<&str>> = SAMPLE_PLACES.iter().map(|p| p.country).collect();
    let addresses: Vec<Option<&str>> = SAMPLE_PLACES.iter().map(|p| p.address).collect();
    let confidences: Vec<Option<f64>> = SAMPLE_PLACES.iter().map(|p| p.confidence).collect();

    let df = DataFrame::new(vec![
        Column::new(columns::ID.into(), ids),
        Column::new(columns::NAME.into(), names),
        Column::new(columns::CATEGORY.into(), categories),
        Column::new(columns::ALTERNATE_CATEGORIES.into(), alternates),
        Column::new(columns::TAXONOMY_PRIMARY.into(), taxonomy_primaries),
        Column::new(columns::TAXONOMY_HIERARCHY.into(), taxonomies),
        Column::new(columns::LATITUDE.into(), latitudes.clone()),
        Column::new(columns::LONGITUDE.into(), longitudes.clone()),
        Column::new(columns::BBOX_XMIN.into(), longitudes.clone()),
        Column::new(columns::BBOX_XMAX.into(), longitudes),
        Column::new(columns::BBOX_YMIN.into(), latitudes.clone()),
        Column::new(columns::BBOX_YMAX.into(), latitudes),
        Column::new(columns::COUNTRY.into(), countries),
        Column::new(columns::ADDRESS.into(), addresses),
        Column::new(columns::CONFIDENCE.into(), confidences),
    ])?;
    Ok(df)
}

/// Sample boundary FeatureCollection.
///
/// Italy is a MultiPolygon (mainland plus Sicily) whose envelope is
/// `[6.6, 18.5] x [36.6, 47.1]`; Slovenia sits inside that envelope but outside the
/// Italian outline. `XP` carries a Point geometry to exercise unsupported types.
pub fn sample_boundaries_geojson() -> String {
    let italy_mainland = json!([[
        [6.6, 44.1], [7.0, 45.9], [10.5, 47.1], [12.4, 47.1], [13.7, 46.5],
        [13.7, 45.6], [12.3, 44.9], [13.6, 43.5], [16.2, 41.9], [18.5, 40.2],
        [16.6, 38.9], [15.6, 37.9], [15.9, 40.0], [12.2, 41.8], [10.2, 43.9],
        [8.8, 44.4], [6.6, 44.1]
    ]]);
    let sicily = json!([[
        [12.4, 37.8], [13.3, 38.2], [15.6, 38.3], [15.1, 36.6], [12.4, 37.8]
    ]]);
    let france = json!([[
        [-4.8, 48.4], [2.5, 51.1], [8.2, 49.0], [7.6, 43.8], [3.1, 42.4],
        [-1.8, 43.4], [-4.8, 48.4]
    ]]);
    let slovenia = json!([[
        [13.8, 45.4], [16.6, 45.4], [16.6, 46.9], [13.8, 46.9], [13.8, 45.4]
    ]]);
    let united_states = json!([[
        [-125.0, 24.5], [-66.9, 24.5], [-66.9, 49.4], [-125.0, 49.4], [-125.0, 24.5]
    ]]);

    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "Italy", "iso_a2": "IT", "iso_a3": "ITA" },
                "geometry": { "type": "MultiPolygon", "coordinates": [italy_mainland, sicily] }
            },
            {
                "type": "Feature",
                "properties": { "name": "France", "iso_a2": "FR", "iso_a3": "FRA" },
                "geometry": { "type": "Polygon", "coordinates": france }
            },
            {
                "type": "Feature",
                "properties": { "name": "Slovenia", "iso_a2": "SI", "iso_a3": "SVN" },
                "geometry": { "type": "Polygon", "coordinates": slovenia }
            },
            {
                "type": "Feature",
                "properties": { "name": "United States of America", "iso_a2": "US", "iso_a3": "USA" },
                "geometry": { "type": "Polygon", "coordinates": united_states }
            },
            {
                "type": "Feature",
                "properties": { "name": "Pointland", "iso_a2": "XP", "iso_a3": "XPT" },
                "geometry": { "type": "Point", "coordinates": [1.0, 2.0] }
            }
        ]
    })
    .to_string()
}
