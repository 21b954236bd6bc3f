//! Basic POI search
//!
//! Runs one search in each mode against the bundled sample data:
//! - a radius around a coordinate
//! - a country, restricted to its outline
//! - an explicit viewport box
//!
//! Pass a parquet path as the first argument to search a real place dataset instead.

use poi_explorer::{
    BoundarySource, BoundingBox, PlaceDataset, PoiSearcher, SearchConfigBuilder, SearchQuery,
    SearchResult,
    data::test_data::{sample_boundaries_geojson, sample_places_df},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    poi_explorer::init_logging(tracing::Level::WARN)?;

    let (dataset, boundaries) = match std::env::args().nth(1) {
        Some(path) => (PlaceDataset::parquet(path), BoundarySource::default()),
        None => (
            PlaceDataset::InMemory(sample_places_df()?),
            BoundarySource::GeoJson(sample_boundaries_geojson()),
        ),
    };
    let searcher = PoiSearcher::init(SearchConfigBuilder::fast().build(), dataset, boundaries)?;

    println!("Pizza within 10 km of lower Manhattan:");
    let result = searcher
        .search(&SearchQuery::coordinate("pizza", 40.7128, -74.006, 10.0))
        .await;
    print_result(&result, 5);

    println!("\nPizza in Italy:");
    let result = searcher.search(&SearchQuery::country("pizza", "IT")).await;
    print_result(&result, 5);

    println!("\nBakeries in central Paris:");
    let paris = BoundingBox::new(2.25, 2.45, 48.8, 48.9)?;
    let result = searcher.search(&SearchQuery::viewport("bakery", paris)).await;
    print_result(&result, 5);

    println!("\nUnknown country:");
    let result = searcher.search(&SearchQuery::country("pizza", "ZZ")).await;
    print_result(&result, 5);

    searcher.shutdown();
    Ok(())
}

fn print_result(result: &SearchResult, limit: usize) {
    for line in &result.trace {
        println!("  {line}");
    }
    for (i, poi) in result.pois.iter().take(limit).enumerate() {
        println!(
            "  {}. {} [{}] - Score: {:.3}, Country: {}",
            i + 1,
            poi.record.primary_name,
            poi.record.primary_category.as_deref().unwrap_or("-"),
            poi.similarity_score,
            poi.record.country.as_deref().unwrap_or("?")
        );
    }
    if result.pois.len() > limit {
        println!("  ... and {} more results", result.pois.len() - limit);
    }
}
