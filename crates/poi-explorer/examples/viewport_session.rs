//! Viewport requery session
//!
//! Issues a search, then simulates a user panning the map in small steps. The session
//! ignores the camera fit that follows the first search and coalesces the pans into a
//! single requery over the final viewport.

use std::{sync::Arc, time::Duration};

use poi_explorer::{
    BoundarySource, BoundingBox, PlaceDataset, PoiSearcher, SearchConfig, SearchQuery,
    ViewportSession,
    data::test_data::{sample_boundaries_geojson, sample_places_df},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    poi_explorer::init_logging(tracing::Level::INFO)?;

    let searcher = Arc::new(PoiSearcher::init(
        SearchConfig::default(),
        PlaceDataset::InMemory(sample_places_df()?),
        BoundarySource::GeoJson(sample_boundaries_geojson()),
    )?);
    let (handle, mut updates, session) = ViewportSession::spawn(Arc::clone(&searcher));

    handle
        .search(SearchQuery::coordinate("pizza", 40.7128, -74.006, 10.0), true)
        .await;
    if let Some(update) = updates.recv().await {
        println!(
            "Search #{}: {} POIs, recenter = {}",
            update.generation,
            update.result.pois.len(),
            update.recenter
        );
    }

    // The camera fit, reported back by the map.
    handle
        .viewport_changed(BoundingBox::new(-74.01, -73.98, 40.71, 40.74)?)
        .await;

    for step in 0..5 {
        let shift = f64::from(step) * 0.01;
        handle
            .viewport_changed(BoundingBox::new(-74.05 + shift, -73.95 + shift, 40.68, 40.78)?)
            .await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    if let Some(update) = updates.recv().await {
        println!(
            "Requery #{} ({:?}): {} POIs in {}",
            update.generation,
            update.origin,
            update.result.pois.len(),
            update
                .result
                .bbox_used
                .map_or_else(|| "-".to_string(), |b| b.to_string())
        );
    }

    handle.shutdown();
    session.await?;
    Ok(())
}
