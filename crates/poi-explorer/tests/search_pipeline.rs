use poi_explorer::{
    BoundaryProvider, BoundarySource, CandidateRecord, CoarseFilterOutput, CoarseFilterPlan,
    PlaceDataset, PoiError, PoiSearcher, QueryEngine, SearchConfig, SearchErrorKind, SearchQuery,
    SearchRequest, SearchResult,
    data::test_data::{sample_boundaries_geojson, sample_places_df},
};
use tempfile::TempDir;

fn setup_test_env() {
    let _ = poi_explorer::init_logging(tracing::Level::WARN);
}

fn searcher(cache: &TempDir) -> PoiSearcher {
    setup_test_env();
    PoiSearcher::init(
        SearchConfig::builder().cache_dir(cache.path()).build(),
        PlaceDataset::InMemory(sample_places_df().unwrap()),
        BoundarySource::GeoJson(sample_boundaries_geojson()),
    )
    .unwrap()
}

fn ids(result: &SearchResult) -> Vec<&str> {
    result.pois.iter().map(|p| p.record.id.as_str()).collect()
}

fn assert_result_invariants(result: &SearchResult, limit: usize) {
    assert!(result.pois.len() <= limit);
    assert!(result.filtered_count >= result.pois.len());
    assert!(result.total_candidates >= result.filtered_count);
    assert!(result.pois.iter().all(|p| p.similarity_score >= 0.9));
    assert!(result.pois.iter().all(|p| (0.0..=1.0).contains(&p.similarity_score)));
    assert!(
        result
            .pois
            .windows(2)
            .all(|w| w[0].similarity_score >= w[1].similarity_score)
    );
    if let Some(bbox) = result.bbox_used {
        assert!(bbox.west() < bbox.east());
        assert!(bbox.south() < bbox.north());
    }
    assert!(!result.trace.is_empty());
}

#[tokio::test]
async fn test_country_search_italy() {
    let cache = TempDir::new().unwrap();
    let searcher = searcher(&cache);
    let result = searcher.search(&SearchQuery::country("pizza", "IT")).await;

    assert!(result.is_success(), "{:#?}", result.trace);
    assert_result_invariants(&result, 20);

    let bbox = result.bbox_used.unwrap();
    assert!((bbox.west() - 6.6).abs() <= 0.5);
    assert!((bbox.east() - 18.5).abs() <= 0.5);
    assert!((bbox.south() - 36.6).abs() <= 0.5);
    assert!((bbox.north() - 47.1).abs() <= 0.5);

    let ids = ids(&result);
    for expected in ["it-caserta-1", "it-rome-1", "it-milan-1", "it-palermo-1"] {
        assert!(ids.contains(&expected), "missing {expected}: {ids:?}");
    }
    assert!(!ids.contains(&"si-ljubljana-1"), "outside the Italian outline");
    assert!(!ids.contains(&"it-milan-2"));
    assert_eq!(result.unique_country_count, 1);
}

#[tokio::test]
async fn test_coordinate_search_bbox() {
    let cache = TempDir::new().unwrap();
    let searcher = searcher(&cache);
    let result = searcher
        .search(&SearchQuery::coordinate("pizza", 40.7128, -74.006, 10.0))
        .await;

    assert_result_invariants(&result, 20);
    let bbox = result.bbox_used.unwrap();
    let offset = 10.0 / 111.0;
    assert!((bbox.west() - (-74.006 - offset)).abs() < 1e-9);
    assert!((bbox.east() - (-74.006 + offset)).abs() < 1e-9);
    assert!((bbox.south() - (40.7128 - offset)).abs() < 1e-9);
    assert!((bbox.north() - (40.7128 + offset)).abs() < 1e-9);
    assert!(ids(&result).iter().all(|id| id.starts_with("us-nyc")));
}

#[tokio::test]
async fn test_unknown_country() {
    let cache = TempDir::new().unwrap();
    let searcher = searcher(&cache);
    let result = searcher.search(&SearchQuery::country("pizza", "ZZ")).await;

    assert_eq!(result.error, Some(SearchErrorKind::NotFound));
    assert!(result.pois.is_empty());
    assert_eq!(result.filtered_count, 0);
    assert!(result.trace.iter().any(|line| line.contains("failed")));
}

#[tokio::test]
async fn test_limit_truncates_after_counting() {
    let cache = TempDir::new().unwrap();
    let searcher = searcher(&cache);
    let result = searcher
        .search(&SearchQuery::country("pizza", "IT").with_limit(2))
        .await;

    assert_result_invariants(&result, 2);
    assert_eq!(result.pois.len(), 2);
    assert!(result.filtered_count >= 4);
}

#[tokio::test]
async fn test_search_request_forms() {
    let cache = TempDir::new().unwrap();
    let searcher = searcher(&cache);

    let request: SearchRequest = serde_json::from_str(
        r#"{"keyword": "pizza", "mode": "bbox", "bbox": {"north": 49.0, "south": 48.5, "east": 2.6, "west": 2.0}}"#,
    )
    .unwrap();
    let result = searcher.search_request(request).await;
    assert_eq!(ids(&result), ["fr-paris-1"]);

    let request: SearchRequest =
        serde_json::from_str(r#"{"keyword": "pizza", "mode": "teleport"}"#).unwrap();
    let result = searcher.search_request(request).await;
    assert_eq!(result.error, Some(SearchErrorKind::InvalidParameters));
    assert!(!result.trace.is_empty());
}

#[tokio::test]
async fn test_boundaries_persist_across_searchers() {
    let cache = TempDir::new().unwrap();

    let first = searcher(&cache);
    first.search(&SearchQuery::country("pizza", "FR")).await;
    assert_eq!(first.stats().boundary_dataset_loads, 1);
    first.shutdown();

    let second = searcher(&cache);
    let result = second.search(&SearchQuery::country("pizza", "fr")).await;
    assert!(result.is_success());
    assert_eq!(second.stats().boundary_dataset_loads, 0);
    assert_eq!(ids(&result), ["fr-paris-1"]);
}

struct FailingEngine;

impl QueryEngine for FailingEngine {
    async fn execute(&self, _plan: &CoarseFilterPlan) -> poi_explorer::error::Result<CoarseFilterOutput> {
        Err(PoiError::EngineFailure("connection reset by peer".to_string()))
    }
}

/// Serves a fixed batch of rows, applying only the row-level predicates.
struct FixedEngine(Vec<CandidateRecord>);

impl QueryEngine for FixedEngine {
    async fn execute(&self, plan: &CoarseFilterPlan) -> poi_explorer::error::Result<CoarseFilterOutput> {
        Ok(plan.apply(self.0.clone()))
    }
}

fn provider() -> BoundaryProvider {
    BoundaryProvider::in_memory(BoundarySource::GeoJson(sample_boundaries_geojson()))
}

#[tokio::test]
async fn test_engine_failure_is_reported() {
    let searcher = PoiSearcher::with_engine(SearchConfig::default(), FailingEngine, provider()).unwrap();
    let result = searcher
        .search(&SearchQuery::coordinate("pizza", 40.7128, -74.006, 10.0))
        .await;

    assert_eq!(result.error, Some(SearchErrorKind::EngineFailure));
    assert!(result.pois.is_empty());
    assert!(result.bbox_used.is_some(), "bounds were resolved before the engine failed");
    assert!(result.trace.last().unwrap().contains("connection reset"));
}

#[tokio::test]
async fn test_custom_engine_respects_cap() {
    let rows: Vec<CandidateRecord> = (0..50)
        .map(|i| CandidateRecord {
            id: format!("row-{i}"),
            primary_name: if i % 2 == 0 { "Pizza".into() } else { "Pizzeria".into() },
            latitude: 0.0,
            longitude: 0.0,
            country: Some(if i % 3 == 0 { "AA" } else { "BB" }.into()),
            ..Default::default()
        })
        .collect();

    let config = SearchConfig::builder().candidate_cap(10).build();
    let searcher = PoiSearcher::with_engine(config, FixedEngine(rows), provider()).unwrap();
    let result = searcher
        .search(&SearchQuery::coordinate("pizza", 0.0, 0.0, 5.0).with_limit(3))
        .await;

    assert_result_invariants(&result, 3);
    assert_eq!(result.total_candidates, 10);
    assert_eq!(result.filtered_count, 10, "the cap keeps the exact matches");
    assert!(result.pois.iter().all(|p| p.record.primary_name == "Pizza"));
    assert!(result.trace.iter().any(|line| line.contains("cap")));
}
