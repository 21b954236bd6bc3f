//! The [`PoiSearcher`] service object.
//!
//! A searcher owns everything a search needs: the configuration, the country
//! [`BoundaryProvider`] with its caches, the coarse filter planner and a
//! [`QueryEngine`]. Build it once with [`PoiSearcher::init`], share it behind an `Arc`,
//! and call [`PoiSearcher::shutdown`] when done.
//!
//! ```rust,no_run
//! use poi_explorer::{BoundarySource, PlaceDataset, PoiSearcher, SearchConfig, SearchQuery};
//!
//! # async fn run() -> Result<(), poi_explorer::error::PoiError> {
//! let searcher = PoiSearcher::init(
//!     SearchConfig::default(),
//!     PlaceDataset::parquet("places.parquet"),
//!     BoundarySource::default(),
//! )?;
//!
//! let result = searcher.search(&SearchQuery::country("pizza", "IT")).await;
//! for poi in &result.pois {
//!     println!("{} ({:.2})", poi.record.primary_name, poi.similarity_score);
//! }
//! searcher.shutdown();
//! # Ok(())
//! # }
//! ```
use std::sync::atomic::{AtomicUsize, Ordering};

use poi_explorer_data::{BoundarySource, PlaceDataset};
use tracing::{info, instrument, warn};

use crate::{
    boundary::{BoundaryProvider, DurableBoundaryCache},
    bounds::BoundsResolver,
    config::SearchConfig,
    error::Result,
    model::{BoundingBox, SearchArea, SearchQuery, SearchRequest, SearchResult, SearchTrace},
    search::{CoarseFilterPlanner, PolarsEngine, QueryEngine, rank, score_all},
};

/// Counters reported by [`PoiSearcher::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearcherStats {
    pub searches: usize,
    pub failures: usize,
    pub boundary_dataset_loads: usize,
}

/// Runs the full search pipeline: bounds, coarse filter, strict scoring and ranking.
pub struct PoiSearcher<E = PolarsEngine> {
    config: SearchConfig,
    boundaries: BoundaryProvider,
    planner: CoarseFilterPlanner,
    engine: E,
    searches: AtomicUsize,
    failures: AtomicUsize,
}

impl PoiSearcher<PolarsEngine> {
    /// Create a searcher over a place dataset, with a durable boundary cache under
    /// [`SearchConfig::resolved_cache_dir`].
    ///
    /// The dataset schema is checked here; the boundary dataset is not fetched until
    /// the first country search.
    #[instrument(name = "Initialize PoiSearcher", skip_all, level = "info")]
    pub fn init(
        config: SearchConfig,
        dataset: PlaceDataset,
        boundary_source: BoundarySource,
    ) -> Result<Self> {
        let t_init = std::time::Instant::now();
        config.validate()?;

        let cache_dir = config.resolved_cache_dir();
        let durable = DurableBoundaryCache::open(&cache_dir)?;
        let engine = PolarsEngine::new(dataset);
        engine.validate()?;

        let searcher = Self::with_engine(config, engine, BoundaryProvider::new(boundary_source, Some(durable)))?;
        info!(
            cache_dir = ?cache_dir,
            elapsed = ?t_init.elapsed(),
            "PoiSearcher initialization complete"
        );
        Ok(searcher)
    }
}

impl<E: QueryEngine> PoiSearcher<E> {
    /// Create a searcher around any engine and boundary provider.
    pub fn with_engine(config: SearchConfig, engine: E, boundaries: BoundaryProvider) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            planner: CoarseFilterPlanner::new(&config),
            config,
            boundaries,
            engine,
            searches: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn boundaries(&self) -> &BoundaryProvider {
        &self.boundaries
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// A query using the configured default limit.
    pub fn query(&self, keyword: impl Into<String>, area: SearchArea) -> SearchQuery {
        SearchQuery::new(keyword, area).with_limit(self.config.limit)
    }

    pub fn stats(&self) -> SearcherStats {
        SearcherStats {
            searches: self.searches.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            boundary_dataset_loads: self.boundaries.dataset_loads(),
        }
    }

    /// Run one search.
    ///
    /// Never fails: errors produce an empty result whose `error` names the failure kind
    /// and whose trace ends with the failure.
    #[instrument(name = "POI search", skip_all, fields(keyword = %query.keyword, mode = query.area.mode()), level = "info")]
    pub async fn search(&self, query: &SearchQuery) -> SearchResult {
        self.searches.fetch_add(1, Ordering::Relaxed);
        let mut trace = SearchTrace::default();
        trace.push(format!(
            "🔍 Searching for '{}' in {} mode (limit {})",
            query.keyword,
            query.area.mode(),
            query.limit
        ));

        let mut bbox_used = None;
        match self.run(query, &mut trace, &mut bbox_used).await {
            Ok(mut result) => {
                result.trace = trace.into_inner();
                result
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Search failed");
                SearchResult::failed(&e, bbox_used, trace)
            }
        }
    }

    /// Run a search from its loosely-typed request form.
    pub async fn search_request(&self, request: SearchRequest) -> SearchResult {
        match SearchQuery::try_from(request) {
            Ok(query) => self.search(&query).await,
            Err(e) => {
                self.searches.fetch_add(1, Ordering::Relaxed);
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Rejected search request");
                SearchResult::failed(&e, None, SearchTrace::default())
            }
        }
    }

    async fn run(
        &self,
        query: &SearchQuery,
        trace: &mut SearchTrace,
        bbox_used: &mut Option<BoundingBox>,
    ) -> Result<SearchResult> {
        query.validate()?;

        let bounds = BoundsResolver::new(&self.boundaries)
            .resolve(&query.area)
            .await?;
        *bbox_used = Some(bounds.bbox);
        trace.push(format!("📍 Search area: {}", bounds.bbox));
        if bounds.polygon.is_some() {
            trace.push("🗺️ Restricting candidates to the country outline");
        }

        let plan = self.planner.plan(&query.keyword, bounds.bbox, bounds.polygon);
        let output = self.planner.execute(&self.engine, &plan).await?;
        let total_candidates = output.candidates.len();
        trace.push(format!(
            "📊 Coarse filter returned {total_candidates} candidates (similarity ≥ {:.2})",
            plan.coarse_threshold
        ));
        if output.matched_rows > total_candidates {
            trace.push(format!(
                "✂️ Candidate cap of {} reached, {} matching rows dropped",
                plan.row_cap,
                output.matched_rows - total_candidates
            ));
        }

        let scored = score_all(query.keyword.trim(), output.candidates, self.config.include_taxonomy);
        let ranked = rank(scored, self.config.strict_threshold, query.limit);
        trace.push(format!(
            "✅ {} candidates scored ≥ {:.2}, showing {}",
            ranked.filtered_count,
            self.config.strict_threshold,
            ranked.pois.len()
        ));
        trace.push(format!(
            "🌍 Results span {} countries",
            ranked.unique_country_count
        ));

        Ok(SearchResult {
            pois: ranked.pois,
            total_candidates,
            filtered_count: ranked.filtered_count,
            bbox_used: Some(bounds.bbox),
            unique_country_count: ranked.unique_country_count,
            trace: Vec::new(),
            error: None,
        })
    }

    /// Log final counters and release the in-memory caches.
    pub fn shutdown(self) {
        let stats = self.stats();
        info!(
            searches = stats.searches,
            failures = stats.failures,
            boundary_dataset_loads = stats.boundary_dataset_loads,
            cached_countries = self.boundaries.cached_codes().len(),
            "Shutting down PoiSearcher"
        );
        self.boundaries.clear();
    }
}

#[cfg(test)]
mod tests {
    use poi_explorer_data::test_data::{sample_boundaries_geojson, sample_places_df};

    use super::*;
    use crate::error::SearchErrorKind;

    fn searcher() -> (PoiSearcher, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let config = SearchConfig::builder().cache_dir(dir.path()).build();
        let searcher = PoiSearcher::init(
            config,
            PlaceDataset::InMemory(sample_places_df().unwrap()),
            BoundarySource::GeoJson(sample_boundaries_geojson()),
        )
        .unwrap();
        (searcher, dir)
    }

    #[tokio::test]
    async fn test_coordinate_search_in_new_york() {
        let (searcher, _cache) = searcher();
        let result = searcher
            .search(&SearchQuery::coordinate("pizza", 40.7128, -74.006, 10.0))
            .await;

        assert!(result.is_success(), "{:?}", result.trace);
        let ids: Vec<&str> = result.pois.iter().map(|p| p.record.id.as_str()).collect();
        assert!(ids.contains(&"us-nyc-1"));
        assert!(ids.contains(&"us-nyc-2"));
        assert!(!ids.contains(&"us-boston-1"), "Boston is outside a 10 km window");
        assert!(!ids.contains(&"us-nyc-4"), "passes the coarse cut but not the strict one");
        assert!(result.total_candidates >= result.filtered_count);
        assert_eq!(result.unique_country_count, 1);
    }

    #[tokio::test]
    async fn test_invalid_query_is_reported() {
        let (searcher, _cache) = searcher();
        let result = searcher
            .search(&SearchQuery::coordinate("pizza", 40.0, -74.0, -1.0))
            .await;
        assert_eq!(result.error, Some(SearchErrorKind::InvalidParameters));
        assert!(result.bbox_used.is_none());
        assert!(result.trace.last().unwrap().starts_with("❌"));
    }

    #[tokio::test]
    async fn test_config_limit_and_stats() {
        let (searcher, _cache) = searcher();
        let query = searcher.query("pizza", SearchArea::Country { code: "IT".into() });
        assert_eq!(query.limit, 20);

        searcher.search(&query).await;
        searcher.search(&SearchQuery::country("pizza", "ZZ")).await;
        let stats = searcher.stats();
        assert_eq!(stats.searches, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.boundary_dataset_loads, 1);
        searcher.shutdown();
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let config = SearchConfig::builder().candidate_cap(0).build();
        let result = PoiSearcher::init(
            config,
            PlaceDataset::InMemory(sample_places_df().unwrap()),
            BoundarySource::GeoJson(sample_boundaries_geojson()),
        );
        assert!(result.is_err());
    }
}
