//! POI Explorer - fuzzy keyword search for points of interest
//!
//! POI Explorer finds places by keyword inside a spatial region: a radius around a
//! coordinate, a country, or the current map viewport. The place dataset is far too
//! large to scan per query, so every search is a short pipeline:
//!
//! 1. **Bounds**: the region becomes a bounding box, plus the country outline for
//!    country searches.
//! 2. **Coarse filter**: a query engine returns a capped set of rows whose box overlaps
//!    the region and whose text fields pass a fast Jaro-Winkler cut.
//! 3. **Strict scoring**: every candidate is re-scored with a sequence-matching ratio.
//! 4. **Ranking**: candidates under the strict threshold are dropped, the rest sorted
//!    and truncated to the display limit.
//!
//! On top of the pipeline, a [`ViewportSession`] re-runs the last search as the map
//! is panned, debouncing camera moves and ignoring the ones it caused itself.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use poi_explorer::{BoundarySource, PlaceDataset, PoiSearcher, SearchConfig, SearchQuery};
//!
//! # async fn run() -> Result<(), poi_explorer::error::PoiError> {
//! poi_explorer::init_logging(tracing::Level::INFO)?;
//!
//! let searcher = PoiSearcher::init(
//!     SearchConfig::builder().candidate_cap(500).build(),
//!     PlaceDataset::parquet("places.parquet"),
//!     BoundarySource::default(),
//! )?;
//!
//! let result = searcher
//!     .search(&SearchQuery::coordinate("pizza", 40.7128, -74.006, 10.0))
//!     .await;
//! println!("{} of {} candidates matched", result.filtered_count, result.total_candidates);
//! for line in &result.trace {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod boundary;
mod bounds;
mod config;
mod core;
pub mod error;
mod model;
mod search;
mod viewport;

pub use core::{PoiSearcher, SearcherStats};

pub use boundary::{BoundaryProvider, CountryBoundary, DurableBoundaryCache, PolygonConstraint};
pub use bounds::{BoundsResolver, KM_PER_DEGREE, ResolvedBounds, coordinate_bbox};
pub use config::{
    DEFAULT_CANDIDATE_CAP, DEFAULT_COARSE_THRESHOLD, DEFAULT_LIMIT, DEFAULT_STRICT_THRESHOLD,
    DEFAULT_VIEWPORT_QUIET_PERIOD, SearchConfig, SearchConfigBuilder,
};
pub use error::{PoiError, SearchErrorKind};
pub use model::{
    BoundingBox, CandidateRecord, ScoredPoi, SearchArea, SearchQuery, SearchRequest,
    SearchResult, ViewportBox,
};
pub use poi_explorer_data as data;
pub use poi_explorer_data::{BoundarySource, PlaceDataset};
pub use search::{
    CoarseFilterOutput, CoarseFilterPlan, CoarseFilterPlanner, PolarsEngine, QueryEngine,
    RankedPois, rank, ratio, score_all, score_candidate,
};
pub use viewport::{
    ControllerState, SearchOrigin, SearchTicket, ViewportCommand, ViewportController,
    ViewportEvent, ViewportHandle, ViewportSession, ViewportUpdate,
};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the POI explorer.
///
/// Installs a `tracing` fmt subscriber filtered by `RUST_LOG` when set, otherwise by
/// `level`. Chatty dependencies are capped at `warn`. Safe to call more than once.
///
/// ```rust
/// use poi_explorer::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), poi_explorer::error::PoiError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), PoiError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("polars=warn".parse()?)
            .add_directive("hyper_util=warn".parse()?)
            .add_directive("reqwest=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|e| PoiError::Other(anyhow::anyhow!(e)))?;
        Ok(())
    })
}
