//! Bounded, approximate candidate retrieval.
//!
//! The coarse stage only has to be cheap and generous: a bounding-box overlap the engine
//! can prune on, an optional polygon test, and a Jaro-Winkler cut on the text fields.
//! Everything that survives is re-scored strictly afterwards.
use std::future::Future;

use rapidfuzz::distance::jaro_winkler;
use tracing::{debug, instrument};

use crate::{
    boundary::PolygonConstraint,
    config::SearchConfig,
    error::Result,
    model::{BoundingBox, CandidateRecord},
};

/// The predicate and bounds handed to a [`QueryEngine`].
#[derive(Debug, Clone)]
pub struct CoarseFilterPlan {
    /// Lower-cased, trimmed keyword
    pub keyword: String,
    /// Records whose bounding box misses this box are rejected
    pub bbox: BoundingBox,
    /// Precise containment test for the record's point, when known
    pub polygon: Option<PolygonConstraint>,
    /// Minimum Jaro-Winkler similarity on any text field
    pub coarse_threshold: f64,
    /// Maximum number of rows returned
    pub row_cap: usize,
    pub include_taxonomy: bool,
}

impl CoarseFilterPlan {
    /// Polygon part of the spatial predicate; the bounding-box part is the engine's job.
    pub fn matches_polygon(&self, record: &CandidateRecord) -> bool {
        self.allows_point(record.longitude, record.latitude)
    }

    pub fn allows_point(&self, longitude: f64, latitude: f64) -> bool {
        self.polygon
            .as_ref()
            .is_none_or(|polygon| polygon.contains(longitude, latitude))
    }

    /// Jaro-Winkler similarity between the keyword and one text field, case-insensitive.
    pub fn field_similarity(&self, field: &str) -> f64 {
        let field = field.to_lowercase();
        jaro_winkler::similarity(self.keyword.chars(), field.chars())
    }

    /// Best Jaro-Winkler similarity between the keyword and any text field.
    pub fn coarse_score(&self, record: &CandidateRecord) -> f64 {
        record
            .text_fields(self.include_taxonomy)
            .map(|field| self.field_similarity(field))
            .fold(0.0, f64::max)
    }

    /// Apply the row-level predicates to records that already passed the box overlap.
    ///
    /// Survivors carry their coarse score and are ordered by it, best first; equal
    /// scores keep engine order. The cap is applied last.
    pub fn apply(&self, records: impl IntoIterator<Item = CandidateRecord>) -> CoarseFilterOutput {
        let mut candidates: Vec<CandidateRecord> = records
            .into_iter()
            .filter(|record| self.matches_polygon(record))
            .filter_map(|mut record| {
                let score = self.coarse_score(&record);
                (score >= self.coarse_threshold).then(|| {
                    record.coarse_score = score;
                    record
                })
            })
            .collect();

        candidates.sort_by(|a, b| b.coarse_score.total_cmp(&a.coarse_score));
        let matched_rows = candidates.len();
        candidates.truncate(self.row_cap);

        CoarseFilterOutput {
            candidates,
            matched_rows,
        }
    }
}

/// Rows returned by a [`QueryEngine`].
#[derive(Debug, Clone, Default)]
pub struct CoarseFilterOutput {
    /// At most `row_cap` candidates
    pub candidates: Vec<CandidateRecord>,
    /// How many rows matched before the cap
    pub matched_rows: usize,
}

/// An engine able to evaluate a [`CoarseFilterPlan`] against the place dataset.
///
/// Implementations report their own failures as [`crate::PoiError::EngineFailure`].
pub trait QueryEngine: Send + Sync {
    fn execute(&self, plan: &CoarseFilterPlan) -> impl Future<Output = Result<CoarseFilterOutput>> + Send;
}

/// Builds coarse filter plans from a resolved search area and runs them.
#[derive(Debug, Clone)]
pub struct CoarseFilterPlanner {
    coarse_threshold: f64,
    row_cap: usize,
    include_taxonomy: bool,
}

impl CoarseFilterPlanner {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            coarse_threshold: config.coarse_threshold,
            row_cap: config.candidate_cap,
            include_taxonomy: config.include_taxonomy,
        }
    }

    pub fn plan(
        &self,
        keyword: &str,
        bbox: BoundingBox,
        polygon: Option<PolygonConstraint>,
    ) -> CoarseFilterPlan {
        CoarseFilterPlan {
            keyword: keyword.trim().to_lowercase(),
            bbox,
            polygon,
            coarse_threshold: self.coarse_threshold,
            row_cap: self.row_cap,
            include_taxonomy: self.include_taxonomy,
        }
    }

    /// Run `plan` on `engine`, enforcing the row cap even if the engine ignores it.
    #[instrument(name = "Coarse filter", skip_all, fields(keyword = %plan.keyword, bbox = %plan.bbox), level = "debug")]
    pub async fn execute<E: QueryEngine>(
        &self,
        engine: &E,
        plan: &CoarseFilterPlan,
    ) -> Result<CoarseFilterOutput> {
        let mut output = engine.execute(plan).await?;
        if output.candidates.len() > plan.row_cap {
            debug!(
                returned = output.candidates.len(),
                cap = plan.row_cap,
                "Engine exceeded the row cap, truncating"
            );
            output.candidates.truncate(plan.row_cap);
        }
        output.matched_rows = output.matched_rows.max(output.candidates.len());
        Ok(output)
    }
}
