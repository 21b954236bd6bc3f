use std::fmt::Display;

use itertools::izip;
use poi_explorer_data::{
    PlaceDataset,
    places::columns::{
        ADDRESS, ALTERNATE_CATEGORIES, BBOX_XMAX, BBOX_XMIN, BBOX_YMAX, BBOX_YMIN, CATEGORY,
        CONFIDENCE, COUNTRY, ID, LATITUDE, LONGITUDE, NAME, TAXONOMY_HIERARCHY, TAXONOMY_PRIMARY,
    },
};
use polars::prelude::*;
use tracing::{debug, instrument};

use super::coarse_filter::{CoarseFilterOutput, CoarseFilterPlan, QueryEngine};
use crate::{
    error::{PoiError, Result},
    model::CandidateRecord,
};

/// Coarse score column added to the scan, null for rows outside the polygon.
const COARSE_SCORE: &str = "coarse_score";
/// Rows passing the coarse predicate, counted before the cap.
const MATCHED_ROWS: &str = "matched_rows";

/// Text columns fed to the coarse scorer, in record field order.
const TEXT_COLUMNS: [&str; 5] = [
    NAME,
    CATEGORY,
    ALTERNATE_CATEGORIES,
    TAXONOMY_PRIMARY,
    TAXONOMY_HIERARCHY,
];

fn engine_failure(e: impl Display) -> PoiError {
    PoiError::EngineFailure(e.to_string())
}

/// [`QueryEngine`] backed by a lazy polars scan of the place dataset.
///
/// The bounding-box overlap runs inside the scan so parquet statistics can prune row
/// groups. The coarse score, threshold, ordering and row cap are part of the same lazy
/// plan, so at most `row_cap` rows are ever collected.
#[derive(Debug, Clone)]
pub struct PolarsEngine {
    dataset: PlaceDataset,
}

impl PolarsEngine {
    pub fn new(dataset: PlaceDataset) -> Self {
        Self { dataset }
    }

    pub fn dataset(&self) -> &PlaceDataset {
        &self.dataset
    }

    /// Fail early if the dataset lacks a required column.
    pub fn validate(&self) -> Result<()> {
        self.dataset.validate_schema().map_err(engine_failure)
    }
}

impl QueryEngine for PolarsEngine {
    async fn execute(&self, plan: &CoarseFilterPlan) -> Result<CoarseFilterOutput> {
        let dataset = self.dataset.clone();
        let plan = plan.clone();
        tokio::task::spawn_blocking(move || run_plan(&dataset, &plan))
            .await
            .map_err(|e| engine_failure(format!("engine task did not complete: {e}")))?
    }
}

#[instrument(name = "Polars coarse scan", skip_all, level = "debug")]
fn run_plan(dataset: &PlaceDataset, plan: &CoarseFilterPlan) -> Result<CoarseFilterOutput> {
    let t_scan = std::time::Instant::now();
    let columns = dataset.available_candidate_columns().map_err(engine_failure)?;
    let bbox = plan.bbox;
    let row_cap = IdxSize::try_from(plan.row_cap).unwrap_or(IdxSize::MAX);

    let overlaps = col(BBOX_XMAX)
        .gt_eq(lit(bbox.west()))
        .and(col(BBOX_XMIN).lt_eq(lit(bbox.east())))
        .and(col(BBOX_YMAX).gt_eq(lit(bbox.south())))
        .and(col(BBOX_YMIN).lt_eq(lit(bbox.north())));

    let projection: Vec<Expr> = columns
        .iter()
        .map(|&name| match name {
            LATITUDE | LONGITUDE | CONFIDENCE => col(name).cast(DataType::Float64),
            _ => col(name),
        })
        .chain([col(COARSE_SCORE), col(MATCHED_ROWS)])
        .collect();

    // Only the capped, best-scoring rows are materialized; the sort is stable so equal
    // scores keep scan order.
    let df = dataset
        .lazy()
        .map_err(engine_failure)?
        .filter(overlaps)
        .with_column(coarse_score_expr(plan, &columns))
        .filter(col(COARSE_SCORE).gt_eq(lit(plan.coarse_threshold)))
        .with_column(len().alias(MATCHED_ROWS))
        .sort(
            [COARSE_SCORE],
            SortMultipleOptions::new()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
        .limit(row_cap)
        .select(projection)
        .collect()
        .map_err(engine_failure)?;

    let matched_rows = df
        .column(MATCHED_ROWS)
        .and_then(Column::idx)
        .map_err(engine_failure)?
        .get(0)
        .map_or(0, |n| n as usize);
    let candidates = candidates_from_df(&df).map_err(engine_failure)?;

    debug!(
        matched = matched_rows,
        returned = candidates.len(),
        elapsed = ?t_scan.elapsed(),
        "Coarse scan complete"
    );
    Ok(CoarseFilterOutput {
        candidates,
        matched_rows,
    })
}

/// Per-row coarse score evaluated inside the scan, so rows failing the text or polygon
/// predicate are dropped before anything is collected.
fn coarse_score_expr(plan: &CoarseFilterPlan, available: &[&'static str]) -> Expr {
    let mut inputs = vec![col(LATITUDE).cast(DataType::Float64)];
    inputs.extend(
        TEXT_COLUMNS
            .into_iter()
            .filter(|name| available.contains(name))
            .filter(|&name| plan.include_taxonomy || !matches!(name, TAXONOMY_PRIMARY | TAXONOMY_HIERARCHY))
            .map(col),
    );

    let plan = plan.clone();
    col(LONGITUDE)
        .cast(DataType::Float64)
        .map_many(
            move |columns| score_batch(&plan, columns).map(Some),
            &inputs,
            GetOutput::from_type(DataType::Float64),
        )
        .alias(COARSE_SCORE)
}

/// `columns` is longitude, latitude, then string or list-of-string text columns.
fn score_batch(plan: &CoarseFilterPlan, columns: &mut [Column]) -> PolarsResult<Column> {
    let (coordinates, text) = columns.split_at(2);
    let mut scores: Vec<Option<f64>> = coordinates[0]
        .f64()?
        .into_iter()
        .zip(coordinates[1].f64()?)
        .map(|(longitude, latitude)| {
            plan.allows_point(longitude.unwrap_or(f64::NAN), latitude.unwrap_or(f64::NAN))
                .then_some(0.0)
        })
        .collect();

    for column in text {
        match column.dtype() {
            DataType::String => {
                for (score, value) in scores.iter_mut().zip(column.str()?) {
                    if let (Some(score), Some(value)) = (score.as_mut(), value) {
                        *score = score.max(plan.field_similarity(value));
                    }
                }
            }
            DataType::List(_) => {
                for (score, cell) in scores.iter_mut().zip(column.list()?) {
                    if let (Some(score), Some(values)) = (score.as_mut(), cell) {
                        for value in values.str()?.into_iter().flatten() {
                            *score = score.max(plan.field_similarity(value));
                        }
                    }
                }
            }
            _ => {}
        }
    }
    Ok(Column::new(COARSE_SCORE.into(), scores))
}

fn string_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let Ok(column) = df.column(name) else {
        return Ok(vec![None; df.height()]);
    };
    Ok(column
        .str()?
        .into_iter()
        .map(|value| value.map(ToString::to_string))
        .collect())
}

fn float_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let Ok(column) = df.column(name) else {
        return Ok(vec![None; df.height()]);
    };
    Ok(column.f64()?.into_iter().collect())
}

/// Null or missing list cells become empty vectors.
fn list_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Vec<String>>> {
    let Ok(column) = df.column(name) else {
        return Ok(vec![Vec::new(); df.height()]);
    };
    column
        .list()?
        .into_iter()
        .map(|cell| {
            cell.map_or_else(
                || Ok(Vec::new()),
                |series| {
                    Ok(series
                        .str()?
                        .into_iter()
                        .flatten()
                        .map(ToString::to_string)
                        .collect())
                },
            )
        })
        .collect()
}

/// Materialize candidate rows from a projected frame.
pub(crate) fn candidates_from_df(df: &DataFrame) -> PolarsResult<Vec<CandidateRecord>> {
    Ok(izip!(
        string_column(df, ID)?,
        string_column(df, NAME)?,
        string_column(df, CATEGORY)?,
        list_column(df, ALTERNATE_CATEGORIES)?,
        list_column(df, TAXONOMY_HIERARCHY)?,
        float_column(df, LATITUDE)?,
        float_column(df, LONGITUDE)?,
    )
    .zip(izip!(
        string_column(df, TAXONOMY_PRIMARY)?,
        string_column(df, COUNTRY)?,
        string_column(df, ADDRESS)?,
        float_column(df, CONFIDENCE)?,
        float_column(df, COARSE_SCORE)?,
    ))
    .map(
        |(
            (id, name, category, alternate_categories, taxonomy_hierarchy, latitude, longitude),
            (taxonomy_primary, country, raw_address, confidence, coarse_score),
        )| CandidateRecord {
            id: id.unwrap_or_default(),
            primary_name: name.unwrap_or_default(),
            primary_category: category,
            alternate_categories,
            taxonomy_primary,
            taxonomy_hierarchy,
            latitude: latitude.unwrap_or(f64::NAN),
            longitude: longitude.unwrap_or(f64::NAN),
            country: country.filter(|c| !c.is_empty()),
            raw_address,
            confidence,
            coarse_score: coarse_score.unwrap_or_default(),
        },
    )
    .collect())
}
