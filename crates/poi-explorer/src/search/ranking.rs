use itertools::Itertools;

use crate::model::ScoredPoi;

/// Outcome of ranking a scored candidate batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedPois {
    pub pois: Vec<ScoredPoi>,
    /// Candidates at or above the threshold, before truncation
    pub filtered_count: usize,
    /// Distinct non-empty countries among all filtered candidates
    pub unique_country_count: usize,
}

/// Keep candidates scoring at least `strict_threshold`, best first, at most `limit`.
///
/// The sort is stable, so equal scores keep candidate order.
pub fn rank(scored: Vec<ScoredPoi>, strict_threshold: f64, limit: usize) -> RankedPois {
    let mut pois: Vec<ScoredPoi> = scored
        .into_iter()
        .filter(|poi| poi.similarity_score >= strict_threshold)
        .collect();
    pois.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));

    let filtered_count = pois.len();
    let unique_country_count = pois
        .iter()
        .filter_map(|poi| poi.record.country.as_deref())
        .filter(|country| !country.trim().is_empty())
        .unique()
        .count();

    pois.truncate(limit);
    RankedPois {
        pois,
        filtered_count,
        unique_country_count,
    }
}
