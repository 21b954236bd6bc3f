//! Strict sequence-matching similarity used to re-score coarse candidates.
//!
//! This is the Ratcliff/Obershelp ratio: find the longest common block, recurse into
//! the unmatched text on either side, and compare the total matched length with the
//! combined length of both strings. It is independent of whatever metric the query
//! engine used, so ranking does not shift when the engine changes.
use rayon::prelude::*;

use crate::model::{CandidateRecord, ScoredPoi};

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, size)`.
///
/// Ties resolve to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    (alo, ahi): (usize, usize),
    (blo, bhi): (usize, usize),
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    let width = bhi - blo;
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo + 1;
            curr[col] = if a[i] == b[j] {
                let size = prev[col - 1] + 1;
                if size > best_size {
                    (best_i, best_j, best_size) = (i + 1 - size, j + 1 - size, size);
                }
                size
            } else {
                0
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    (best_i, best_j, best_size)
}

/// Total size of all matching blocks between `a` and `b`.
fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![((0, a.len()), (0, b.len()))];

    while let Some((a_range, b_range)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, a_range, b_range);
        if size == 0 {
            continue;
        }
        matched += size;
        if a_range.0 < i && b_range.0 < j {
            pending.push(((a_range.0, i), (b_range.0, j)));
        }
        if i + size < a_range.1 && j + size < b_range.1 {
            pending.push(((i + size, a_range.1), (j + size, b_range.1)));
        }
    }
    matched
}

/// Case-insensitive sequence-matching ratio in `[0, 1]`.
///
/// Empty input scores 0 and case-insensitively equal strings score 1. The pair is
/// matched in a canonical order, so `ratio(a, b) == ratio(b, a)`.
///
/// ```rust
/// use poi_explorer::ratio;
///
/// assert_eq!(ratio("Pizza", "pizza"), 1.0);
/// assert_eq!(ratio("abcd", "bcde"), 0.75);
/// assert_eq!(ratio("", "pizza"), 0.0);
/// ```
pub fn ratio(a: &str, b: &str) -> f64 {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let first: Vec<char> = first.chars().collect();
    let second: Vec<char> = second.chars().collect();

    let matched = matched_chars(&first, &second);
    (2 * matched) as f64 / (first.len() + second.len()) as f64
}

/// Best ratio between `keyword` and any of the candidate's text fields.
pub fn score_candidate(keyword: &str, record: &CandidateRecord, include_taxonomy: bool) -> f64 {
    record
        .text_fields(include_taxonomy)
        .map(|field| ratio(keyword, field))
        .fold(0.0, f64::max)
}

/// Score every candidate in parallel, keeping candidate order.
pub fn score_all(
    keyword: &str,
    candidates: Vec<CandidateRecord>,
    include_taxonomy: bool,
) -> Vec<ScoredPoi> {
    candidates
        .into_par_iter()
        .map(|record| {
            let similarity_score = score_candidate(keyword, &record, include_taxonomy);
            ScoredPoi {
                record,
                similarity_score,
            }
        })
        .collect()
}
