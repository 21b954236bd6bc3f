//! The search pipeline stages after bounds resolution.
//!
//! A [`CoarseFilterPlan`] is executed by a [`QueryEngine`] to get a capped candidate
//! set, every candidate is re-scored with [`ratio`], and [`rank`] applies the strict
//! threshold, ordering and display limit.
mod coarse_filter;
mod engine;
mod ranking;
mod similarity;

pub use coarse_filter::{CoarseFilterOutput, CoarseFilterPlan, CoarseFilterPlanner, QueryEngine};
pub use engine::PolarsEngine;
pub use ranking::{RankedPois, rank};
pub use similarity::{ratio, score_all, score_candidate};
