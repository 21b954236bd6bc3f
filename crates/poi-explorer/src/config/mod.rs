use std::{path::PathBuf, time::Duration};

use crate::error::PoiError;

pub const DEFAULT_LIMIT: usize = 20;
pub const DEFAULT_COARSE_THRESHOLD: f64 = 0.8;
pub const DEFAULT_STRICT_THRESHOLD: f64 = 0.9;
pub const DEFAULT_CANDIDATE_CAP: usize = 1000;
pub const DEFAULT_VIEWPORT_QUIET_PERIOD: Duration = Duration::from_millis(600);

/// Configuration for POI search.
///
/// The coarse threshold applies to the fast engine-side metric and must stay looser than
/// the strict threshold: the two metrics disagree near the boundary, and a coarse cut
/// tighter than the strict one silently drops true matches.
///
/// ```rust
/// use poi_explorer::SearchConfig;
///
/// let config = SearchConfig::builder().limit(10).candidate_cap(500).build();
/// assert_eq!(config.limit, 10);
/// ```
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Default number of results shown per search
    pub limit: usize,
    /// Minimum Jaro-Winkler similarity for a row to leave the query engine
    pub coarse_threshold: f64,
    /// Minimum sequence-matching ratio for a POI to be returned
    pub strict_threshold: f64,
    /// Maximum number of candidate rows pulled from the engine per search
    pub candidate_cap: usize,
    /// Whether taxonomy hierarchy entries take part in matching
    pub include_taxonomy: bool,
    /// Quiet period after the last viewport event before a requery fires
    pub viewport_quiet_period: Duration,
    /// Directory for the durable boundary cache; `None` uses the data crate's default
    pub cache_dir: Option<PathBuf>,
}

impl SearchConfig {
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), PoiError> {
        let in_unit = |v: f64| v > 0.0 && v <= 1.0;
        if !in_unit(self.coarse_threshold) || !in_unit(self.strict_threshold) {
            return Err(PoiError::ConfigError(format!(
                "Thresholds must be in (0, 1], got coarse={} strict={}",
                self.coarse_threshold, self.strict_threshold
            )));
        }
        if self.coarse_threshold > self.strict_threshold {
            return Err(PoiError::ConfigError(format!(
                "Coarse threshold {} must not exceed strict threshold {}",
                self.coarse_threshold, self.strict_threshold
            )));
        }
        if self.candidate_cap == 0 || self.limit == 0 {
            return Err(PoiError::ConfigError(
                "Candidate cap and limit must be at least 1".to_string(),
            ));
        }
        if self.viewport_quiet_period.is_zero() {
            return Err(PoiError::ConfigError(
                "Viewport quiet period must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory used for the durable boundary cache.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| poi_explorer_data::CACHE_DIR.clone())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            coarse_threshold: DEFAULT_COARSE_THRESHOLD,
            strict_threshold: DEFAULT_STRICT_THRESHOLD,
            candidate_cap: DEFAULT_CANDIDATE_CAP,
            include_taxonomy: true,
            viewport_quiet_period: DEFAULT_VIEWPORT_QUIET_PERIOD,
            cache_dir: None,
        }
    }
}

/// Builder for creating search configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Create a new builder with sensible defaults
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    /// Smaller candidate pulls and a snappier viewport requery
    pub fn fast() -> Self {
        let mut builder = Self::new();
        builder.config.limit = 10;
        builder.config.candidate_cap = 250;
        builder.config.viewport_quiet_period = Duration::from_millis(500);
        builder
    }

    /// Larger candidate pulls and a looser coarse cut, trading transfer for recall
    pub fn comprehensive() -> Self {
        let mut builder = Self::new();
        builder.config.limit = 100;
        builder.config.candidate_cap = 5000;
        builder.config.coarse_threshold = 0.75;
        builder.config.viewport_quiet_period = Duration::from_millis(800);
        builder
    }

    /// Names and categories only; taxonomy terms are ignored
    pub fn strict() -> Self {
        let mut builder = Self::new();
        builder.config.include_taxonomy = false;
        builder.config.strict_threshold = 0.95;
        builder
    }

    /// Set the number of results shown per search
    pub fn limit(mut self, limit: usize) -> Self {
        self.config.limit = limit;
        self
    }

    /// Set the coarse (engine-side) similarity threshold
    pub fn coarse_threshold(mut self, threshold: f64) -> Self {
        self.config.coarse_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the strict (final) similarity threshold
    pub fn strict_threshold(mut self, threshold: f64) -> Self {
        self.config.strict_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the maximum number of candidate rows per search
    pub fn candidate_cap(mut self, cap: usize) -> Self {
        self.config.candidate_cap = cap;
        self
    }

    /// Include or ignore taxonomy hierarchy entries when matching
    pub fn include_taxonomy(mut self, enabled: bool) -> Self {
        self.config.include_taxonomy = enabled;
        self
    }

    /// Set the debounce quiet period for viewport requeries
    pub fn viewport_quiet_period(mut self, period: Duration) -> Self {
        self.config.viewport_quiet_period = period;
        self
    }

    /// Store durable boundary lookups under `dir`
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = Some(dir.into());
        self
    }

    /// Build the final configuration
    pub fn build(self) -> SearchConfig {
        self.config
    }
}
