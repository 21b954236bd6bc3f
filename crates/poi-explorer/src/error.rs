use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid search parameters: {0}")]
    InvalidParameters(String),
    #[error("Query engine failure: {0}")]
    EngineFailure(String),
    #[error("Data processing error: {0}")]
    Data(#[from] poi_explorer_data::DataError),
    #[error("DataFrame error: {0}")]
    DataFrame(#[from] polars::prelude::PolarsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure category recorded on a [`crate::SearchResult`] when a search could not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchErrorKind {
    NotFound,
    InvalidParameters,
    EngineFailure,
    Internal,
}

impl PoiError {
    pub fn kind(&self) -> SearchErrorKind {
        match self {
            Self::NotFound(_) => SearchErrorKind::NotFound,
            Self::InvalidParameters(_) => SearchErrorKind::InvalidParameters,
            Self::EngineFailure(_) => SearchErrorKind::EngineFailure,
            _ => SearchErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, PoiError>;
