//! Unified error type for the ski dashboard.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Snow conditions error: {0}")]
    Snow(String),

    #[error("Weather API error: {0}")]
    Weather(String),

    #[error("{source_name} fetch timed out after {secs}s")]
    Timeout { source_name: String, secs: u64 },

    #[error("No data yet from {0}")]
    NoDataYet(String),

    #[error("Unknown resort: {0}")]
    UnknownResort(String),

    #[error("{0}")]
    Other(String),
}
