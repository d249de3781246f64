//! Shared types, config, and error definitions for the ski dashboard.

pub mod config;
pub mod error;
pub mod registry;
pub mod source;
pub mod types;

pub use config::DashboardConfig;
pub use error::Error;
pub use registry::{ResortId, ResortInfo, ResortRegistry};
pub use source::MetricSource;
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
