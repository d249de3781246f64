//! Refresh-and-ranking engine.
//!
//! Keeps provider data fresh, ranks resorts against user weights, and
//! aligns horizon forecasts onto a shared hourly timeline.

pub mod cache;
pub mod dashboard;
pub mod forecast;
pub mod rank;

pub use cache::{CacheState, CacheStatus, CachedSnapshot, RefreshOutcome, StaleCache};
pub use dashboard::{DashboardController, ResortDetail};
pub use forecast::{AlignedForecast, AlignedRow, ForecastAligner, ForecastSeries};
pub use rank::{MetricTable, RankEngine, RankResult, RankedResort};
