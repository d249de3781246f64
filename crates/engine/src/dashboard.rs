//! Controller the UI layer talks to.
//!
//! Holds the two provider caches and derives everything else (metric table,
//! recommendation, aligned forecast, resort detail) from whatever they last
//! committed. Nothing here is stored; every call recomputes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{
    Error, Metric, MetricSource, ResortId, ResortInfo, ResortRegistry, Result, SnowReport,
    WeatherReport, WeightVector,
};
use serde::Serialize;
use tracing::debug;

use crate::cache::{CachedSnapshot, StaleCache};
use crate::forecast::{AlignedForecast, ForecastAligner, ForecastSeries};
use crate::rank::{MetricTable, RankEngine, RankResult};

/// Everything the detail view shows for one resort.
#[derive(Debug, Clone, Serialize)]
pub struct ResortDetail {
    pub info: ResortInfo,
    pub weather: Option<WeatherReport>,
    pub weather_as_of: Option<DateTime<Utc>>,
    pub snow: Option<SnowReport>,
    pub snow_as_of: Option<DateTime<Utc>>,
    pub trails_open_pct: Option<f64>,
    pub lifts_open_pct: Option<f64>,
}

pub struct DashboardController<W: MetricSource, S: MetricSource> {
    registry: Arc<ResortRegistry>,
    weather: Arc<StaleCache<W>>,
    snow: Arc<StaleCache<S>>,
}

impl<W, S> DashboardController<W, S>
where
    W: MetricSource<Report = WeatherReport>,
    S: MetricSource<Report = SnowReport>,
{
    pub fn new(
        registry: Arc<ResortRegistry>,
        weather: Arc<StaleCache<W>>,
        snow: Arc<StaleCache<S>>,
    ) -> Self {
        Self {
            registry,
            weather,
            snow,
        }
    }

    pub fn registry(&self) -> &ResortRegistry {
        &self.registry
    }

    pub fn weather_cache(&self) -> &Arc<StaleCache<W>> {
        &self.weather
    }

    pub fn snow_cache(&self) -> &Arc<StaleCache<S>> {
        &self.snow
    }

    pub fn weather(&self) -> Result<Arc<CachedSnapshot<WeatherReport>>> {
        self.weather.read()
    }

    pub fn snow(&self) -> Result<Arc<CachedSnapshot<SnowReport>>> {
        self.snow.read()
    }

    /// Current value of every metric, aligned to registry order. Metrics
    /// from a cache that has no data yet are all-absent.
    pub fn metric_table(&self) -> MetricTable {
        let n = self.registry.len();
        let absent = || vec![None; n];

        let warmth = match self.weather.read() {
            Ok(c) => c.snapshot.column(|w| Some(w.feels_like)),
            Err(_) => absent(),
        };
        let (fresh, base, runs) = match self.snow.read() {
            Ok(c) => (
                c.snapshot.column(|s| s.snow_48h_in),
                c.snapshot.column(|s| s.base_depth_in),
                c.snapshot.column(|s| s.open_trails.map(f64::from)),
            ),
            Err(_) => (absent(), absent(), absent()),
        };

        MetricTable::new(self.registry.ids().cloned().collect())
            .with_column(Metric::Warmth, warmth)
            .with_column(Metric::FreshSnow, fresh)
            .with_column(Metric::BaseDepth, base)
            .with_column(Metric::OpenRuns, runs)
    }

    /// Rank resorts under `weights`.
    ///
    /// Works as soon as either cache has data; `NoDataYet` only when
    /// neither has ever been populated.
    pub fn recommend(&self, weights: &WeightVector) -> Result<RankResult> {
        let weather_ready = self.weather.read().is_ok();
        let snow_ready = self.snow.read().is_ok();
        if !weather_ready && !snow_ready {
            return Err(Error::NoDataYet(format!(
                "{} and {}",
                self.weather.name(),
                self.snow.name()
            )));
        }
        if !weather_ready || !snow_ready {
            debug!(
                "Ranking with partial data (weather={}, snow={})",
                weather_ready, snow_ready
            );
        }

        Ok(RankEngine::rank(&self.metric_table(), weights))
    }

    /// Aligned cumulative-snowfall forecast for every resort.
    pub fn forecast(&self) -> Result<AlignedForecast> {
        let snow = self.snow.read()?;
        let series: Vec<ForecastSeries> = snow
            .snapshot
            .iter()
            .map(|(id, report)| match report {
                Some(r) => ForecastSeries::from_horizons(id.clone(), &r.forecast),
                None => ForecastSeries::absent(id.clone()),
            })
            .collect();

        Ok(ForecastAligner::align(&series))
    }

    pub fn resort_detail(&self, id: &ResortId) -> Result<ResortDetail> {
        let info = self
            .registry
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownResort(id.to_string()))?;

        let weather = self.weather.read().ok();
        let snow = self.snow.read().ok();

        let weather_report = weather
            .as_ref()
            .and_then(|c| c.snapshot.get(id).cloned());
        let snow_report = snow.as_ref().and_then(|c| c.snapshot.get(id).cloned());

        let (trails_open_pct, lifts_open_pct) = match &snow_report {
            Some(r) => (
                percent_open(r.open_trails, r.max_trails),
                percent_open(r.open_lifts, r.max_lifts),
            ),
            None => (None, None),
        };

        Ok(ResortDetail {
            info,
            weather: weather_report,
            weather_as_of: weather.map(|c| c.snapshot.fetched_at),
            snow: snow_report,
            snow_as_of: snow.map(|c| c.snapshot.fetched_at),
            trails_open_pct,
            lifts_open_pct,
        })
    }
}

fn percent_open(open: Option<u32>, max: Option<u32>) -> Option<f64> {
    match (open, max) {
        (Some(open), Some(max)) if max > 0 => Some(f64::from(open) / f64::from(max) * 100.0),
        _ => None,
    }
}
