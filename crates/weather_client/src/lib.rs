//! Current-weather client.
//!
//! Looks up "feels like" temperature and condition for every resort from an
//! OpenWeather-compatible current-conditions endpoint. A failed lookup
//! leaves that resort absent; the fetch only fails when every lookup does.

pub mod rate_limit;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common::config::{Units, WeatherConfig};
use common::{
    Error, MetricSnapshot, MetricSource, ResortId, ResortInfo, ResortRegistry, Result,
    WeatherReport,
};
use futures_util::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};

pub use rate_limit::RateLimiter;

pub const SOURCE_NAME: &str = "weather";

/// Response from the current-conditions endpoint.
#[derive(Debug, Deserialize)]
pub struct CurrentWeatherResponse {
    #[serde(default)]
    pub main: Option<MainReadings>,
    #[serde(default)]
    pub weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
pub struct MainReadings {
    #[serde(default)]
    pub temp: Option<f64>,
    #[serde(default)]
    pub feels_like: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CurrentWeatherResponse {
    /// Falls back to the air temperature when "feels like" is missing.
    /// `None` if neither is usable.
    pub fn into_report(self) -> Option<WeatherReport> {
        let main = self.main?;
        let feels_like = main
            .feels_like
            .or(main.temp)
            .filter(|t| t.is_finite())?;

        let condition = self.weather.into_iter().next();
        let (label, description) = match condition {
            Some(c) => (c.main, c.description),
            None => (None, None),
        };
        let label = label.unwrap_or_else(|| "Unknown".to_string());
        let description = description.unwrap_or_else(|| label.to_lowercase());

        Some(WeatherReport {
            feels_like,
            label,
            description,
        })
    }
}

/// Weather API client with a shared request budget.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    units: Units,
    limiter: RateLimiter,
    registry: Arc<ResortRegistry>,
}

impl WeatherClient {
    pub fn new(registry: Arc<ResortRegistry>, config: &WeatherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("ski-dashboard/0.1")
            .pool_max_idle_per_host(4)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(format!("failed to build weather HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            units: config.units,
            limiter: RateLimiter::per_minute(config.requests_per_minute),
            registry,
        })
    }

    /// Fetch current conditions for one resort.
    pub async fn fetch_current(&self, resort: &ResortInfo) -> Result<CurrentWeatherResponse> {
        self.limiter.wait().await;

        debug!(
            "Fetching weather for {} lat={} lon={}",
            resort.id, resort.lat, resort.lon
        );

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lat", resort.lat.to_string()),
                ("lon", resort.lon.to_string()),
                ("units", self.units.as_str().to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| Error::Weather(format!("HTTP error for {}: {}", resort.id, e)))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Weather(format!(
                "weather API returned {} for {}: {}",
                status,
                resort.id,
                body.chars().take(500).collect::<String>()
            )));
        }

        resp.json()
            .await
            .map_err(|e| Error::Weather(format!("JSON parse error for {}: {}", resort.id, e)))
    }

    /// Fetch and summarize one resort's weather.
    pub async fn lookup(&self, resort: &ResortInfo) -> Result<WeatherReport> {
        self.fetch_current(resort)
            .await?
            .into_report()
            .ok_or_else(|| Error::Weather(format!("no temperature reading for {}", resort.id)))
    }
}

impl MetricSource for WeatherClient {
    type Report = WeatherReport;

    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self) -> Result<MetricSnapshot<WeatherReport>> {
        let lookups = self.registry.iter().map(|resort| async move {
            (resort.id.clone(), self.lookup(resort).await)
        });

        let mut reports: HashMap<ResortId, WeatherReport> = HashMap::new();
        let mut last_error = None;
        for (id, result) in join_all(lookups).await {
            match result {
                Ok(report) => {
                    reports.insert(id, report);
                }
                Err(e) => {
                    warn!("Weather lookup failed for {}: {}", id, e);
                    last_error = Some(e);
                }
            }
        }

        if reports.is_empty() {
            if let Some(e) = last_error {
                return Err(Error::Weather(format!(
                    "all {} resort lookups failed, last error: {}",
                    self.registry.len(),
                    e
                )));
            }
        }

        Ok(MetricSnapshot::from_partial(
            &self.registry,
            SOURCE_NAME,
            Utc::now(),
            reports,
        ))
    }
}
