//! Dashboard configuration types.

use serde::{Deserialize, Serialize};

use crate::registry::ResortInfo;
use crate::types::WeightVector;

/// Top-level dashboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Resorts to track, in tie-break order.
    #[serde(default = "default_resorts")]
    pub resorts: Vec<ResortInfo>,

    /// Weather provider settings.
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Snow-condition snapshot settings.
    #[serde(default)]
    pub snow: SnowConfig,

    /// Refresh timing (seconds).
    #[serde(default)]
    pub timing: TimingConfig,

    /// Default preference weights for headless runs.
    #[serde(default = "default_weights")]
    pub weights: WeightVector,
}

/// Units passed to the weather provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    Imperial,
    Metric,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Imperial => "imperial",
            Units::Metric => "metric",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeather API key.
    #[serde(default)]
    pub api_key: String,

    /// Current-conditions endpoint.
    #[serde(default = "default_weather_url")]
    pub base_url: String,

    #[serde(default = "default_units")]
    pub units: Units,

    /// Outbound request budget.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

/// How the snapshot's predicted-snowfall values are expressed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ForecastBasis {
    /// Each horizon value is the total from now.
    Cumulative,
    /// Each horizon value covers only its own 24h window.
    PerPeriod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnowConfig {
    /// Local path or `http(s)://` URL of the batch snapshot document.
    #[serde(default = "default_snapshot")]
    pub snapshot: String,

    #[serde(default = "default_forecast_basis")]
    pub forecast_basis: ForecastBasis,
}

/// Timing configuration (all values in seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Weather refresh period.
    #[serde(default = "default_weather_refresh")]
    pub weather_refresh_secs: u64,

    /// Snow snapshot refresh period.
    #[serde(default = "default_snow_refresh")]
    pub snow_refresh_secs: u64,

    /// Upper bound on one weather fetch; must be below the refresh period.
    #[serde(default = "default_weather_timeout")]
    pub weather_fetch_timeout_secs: u64,

    /// Upper bound on one snow fetch; must be below the refresh period.
    #[serde(default = "default_snow_timeout")]
    pub snow_fetch_timeout_secs: u64,

    /// Heartbeat log interval.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_weather_url() -> String {
    "https://api.openweathermap.org/data/2.5/weather".into()
}
fn default_units() -> Units {
    Units::Imperial
}
fn default_requests_per_minute() -> u32 {
    60
}

fn default_snapshot() -> String {
    "data/snow_conditions.json".into()
}
fn default_forecast_basis() -> ForecastBasis {
    ForecastBasis::Cumulative
}

fn default_weather_refresh() -> u64 {
    60
}
fn default_snow_refresh() -> u64 {
    3600
}
fn default_weather_timeout() -> u64 {
    20
}
fn default_snow_timeout() -> u64 {
    60
}
fn default_heartbeat() -> u64 {
    300
}

fn default_weights() -> WeightVector {
    WeightVector::uniform(0.5)
}

fn resort(id: &str, name: &str, lat: f64, lon: f64) -> ResortInfo {
    ResortInfo {
        id: id.into(),
        name: name.into(),
        lat,
        lon,
        logo: Some(format!("logos/{id}.png")),
    }
}

fn default_resorts() -> Vec<ResortInfo> {
    vec![
        resort("vail", "Vail", 39.6061, -106.3550),
        resort("breckenridge", "Breckenridge", 39.4817, -106.0384),
        resort("keystone", "Keystone", 39.6045, -105.9498),
        resort("copper", "Copper Mountain", 39.5022, -106.1497),
        resort("abasin", "Arapahoe Basin", 39.6425, -105.8719),
        resort("winter-park", "Winter Park", 39.8868, -105.7625),
        resort("steamboat", "Steamboat", 40.4572, -106.8045),
        resort("loveland", "Loveland", 39.6800, -105.8979),
    ]
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_weather_url(),
            units: default_units(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

impl Default for SnowConfig {
    fn default() -> Self {
        Self {
            snapshot: default_snapshot(),
            forecast_basis: default_forecast_basis(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            weather_refresh_secs: default_weather_refresh(),
            snow_refresh_secs: default_snow_refresh(),
            weather_fetch_timeout_secs: default_weather_timeout(),
            snow_fetch_timeout_secs: default_snow_timeout(),
            heartbeat_secs: default_heartbeat(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            resorts: default_resorts(),
            weather: WeatherConfig::default(),
            snow: SnowConfig::default(),
            timing: TimingConfig::default(),
            weights: default_weights(),
        }
    }
}
