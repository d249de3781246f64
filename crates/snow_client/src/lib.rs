//! Snow-conditions snapshot client.
//!
//! Reads the document the daily batch job publishes (a local file or an
//! HTTP URL) and turns it into a per-resort `SnowReport` snapshot. One bad
//! resort entry only blanks that resort; an unreadable document fails the
//! whole fetch.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::config::{ForecastBasis, SnowConfig};
use common::{
    Error, HorizonForecast, MetricSnapshot, MetricSource, ResortId, ResortRegistry, Result,
    SnowReport,
};
use serde::Deserialize;
use tracing::{debug, warn};

pub const SOURCE_NAME: &str = "snow-conditions";

/// Where the snapshot document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotLocation {
    File(PathBuf),
    Url(String),
}

impl SnapshotLocation {
    /// `http://` and `https://` values are URLs, anything else is a path.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::File(PathBuf::from(trimmed))
        }
    }
}

// ── Snapshot document ─────────────────────────────────────────────────

/// Top-level batch document.
#[derive(Debug, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    /// Raw per-resort entries, parsed one by one.
    #[serde(default)]
    pub resorts: HashMap<String, serde_json::Value>,
}

/// One resort's entry as written by the batch job.
#[derive(Debug, Default, Deserialize)]
pub struct ResortConditions {
    #[serde(default)]
    pub base_depth_in: Option<f64>,
    #[serde(default)]
    pub snow_48h_in: Option<f64>,
    #[serde(default)]
    pub open_trails: Option<f64>,
    #[serde(default)]
    pub max_trails: Option<f64>,
    #[serde(default)]
    pub open_lifts: Option<f64>,
    #[serde(default)]
    pub max_lifts: Option<f64>,
    #[serde(default)]
    pub predicted_snow_24h_in: Option<f64>,
    #[serde(default)]
    pub predicted_snow_48h_in: Option<f64>,
    #[serde(default)]
    pub predicted_snow_72h_in: Option<f64>,
    #[serde(default)]
    pub surface: Option<String>,
}

impl ResortConditions {
    fn into_report(self, basis: ForecastBasis) -> SnowReport {
        SnowReport {
            base_depth_in: non_negative(self.base_depth_in),
            snow_48h_in: non_negative(self.snow_48h_in),
            open_trails: as_count(self.open_trails),
            max_trails: as_count(self.max_trails),
            open_lifts: as_count(self.open_lifts),
            max_lifts: as_count(self.max_lifts),
            forecast: to_cumulative(
                [
                    non_negative(self.predicted_snow_24h_in),
                    non_negative(self.predicted_snow_48h_in),
                    non_negative(self.predicted_snow_72h_in),
                ],
                basis,
            ),
            surface: self
                .surface
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }
}

fn non_negative(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite() && *x >= 0.0)
}

fn as_count(v: Option<f64>) -> Option<u32> {
    non_negative(v)
        .filter(|x| *x <= f64::from(u32::MAX))
        .map(|x| x.round() as u32)
}

/// Convert the three horizon values to totals from now.
///
/// With `PerPeriod`, each value covers one 24h window and totals are running
/// sums; a missing window leaves every later total unknown.
fn to_cumulative(values: [Option<f64>; 3], basis: ForecastBasis) -> HorizonForecast {
    let [h24, h48, h72] = match basis {
        ForecastBasis::Cumulative => values,
        ForecastBasis::PerPeriod => {
            let mut total = Some(0.0);
            values.map(|v| {
                total = total.zip(v).map(|(t, v)| t + v);
                total
            })
        }
    };
    HorizonForecast { h24, h48, h72 }
}

/// Parse a snapshot document into a registry-wide snapshot.
pub fn parse_snapshot(
    registry: &ResortRegistry,
    basis: ForecastBasis,
    body: &str,
    fetched_at: DateTime<Utc>,
) -> Result<MetricSnapshot<SnowReport>> {
    let doc: SnapshotDocument = serde_json::from_str(body)
        .map_err(|e| Error::Snow(format!("snapshot document is not valid JSON: {e}")))?;

    let mut reports: HashMap<ResortId, SnowReport> = HashMap::with_capacity(doc.resorts.len());
    for (id, raw) in doc.resorts {
        match serde_json::from_value::<ResortConditions>(raw) {
            Ok(conditions) => {
                reports.insert(ResortId::new(id), conditions.into_report(basis));
            }
            Err(e) => {
                warn!("Unparseable snow conditions for {}: {}", id, e);
            }
        }
    }

    Ok(MetricSnapshot::from_partial(
        registry,
        SOURCE_NAME,
        doc.generated_at.unwrap_or(fetched_at),
        reports,
    ))
}

// ── Client ────────────────────────────────────────────────────────────

/// Snapshot reader for the batch-produced conditions document.
#[derive(Debug, Clone)]
pub struct SnowClient {
    client: reqwest::Client,
    location: SnapshotLocation,
    basis: ForecastBasis,
    registry: Arc<ResortRegistry>,
}

impl SnowClient {
    pub fn new(registry: Arc<ResortRegistry>, config: &SnowConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("ski-dashboard/0.1")
            .pool_max_idle_per_host(2)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Http(format!("failed to build snow HTTP client: {e}")))?;

        Ok(Self {
            client,
            location: SnapshotLocation::parse(&config.snapshot),
            basis: config.forecast_basis,
            registry,
        })
    }

    pub fn location(&self) -> &SnapshotLocation {
        &self.location
    }

    async fn load_document(&self) -> Result<String> {
        match &self.location {
            SnapshotLocation::File(path) => {
                debug!("Reading snow snapshot: {}", path.display());
                tokio::fs::read_to_string(path).await.map_err(|e| {
                    Error::Snow(format!("failed to read {}: {}", path.display(), e))
                })
            }
            SnapshotLocation::Url(url) => {
                debug!("Fetching snow snapshot: {}", url);
                let resp = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| Error::Http(format!("snow snapshot request failed: {e}")))?;

                let status = resp.status().as_u16();
                if status != 200 {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(Error::Snow(format!(
                        "snapshot URL returned {}: {}",
                        status,
                        body.chars().take(500).collect::<String>()
                    )));
                }

                resp.text()
                    .await
                    .map_err(|e| Error::Http(format!("snow snapshot body read failed: {e}")))
            }
        }
    }
}

impl MetricSource for SnowClient {
    type Report = SnowReport;

    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self) -> Result<MetricSnapshot<SnowReport>> {
        let body = self.load_document().await?;
        parse_snapshot(&self.registry, self.basis, &body, Utc::now())
    }
}
