//! Domain types shared across the dashboard.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::registry::{ResortId, ResortRegistry};

// ── Snapshots ─────────────────────────────────────────────────────────

/// One wholesale fetch from one source, indexed by every registered resort.
///
/// A resort with no usable upstream data is present with `None`; it is never
/// omitted. Snapshots are immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSnapshot<T> {
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    entries: Vec<(ResortId, Option<T>)>,
}

impl<T> MetricSnapshot<T> {
    /// Build a snapshot covering exactly the registry's resorts, in registry
    /// order. Values for unknown ids are dropped; missing ids become `None`.
    pub fn from_partial(
        registry: &ResortRegistry,
        source: impl Into<String>,
        fetched_at: DateTime<Utc>,
        mut values: HashMap<ResortId, T>,
    ) -> Self {
        let source = source.into();
        let entries: Vec<(ResortId, Option<T>)> = registry
            .ids()
            .map(|id| (id.clone(), values.remove(id)))
            .collect();

        if !values.is_empty() {
            let mut unknown: Vec<&str> = values.keys().map(|id| id.as_str()).collect();
            unknown.sort_unstable();
            warn!("{}: ignoring data for unknown resorts {:?}", source, unknown);
        }

        Self {
            source,
            fetched_at,
            entries,
        }
    }

    pub fn get(&self, id: &ResortId) -> Option<&T> {
        self.entries
            .iter()
            .find(|(rid, _)| rid == id)
            .and_then(|(_, v)| v.as_ref())
    }

    /// `(resort, value)` pairs in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (&ResortId, Option<&T>)> {
        self.entries.iter().map(|(id, v)| (id, v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of resorts with a value.
    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|(_, v)| v.is_some()).count()
    }

    /// Project one numeric metric out of every entry, in registry order.
    pub fn column<F>(&self, extract: F) -> Vec<Option<f64>>
    where
        F: Fn(&T) -> Option<f64>,
    {
        self.entries
            .iter()
            .map(|(_, v)| v.as_ref().and_then(&extract))
            .collect()
    }
}

// ── Provider reports ──────────────────────────────────────────────────

/// Predicted cumulative snowfall from now, at the 24/48/72h horizons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HorizonForecast {
    pub h24: Option<f64>,
    pub h48: Option<f64>,
    pub h72: Option<f64>,
}

impl HorizonForecast {
    /// `(hour offset, cumulative inches)` checkpoints in horizon order.
    pub fn checkpoints(&self) -> [(u32, Option<f64>); 3] {
        [(24, self.h24), (48, self.h48), (72, self.h72)]
    }
}

/// Snow conditions for one resort from the batch snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnowReport {
    pub base_depth_in: Option<f64>,
    pub snow_48h_in: Option<f64>,
    pub open_trails: Option<u32>,
    pub max_trails: Option<u32>,
    pub open_lifts: Option<u32>,
    pub max_lifts: Option<u32>,
    pub forecast: HorizonForecast,
    /// Surface condition, e.g. "Packed Powder".
    pub surface: Option<String>,
}

/// Current weather for one resort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// "Feels like" temperature in the configured units.
    pub feels_like: f64,
    /// Short condition label, e.g. "Snow".
    pub label: String,
    /// Human-readable condition, e.g. "light snow".
    pub description: String,
}

// ── Ranking inputs ────────────────────────────────────────────────────

/// A rankable metric. Higher values are always better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Warmth,
    FreshSnow,
    BaseDepth,
    OpenRuns,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Warmth,
        Metric::FreshSnow,
        Metric::BaseDepth,
        Metric::OpenRuns,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Warmth => "warmth",
            Metric::FreshSnow => "fresh_snow",
            Metric::BaseDepth => "base_depth",
            Metric::OpenRuns => "open_runs",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative importance per metric, each in `[0, 1]`.
///
/// Weights are relative and need not sum to 1. A metric without a weight is
/// left out of scoring. Deserializing rejects weights outside `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Metric, f64>", into = "BTreeMap<Metric, f64>")]
pub struct WeightVector(BTreeMap<Metric, f64>);

impl TryFrom<BTreeMap<Metric, f64>> for WeightVector {
    type Error = String;

    fn try_from(weights: BTreeMap<Metric, f64>) -> std::result::Result<Self, Self::Error> {
        for (metric, weight) in &weights {
            if !weight.is_finite() || !(0.0..=1.0).contains(weight) {
                return Err(format!("weight for {metric} must be in [0, 1], got {weight}"));
            }
        }
        Ok(Self(weights))
    }
}

impl From<WeightVector> for BTreeMap<Metric, f64> {
    fn from(weights: WeightVector) -> Self {
        weights.0
    }
}

impl WeightVector {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Same weight for every metric.
    pub fn uniform(weight: f64) -> Self {
        Metric::ALL
            .iter()
            .fold(Self::new(), |w, m| w.with(*m, weight))
    }

    /// Set a weight, clamped to `[0, 1]`. Non-finite weights become 0.
    pub fn with(mut self, metric: Metric, weight: f64) -> Self {
        self.set(metric, weight);
        self
    }

    pub fn set(&mut self, metric: Metric, weight: f64) {
        let weight = if weight.is_finite() {
            weight.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.0.insert(metric, weight);
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.0.get(&metric).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.0.iter().map(|(m, w)| (*m, *w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResortInfo;

    fn registry() -> ResortRegistry {
        let resort = |id: &str| ResortInfo {
            id: id.into(),
            name: id.into(),
            lat: 0.0,
            lon: 0.0,
            logo: None,
        };
        ResortRegistry::new(vec![resort("a"), resort("b"), resort("c")]).unwrap()
    }

    #[test]
    fn test_snapshot_covers_every_resort() {
        let mut values = HashMap::new();
        values.insert(ResortId::from("c"), 3.0);
        values.insert(ResortId::from("unknown"), 9.0);

        let snap = MetricSnapshot::from_partial(&registry(), "test", Utc::now(), values);

        assert_eq!(snap.len(), 3);
        assert_eq!(snap.present_count(), 1);
        let ids: Vec<&str> = snap.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(snap.get(&"c".into()), Some(&3.0));
        assert_eq!(snap.column(|v| Some(*v)), vec![None, None, Some(3.0)]);
    }

    #[test]
    fn test_weights_are_clamped() {
        let w = WeightVector::new()
            .with(Metric::Warmth, 1.7)
            .with(Metric::FreshSnow, -0.2)
            .with(Metric::BaseDepth, f64::NAN);

        assert_eq!(w.get(Metric::Warmth), Some(1.0));
        assert_eq!(w.get(Metric::FreshSnow), Some(0.0));
        assert_eq!(w.get(Metric::BaseDepth), Some(0.0));
        assert_eq!(w.get(Metric::OpenRuns), None);
    }

    #[test]
    fn test_weight_vector_deserializes_from_table() {
        let w: WeightVector =
            serde_json::from_str(r#"{"warmth": 0.5, "open_runs": 1.0}"#).unwrap();
        assert_eq!(w.get(Metric::Warmth), Some(0.5));
        assert_eq!(w.get(Metric::OpenRuns), Some(1.0));
        assert_eq!(w.iter().count(), 2);
    }

    #[test]
    fn test_weight_vector_rejects_out_of_range_weights() {
        assert!(serde_json::from_str::<WeightVector>(r#"{"warmth": -1.0}"#).is_err());
        assert!(serde_json::from_str::<WeightVector>(r#"{"fresh_snow": 1.5}"#).is_err());

        let w = WeightVector::uniform(0.25);
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(serde_json::from_str::<WeightVector>(&json).unwrap(), w);
    }
}
