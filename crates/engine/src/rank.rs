//! Weighted multi-criteria resort ranking.
//!
//! Each metric is turned into ordinal ranks (1 = worst, N = best), ranks are
//! combined with the user's weights, and the highest combined score wins.
//! Every tie is resolved by registry order so results are reproducible.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use common::{Metric, ResortId, WeightVector};
use serde::Serialize;

/// Per-metric values for a fixed, ordered set of resorts.
///
/// Every column has exactly one entry per resort; `None` marks a missing
/// value.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricTable {
    resorts: Vec<ResortId>,
    columns: BTreeMap<Metric, Vec<Option<f64>>>,
}

impl MetricTable {
    pub fn new(resorts: Vec<ResortId>) -> Self {
        Self {
            resorts,
            columns: BTreeMap::new(),
        }
    }

    /// Add a column aligned to the resort order. Short columns are padded
    /// with `None`; extra entries are dropped.
    pub fn with_column(mut self, metric: Metric, mut values: Vec<Option<f64>>) -> Self {
        values.resize(self.resorts.len(), None);
        self.columns.insert(metric, values);
        self
    }

    /// Set one cell, creating an all-absent column if needed. Unknown resorts
    /// are ignored.
    pub fn set(&mut self, metric: Metric, resort: &ResortId, value: Option<f64>) {
        let Some(idx) = self.resorts.iter().position(|r| r == resort) else {
            return;
        };
        let len = self.resorts.len();
        self.columns.entry(metric).or_insert_with(|| vec![None; len])[idx] = value;
    }

    pub fn resorts(&self) -> &[ResortId] {
        &self.resorts
    }

    pub fn column(&self, metric: Metric) -> Option<&[Option<f64>]> {
        self.columns.get(&metric).map(Vec::as_slice)
    }

    pub fn value(&self, metric: Metric, resort: &ResortId) -> Option<f64> {
        let idx = self.resorts.iter().position(|r| r == resort)?;
        self.columns.get(&metric)?.get(idx).copied().flatten()
    }

    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.columns.keys().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResort {
    pub resort: ResortId,
    pub score: f64,
    /// Ordinal rank per scored metric.
    pub metric_ranks: BTreeMap<Metric, usize>,
}

/// Resorts ordered best-first, plus the recommended resort.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankResult {
    pub ranking: Vec<RankedResort>,
    pub winner: Option<ResortId>,
}

impl RankResult {
    pub fn score_of(&self, resort: &ResortId) -> Option<f64> {
        self.ranking
            .iter()
            .find(|r| &r.resort == resort)
            .map(|r| r.score)
    }
}

pub struct RankEngine;

impl RankEngine {
    /// Rank every resort in `table` under `weights`.
    ///
    /// Only metrics present in both `table` and `weights` are scored. The
    /// winner is the highest combined score, first in resort order on ties.
    pub fn rank(table: &MetricTable, weights: &WeightVector) -> RankResult {
        let n = table.resorts.len();
        let mut scores = vec![0.0_f64; n];
        let mut metric_ranks: Vec<BTreeMap<Metric, usize>> = vec![BTreeMap::new(); n];

        for (metric, values) in &table.columns {
            let Some(weight) = weights.get(*metric) else {
                continue;
            };
            let ranks = Self::ordinal_ranks(values);
            for (i, rank) in ranks.into_iter().enumerate() {
                scores[i] += rank as f64 * weight;
                metric_ranks[i].insert(*metric, rank);
            }
        }

        let mut ranking: Vec<RankedResort> = table
            .resorts
            .iter()
            .zip(scores)
            .zip(metric_ranks)
            .map(|((resort, score), metric_ranks)| RankedResort {
                resort: resort.clone(),
                score,
                metric_ranks,
            })
            .collect();

        // Stable: equal scores keep resort order, so the first one wins.
        ranking.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        let winner = ranking.first().map(|r| r.resort.clone());

        RankResult { ranking, winner }
    }

    /// Ordinal ranks for one metric column, 1 = worst.
    ///
    /// Missing and non-finite values all share rank 1. Observed values take
    /// the ranks above them, from `missing + 1` up to `N`, ascending by
    /// value; among equal values the earlier resort takes the lower rank.
    pub fn ordinal_ranks(values: &[Option<f64>]) -> Vec<usize> {
        let mut observed: Vec<(usize, f64)> = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
            .collect();
        let missing = values.len() - observed.len();

        observed.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut ranks = vec![1; values.len()];
        for (pos, (idx, _)) in observed.into_iter().enumerate() {
            ranks[idx] = missing + pos + 1;
        }
        ranks
    }
}
