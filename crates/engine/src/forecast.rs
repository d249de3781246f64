//! Aligns per-resort horizon forecasts onto one hourly timeline.
//!
//! Forecasts are only known at a few checkpoints (24/48/72h). The aligned
//! table has one row per hour from 0 to the furthest checkpoint. Values are
//! step-held: from a checkpoint's hour until the next checkpoint a resort
//! shows that checkpoint's cumulative total. Before its first checkpoint a
//! resort shows 0.0, since nothing has accumulated at "now".

use common::{HorizonForecast, ResortId};
use serde::Serialize;

/// Cumulative-snowfall checkpoints for one resort.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSeries {
    pub resort: ResortId,
    /// `(hour offset, cumulative total)`; `None` marks a missing checkpoint.
    pub checkpoints: Vec<(u32, Option<f64>)>,
}

impl ForecastSeries {
    pub fn from_horizons(resort: ResortId, horizons: &HorizonForecast) -> Self {
        Self {
            resort,
            checkpoints: horizons.checkpoints().to_vec(),
        }
    }

    /// Series for a resort without a report: the standard horizons, all
    /// missing, so the table still spans every horizon hour.
    pub fn absent(resort: ResortId) -> Self {
        Self::from_horizons(resort, &HorizonForecast::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedRow {
    pub hour: u32,
    /// One value per resort, in the table's resort order.
    pub values: Vec<Option<f64>>,
}

/// Chart-ready forecast table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedForecast {
    pub resorts: Vec<ResortId>,
    /// Hours `0..=max_hour`, strictly increasing, no gaps.
    pub rows: Vec<AlignedRow>,
    /// Resort with the highest final total, first in order on ties.
    pub top_resort: Option<ResortId>,
}

impl AlignedForecast {
    pub fn max_hour(&self) -> u32 {
        self.rows.last().map(|r| r.hour).unwrap_or(0)
    }

    /// One resort's column, hour by hour.
    pub fn series(&self, resort: &ResortId) -> Option<Vec<Option<f64>>> {
        let idx = self.resorts.iter().position(|r| r == resort)?;
        Some(self.rows.iter().map(|row| row.values[idx]).collect())
    }

    pub fn final_value(&self, resort: &ResortId) -> Option<f64> {
        let idx = self.resorts.iter().position(|r| r == resort)?;
        self.rows.last()?.values[idx]
    }
}

pub struct ForecastAligner;

impl ForecastAligner {
    /// Build the aligned table. Column order follows `series` order.
    ///
    /// Missing checkpoints hold the previous total. A checkpoint lower than
    /// an earlier one is raised to it, so every column is non-decreasing.
    /// A resort with no known checkpoint is `None` at every hour.
    pub fn align(series: &[ForecastSeries]) -> AlignedForecast {
        let max_hour = series
            .iter()
            .flat_map(|s| s.checkpoints.iter().map(|(h, _)| *h))
            .max()
            .unwrap_or(0);

        let columns: Vec<Option<Vec<f64>>> = series
            .iter()
            .map(|s| Self::step_column(&s.checkpoints, max_hour))
            .collect();

        let rows = (0..=max_hour)
            .map(|hour| AlignedRow {
                hour,
                values: columns
                    .iter()
                    .map(|col| col.as_ref().map(|c| c[hour as usize]))
                    .collect(),
            })
            .collect();

        let mut top: Option<(usize, f64)> = None;
        for (idx, col) in columns.iter().enumerate() {
            let Some(last) = col.as_ref().and_then(|c| c.last().copied()) else {
                continue;
            };
            if top.map_or(true, |(_, best)| last > best) {
                top = Some((idx, last));
            }
        }

        AlignedForecast {
            resorts: series.iter().map(|s| s.resort.clone()).collect(),
            rows,
            top_resort: top.map(|(idx, _)| series[idx].resort.clone()),
        }
    }

    fn step_column(checkpoints: &[(u32, Option<f64>)], max_hour: u32) -> Option<Vec<f64>> {
        let mut known: Vec<(u32, f64)> = checkpoints
            .iter()
            .filter_map(|(h, v)| v.filter(|x| x.is_finite()).map(|x| (*h, x)))
            .collect();
        if known.is_empty() {
            return None;
        }
        known.sort_by_key(|(h, _)| *h);

        let mut column = Vec::with_capacity(max_hour as usize + 1);
        let mut current = 0.0_f64;
        let mut next = known.iter().peekable();
        for hour in 0..=max_hour {
            while let Some((_, v)) = next.next_if(|(h, _)| *h <= hour) {
                current = current.max(*v);
            }
            column.push(current);
        }
        Some(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(resort: &str, points: &[(u32, Option<f64>)]) -> ForecastSeries {
        ForecastSeries {
            resort: resort.into(),
            checkpoints: points.to_vec(),
        }
    }

    #[test]
    fn test_step_hold_between_checkpoints() {
        let table = ForecastAligner::align(&[series(
            "a",
            &[(24, Some(2.0)), (48, Some(5.0)), (72, Some(5.0))],
        )]);
        let col = table.series(&"a".into()).unwrap();

        assert_eq!(table.rows.len(), 73);
        assert!(col[0..24].iter().all(|v| *v == Some(0.0)));
        assert!(col[24..48].iter().all(|v| *v == Some(2.0)));
        assert!(col[48..72].iter().all(|v| *v == Some(5.0)));
        assert_eq!(col[72], Some(5.0));
    }

    #[test]
    fn test_hours_are_contiguous_and_columns_non_decreasing() {
        let table = ForecastAligner::align(&[
            series("a", &[(24, Some(5.0)), (48, Some(3.0)), (72, Some(4.0))]),
            series("b", &[(24, Some(-1.0)), (48, Some(1.5)), (72, Some(9.0))]),
            series("c", &[(72, Some(0.5)), (24, Some(0.2))]),
        ]);

        for (i, row) in table.rows.iter().enumerate() {
            assert_eq!(row.hour, i as u32);
        }
        for resort in &table.resorts {
            let col: Vec<f64> = table.series(resort).unwrap().into_iter().flatten().collect();
            assert_eq!(col.len(), 73);
            assert!(col.windows(2).all(|w| w[0] <= w[1]), "{resort} decreases");
        }
        assert_eq!(table.final_value(&"a".into()), Some(5.0));
        assert_eq!(table.final_value(&"b".into()), Some(9.0));
        assert_eq!(table.series(&"b".into()).unwrap()[30], Some(0.0));
    }

    #[test]
    fn test_missing_checkpoint_holds_previous_total() {
        let table = ForecastAligner::align(&[series(
            "a",
            &[(24, Some(2.0)), (48, None), (72, Some(6.0))],
        )]);
        let col = table.series(&"a".into()).unwrap();

        assert_eq!(col[47], Some(2.0));
        assert_eq!(col[71], Some(2.0));
        assert_eq!(col[72], Some(6.0));
    }

    #[test]
    fn test_resort_without_data_is_absent() {
        let table = ForecastAligner::align(&[
            series("a", &[(24, None), (48, None), (72, None)]),
            ForecastSeries::absent("b".into()),
            series("c", &[(24, Some(1.0))]),
        ]);

        assert_eq!(table.max_hour(), 72);
        assert!(table.series(&"a".into()).unwrap().iter().all(Option::is_none));
        assert!(table.series(&"b".into()).unwrap().iter().all(Option::is_none));
        assert_eq!(table.final_value(&"c".into()), Some(1.0));
        assert_eq!(table.top_resort, Some("c".into()));
    }

    #[test]
    fn test_all_absent_still_spans_every_horizon() {
        let absent = ForecastAligner::align(&[
            ForecastSeries::absent("a".into()),
            ForecastSeries::absent("b".into()),
        ]);
        let empty_reports = ForecastAligner::align(&[ForecastSeries::from_horizons(
            "a".into(),
            &HorizonForecast::default(),
        )]);

        assert_eq!(absent.rows.len(), 73);
        assert_eq!(absent.rows.len(), empty_reports.rows.len());
        assert!(absent.rows.iter().all(|r| r.values == vec![None, None]));
        assert!(absent.top_resort.is_none());
    }

    #[test]
    fn test_top_resort_tie_goes_to_first() {
        let table = ForecastAligner::align(&[
            series("a", &[(24, Some(1.0)), (72, Some(4.0))]),
            series("b", &[(24, Some(3.0)), (72, Some(6.0))]),
            series("c", &[(48, Some(6.0))]),
        ]);
        assert_eq!(table.top_resort, Some("b".into()));
    }

    #[test]
    fn test_empty_input() {
        let table = ForecastAligner::align(&[]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].hour, 0);
        assert!(table.top_resort.is_none());
    }

    #[test]
    fn test_from_horizons_uses_standard_checkpoints() {
        let s = ForecastSeries::from_horizons(
            "a".into(),
            &HorizonForecast {
                h24: Some(1.0),
                h48: None,
                h72: Some(3.0),
            },
        );
        assert_eq!(s.checkpoints, vec![(24, Some(1.0)), (48, None), (72, Some(3.0))]);
    }
}
