//! Cumulative monthly series and the historical envelope
//!
//! ```text
//! MonthlyVolume rows ──> shape() ──> YearSeries (running sum, resets per year)
//!                                        │
//!                                        └─> envelope(before_year) ──> MonthEnvelope
//! ```

use super::error::AnalyticsResult;
use super::period::PeriodResolver;
use super::store::AggregateStore;
use super::types::{window_start, FlowType, MonthlyVolume};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CumulativePoint {
    pub month: u32,
    pub volume_kg: f64,
    pub cumulative_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearSeries {
    pub year: i32,
    pub points: Vec<CumulativePoint>,
}

impl YearSeries {
    pub fn cumulative_at(&self, month: u32) -> Option<f64> {
        self.points
            .iter()
            .find(|p| p.month == month)
            .map(|p| p.cumulative_kg)
    }
}

/// Five-number summary of cumulative volume at one month across past years
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthEnvelope {
    pub month: u32,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub sample_years: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesReport {
    pub flow: FlowType,
    pub year: i32,
    pub month_ceiling: u32,
    pub current: Option<YearSeries>,
    pub prior: Option<YearSeries>,
    pub envelope: Vec<MonthEnvelope>,
}

/// Group monthly rows by year and accumulate
///
/// Years ascend, months ascend within a year, duplicate (year, month) rows
/// are summed. The running total restarts at every year boundary.
pub fn shape(rows: Vec<MonthlyVolume>) -> Vec<YearSeries> {
    let mut by_year: BTreeMap<i32, BTreeMap<u32, f64>> = BTreeMap::new();
    for r in rows {
        *by_year.entry(r.year).or_default().entry(r.month).or_default() += r.volume_kg;
    }

    by_year
        .into_iter()
        .map(|(year, months)| {
            let mut running = 0.0;
            let points = months
                .into_iter()
                .map(|(month, volume_kg)| {
                    running += volume_kg;
                    CumulativePoint {
                        month,
                        volume_kg,
                        cumulative_kg: running,
                    }
                })
                .collect();
            YearSeries { year, points }
        })
        .collect()
}

/// Linear-interpolation quantile over sorted samples (R type 7)
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Per-month spread of cumulative volume over years before `before_year`
///
/// Months without any historical sample are omitted.
pub fn envelope(series: &[YearSeries], before_year: i32) -> Vec<MonthEnvelope> {
    let mut samples: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for s in series.iter().filter(|s| s.year < before_year) {
        for p in &s.points {
            samples.entry(p.month).or_default().push(p.cumulative_kg);
        }
    }

    samples
        .into_iter()
        .map(|(month, mut values)| {
            values.sort_by(|a, b| a.total_cmp(b));
            MonthEnvelope {
                month,
                min: values[0],
                q1: quantile(&values, 0.25),
                median: quantile(&values, 0.5),
                q3: quantile(&values, 0.75),
                max: values[values.len() - 1],
                sample_years: values.len(),
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct SeriesService {
    store: Arc<dyn AggregateStore>,
    resolver: PeriodResolver,
}

impl SeriesService {
    pub fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self {
            resolver: PeriodResolver::new(store.clone()),
            store,
        }
    }

    /// Current and prior year cumulative lines plus the envelope of the
    /// `history_years` before the selected year
    pub async fn cumulative(
        &self,
        flow: FlowType,
        year: Option<i32>,
        history_years: i32,
    ) -> AnalyticsResult<Option<SeriesReport>> {
        let Some((_, year, ceiling)) = self.resolver.resolve_for(flow, year).await? else {
            return Ok(None);
        };

        let rows = self
            .store
            .query_monthly_series(flow, window_start(year, history_years), year)
            .await?;
        let series = shape(rows);
        let envelope = envelope(&series, year);

        let pick = |y: i32| series.iter().find(|s| s.year == y).cloned();
        Ok(Some(SeriesReport {
            flow,
            year,
            month_ceiling: ceiling,
            current: pick(year),
            prior: pick(year.saturating_sub(1)),
            envelope,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::store::fixtures::{empty_store, row, seeded_store};

    fn mv(year: i32, month: u32, volume_kg: f64) -> MonthlyVolume {
        MonthlyVolume {
            year,
            month,
            volume_kg,
        }
    }

    #[test]
    fn test_shape_accumulates_and_resets() {
        let rows = vec![
            mv(2024, 1, 5.0),
            mv(2023, 2, 2.0),
            mv(2023, 1, 1.0),
            mv(2023, 3, 0.0),
            mv(2024, 2, 1.0),
        ];

        let series = shape(rows);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].year, 2023);
        let cum: Vec<f64> = series[0].points.iter().map(|p| p.cumulative_kg).collect();
        assert_eq!(cum, vec![1.0, 3.0, 3.0]);
        // 2024 starts over from its own January
        assert_eq!(series[1].points[0].cumulative_kg, 5.0);
        assert_eq!(series[1].cumulative_at(2), Some(6.0));

        for s in &series {
            assert!(s.points.windows(2).all(|w| w[1].cumulative_kg >= w[0].cumulative_kg));
            assert!(s.points.windows(2).all(|w| w[1].month > w[0].month));
        }
    }

    #[test]
    fn test_shape_merges_duplicate_months() {
        let series = shape(vec![mv(2022, 4, 1.5), mv(2022, 4, 2.5)]);
        assert_eq!(series[0].points.len(), 1);
        assert_eq!(series[0].points[0].volume_kg, 4.0);
        assert!(shape(Vec::new()).is_empty());
    }

    #[test]
    fn test_quantile_type_seven() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&v, 0.0), 1.0);
        assert_eq!(quantile(&v, 0.25), 1.75);
        assert_eq!(quantile(&v, 0.5), 2.5);
        assert_eq!(quantile(&v, 1.0), 4.0);
        assert_eq!(quantile(&[7.0], 0.75), 7.0);
    }

    #[test]
    fn test_envelope_excludes_selected_year() {
        let mut rows = Vec::new();
        for (year, base) in [(2020, 1.0), (2021, 2.0), (2022, 3.0), (2023, 4.0)] {
            rows.extend((1..=12).map(|m| mv(year, m, base)));
        }
        rows.push(mv(2024, 1, 100.0));
        let series = shape(rows);

        let env = envelope(&series, 2024);

        assert_eq!(env.len(), 12);
        let jan = env[0];
        assert_eq!((jan.month, jan.min, jan.max, jan.sample_years), (1, 1.0, 4.0, 4));
        assert_eq!(jan.median, 2.5);
        let dec = env[11];
        assert_eq!((dec.min, dec.max), (12.0, 48.0));
        assert!(env.iter().all(|e| e.min <= e.q1 && e.q1 <= e.median && e.median <= e.q3 && e.q3 <= e.max));
    }

    #[test]
    fn test_envelope_skips_months_without_history() {
        let series = shape(vec![mv(2022, 3, 1.0), mv(2023, 1, 1.0)]);
        let env = envelope(&series, 2023);
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].month, 3);
    }

    #[tokio::test]
    async fn test_service_report() {
        let mut rows: Vec<_> = (1..=12).map(|m| row(2022, m, 10.0, 0.0)).collect();
        rows.extend((1..=12).map(|m| row(2023, m, 20.0, 0.0)));
        rows.extend((1..=6).map(|m| row(2024, m, 30.0, 0.0)));
        let service = SeriesService::new(Arc::new(seeded_store(FlowType::Import, &rows)));

        let report = service
            .cumulative(FlowType::Import, None, 5)
            .await
            .unwrap()
            .unwrap();

        assert_eq!((report.year, report.month_ceiling), (2024, 6));
        let current = report.current.unwrap();
        assert_eq!(current.points.len(), 6);
        assert_eq!(current.cumulative_at(6), Some(180.0));
        assert_eq!(report.prior.unwrap().cumulative_at(12), Some(240.0));
        assert_eq!(report.envelope[0].sample_years, 2);
    }

    #[tokio::test]
    async fn test_service_no_data() {
        let service = SeriesService::new(Arc::new(empty_store()));
        assert_eq!(service.cumulative(FlowType::Export, None, 5).await.unwrap(), None);
    }
}
