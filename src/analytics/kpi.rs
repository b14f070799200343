//! Year-over-year KPI computation
//!
//! Compares the selected year against the prior year over the same months
//! (1..=month_ceiling) so a partial current year is never measured against a
//! full baseline.

use super::error::{AnalyticsError, AnalyticsResult};
use super::period::PeriodResolver;
use super::store::AggregateStore;
use super::types::{
    relative_delta, safe_ratio, FlowType, PeriodAggregate, KG_PER_TONNE, USD_PER_MILLION,
};
use serde::Serialize;
use std::sync::Arc;

/// Headline metrics in presentation units
///
/// Volumes in metric tonnes, values in USD millions, prices in USD per tonne.
/// Every metric is `None` when there is nothing to report; deltas are `None`
/// when the prior-year baseline is zero or missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub year: i32,
    pub prior_year: i32,
    pub month_ceiling: Option<u32>,

    pub volume_t: Option<f64>,
    pub value_musd: Option<f64>,
    pub price_usd_per_t: Option<f64>,

    pub prior_volume_t: Option<f64>,
    pub prior_value_musd: Option<f64>,
    pub prior_price_usd_per_t: Option<f64>,

    pub delta_volume: Option<f64>,
    pub delta_value: Option<f64>,
    pub delta_price: Option<f64>,
}

impl KpiSummary {
    /// Placeholder for a flow without data or an unavailable store
    pub fn no_data(year: i32) -> Self {
        Self {
            year,
            prior_year: year - 1,
            month_ceiling: None,
            volume_t: None,
            value_musd: None,
            price_usd_per_t: None,
            prior_volume_t: None,
            prior_value_musd: None,
            prior_price_usd_per_t: None,
            delta_volume: None,
            delta_value: None,
            delta_price: None,
        }
    }

    /// Build the summary from raw current and prior aggregates
    ///
    /// Units are converted first; deltas are taken on the converted values,
    /// so the price delta compares per-tonne prices.
    pub fn from_aggregates(
        year: i32,
        month_ceiling: u32,
        current: PeriodAggregate,
        prior: PeriodAggregate,
    ) -> Self {
        let volume_t = current.volume_kg / KG_PER_TONNE;
        let value_musd = current.value_usd / USD_PER_MILLION;
        let price_usd_per_t = average_price_per_tonne(current);

        let prior_volume_t = prior.volume_kg / KG_PER_TONNE;
        let prior_value_musd = prior.value_usd / USD_PER_MILLION;
        let prior_price_usd_per_t = average_price_per_tonne(prior);

        Self {
            year,
            prior_year: year - 1,
            month_ceiling: Some(month_ceiling),
            volume_t: Some(volume_t),
            value_musd: Some(value_musd),
            price_usd_per_t,
            prior_volume_t: Some(prior_volume_t),
            prior_value_musd: Some(prior_value_musd),
            prior_price_usd_per_t,
            delta_volume: relative_delta(Some(volume_t), Some(prior_volume_t)),
            delta_value: relative_delta(Some(value_musd), Some(prior_value_musd)),
            delta_price: relative_delta(price_usd_per_t, prior_price_usd_per_t),
        }
    }

    pub fn has_data(&self) -> bool {
        self.month_ceiling.is_some()
    }
}

/// USD per kg scaled to USD per tonne; `None` for zero volume
fn average_price_per_tonne(agg: PeriodAggregate) -> Option<f64> {
    safe_ratio(agg.value_usd, agg.volume_kg).map(|per_kg| per_kg * KG_PER_TONNE)
}

/// KPI engine over an injected store
#[derive(Clone)]
pub struct KpiEngine {
    store: Arc<dyn AggregateStore>,
    resolver: PeriodResolver,
}

impl KpiEngine {
    pub fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self {
            resolver: PeriodResolver::new(store.clone()),
            store,
        }
    }

    /// Compute the KPI summary for `requested_year`
    ///
    /// Returns `KpiSummary::no_data` when the flow has no rows. Store failures
    /// propagate as `StoreUnavailable`.
    pub async fn compute(&self, flow: FlowType, requested_year: i32) -> AnalyticsResult<KpiSummary> {
        let Some(period) = self.resolver.resolve(flow).await? else {
            return Ok(KpiSummary::no_data(requested_year));
        };
        let ceiling = period.month_ceiling(requested_year);

        let current = self
            .store
            .query_period_aggregate(flow, requested_year, ceiling)
            .await?;
        // Same ceiling for the baseline: Jan..ceiling vs Jan..ceiling
        let prior = self
            .store
            .query_period_aggregate(flow, requested_year - 1, ceiling)
            .await?;

        let summary = KpiSummary::from_aggregates(requested_year, ceiling, current, prior);
        log::debug!(
            "📊 KPIs {} {} (months <= {}): volume_t={:?} delta={:?}",
            flow.as_str(),
            requested_year,
            ceiling,
            summary.volume_t,
            summary.delta_volume
        );
        Ok(summary)
    }

    /// Rendering-context variant: a store failure degrades to placeholders
    pub async fn compute_or_placeholder(&self, flow: FlowType, requested_year: i32) -> KpiSummary {
        match self.compute(flow, requested_year).await {
            Ok(summary) => summary,
            Err(AnalyticsError::StoreUnavailable(e)) => {
                log::warn!(
                    "⚠️  KPI query failed for {} {}, rendering placeholders: {}",
                    flow.as_str(),
                    requested_year,
                    e
                );
                KpiSummary::no_data(requested_year)
            }
            Err(e) => {
                log::warn!("⚠️  KPI computation rejected: {}", e);
                KpiSummary::no_data(requested_year)
            }
        }
    }
}
