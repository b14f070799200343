//! Dashboard engine: one entry point over all analytics services
//!
//! Holds a single injected store shared by every service. The overview
//! degrades section by section: a failing query blanks its own section and
//! logs a warning, while a failing period lookup fails the whole request.

use super::distribution::{DistributionReport, DistributionService};
use super::error::AnalyticsResult;
use super::kpi::{KpiEngine, KpiSummary};
use super::period::PeriodResolver;
use super::series::{SeriesReport, SeriesService};
use super::store::AggregateStore;
use super::trend::{HistoryReport, TrendService};
use super::types::{Dimension, FlowType, ReferencePeriod};
use serde::Serialize;
use std::sync::Arc;

/// User-facing message for an empty selection
pub const NO_DATA_MESSAGE: &str = "no data for this selection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverviewRequest {
    pub flow: FlowType,
    pub year: Option<i32>,
    pub dimension: Dimension,
    pub top_n: usize,
    pub history_years: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewReport {
    pub flow: FlowType,
    pub period: Option<ReferencePeriod>,
    pub year: Option<i32>,
    pub month_ceiling: Option<u32>,
    pub dimension: Dimension,
    pub kpis: Option<KpiSummary>,
    pub history: Option<HistoryReport>,
    pub series: Option<SeriesReport>,
    pub distribution: Option<DistributionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OverviewReport {
    fn empty(request: &OverviewRequest) -> Self {
        Self {
            flow: request.flow,
            period: None,
            year: request.year,
            month_ceiling: None,
            dimension: request.dimension,
            kpis: None,
            history: None,
            series: None,
            distribution: None,
            message: Some(NO_DATA_MESSAGE.to_string()),
        }
    }
}

pub(crate) fn degrade<T>(
    section: &str,
    flow: FlowType,
    result: AnalyticsResult<Option<T>>,
) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            log::warn!(
                "⚠️  {} section unavailable for {}: {}",
                section,
                flow.as_str(),
                e
            );
            None
        }
    }
}

#[derive(Clone)]
pub struct DashboardEngine {
    resolver: PeriodResolver,
    kpi: KpiEngine,
    distribution: DistributionService,
    series: SeriesService,
    trend: TrendService,
}

impl DashboardEngine {
    pub fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self {
            resolver: PeriodResolver::new(store.clone()),
            kpi: KpiEngine::new(store.clone()),
            distribution: DistributionService::new(store.clone()),
            series: SeriesService::new(store.clone()),
            trend: TrendService::new(store),
        }
    }

    pub fn resolver(&self) -> &PeriodResolver {
        &self.resolver
    }

    pub fn kpi(&self) -> &KpiEngine {
        &self.kpi
    }

    pub fn distribution(&self) -> &DistributionService {
        &self.distribution
    }

    pub fn series(&self) -> &SeriesService {
        &self.series
    }

    pub fn trend(&self) -> &TrendService {
        &self.trend
    }

    /// Everything the main page shows for one selection
    pub async fn overview(&self, request: OverviewRequest) -> AnalyticsResult<OverviewReport> {
        let flow = request.flow;
        let Some((period, year, ceiling)) = self.resolver.resolve_for(flow, request.year).await?
        else {
            return Ok(OverviewReport::empty(&request));
        };

        let kpis = self.kpi.compute_or_placeholder(flow, year).await;
        let history = degrade(
            "History",
            flow,
            self.trend
                .volume_price_history(flow, Some(year), request.history_years)
                .await,
        );
        let series = degrade(
            "Cumulative series",
            flow,
            self.series
                .cumulative(flow, Some(year), request.history_years)
                .await,
        );
        let distribution = degrade(
            "Distribution",
            flow,
            self.distribution
                .distribution(flow, Some(year), request.dimension, request.top_n)
                .await,
        );

        let message = (!kpis.has_data()).then(|| NO_DATA_MESSAGE.to_string());

        Ok(OverviewReport {
            flow,
            period: Some(period),
            year: Some(year),
            month_ceiling: Some(ceiling),
            dimension: request.dimension,
            kpis: Some(kpis),
            history,
            series,
            distribution,
            message,
        })
    }
}
