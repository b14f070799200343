//! Reference period resolution

use super::error::AnalyticsResult;
use super::store::AggregateStore;
use super::types::{FlowType, ReferencePeriod};
use std::sync::Arc;

/// Determines the latest (year, month) for a flow
///
/// Recomputed per request; nothing is cached here.
#[derive(Clone)]
pub struct PeriodResolver {
    store: Arc<dyn AggregateStore>,
}

impl PeriodResolver {
    pub fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self { store }
    }

    /// Latest period with data, or `None` when the flow has no rows
    ///
    /// A latest year without any month (data anomaly) also yields `None`
    /// rather than a half-filled period.
    pub async fn resolve(&self, flow: FlowType) -> AnalyticsResult<Option<ReferencePeriod>> {
        let Some(latest_year) = self.store.query_year_max(flow).await? else {
            log::debug!("No rows for flow {}", flow.as_str());
            return Ok(None);
        };

        let Some(latest_month) = self.store.query_month_max(flow, latest_year).await? else {
            log::warn!(
                "⚠️  Flow {} has year {} but no month; treating as no data",
                flow.as_str(),
                latest_year
            );
            return Ok(None);
        };

        Ok(Some(ReferencePeriod {
            latest_year,
            latest_month,
        }))
    }

    /// Resolve the period and the effective month ceiling for `requested_year`
    ///
    /// `requested_year` defaults to the latest year. Returns
    /// `(period, selected_year, month_ceiling)`.
    pub async fn resolve_for(
        &self,
        flow: FlowType,
        requested_year: Option<i32>,
    ) -> AnalyticsResult<Option<(ReferencePeriod, i32, u32)>> {
        Ok(self.resolve(flow).await?.map(|period| {
            let year = requested_year.unwrap_or(period.latest_year);
            (period, year, period.month_ceiling(year))
        }))
    }
}
