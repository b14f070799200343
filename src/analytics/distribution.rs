//! Top-N plus "Other" roll-up over a categorical dimension
//!
//! Used directly for single-dimension distributions and as the pre-pass of
//! two-level (primary → secondary) breakdowns.

use super::error::AnalyticsResult;
use super::period::PeriodResolver;
use super::store::AggregateStore;
use super::types::{safe_ratio, BreakdownSource, Dimension, FlowType, NOT_INFORMED, OTHER_LABEL};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionRow {
    pub key: String,
    pub volume_kg: f64,
    /// Fraction of the period total; `None` when the total is zero
    pub share: Option<f64>,
    pub is_other: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub primary: String,
    pub secondary: String,
    pub volume_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionReport {
    pub flow: FlowType,
    pub year: i32,
    pub month_ceiling: u32,
    pub dimension: Dimension,
    pub total_kg: f64,
    pub rows: Vec<DistributionRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownReport {
    pub flow: FlowType,
    pub year: i32,
    pub month_ceiling: u32,
    pub primary: Dimension,
    pub secondary: Dimension,
    pub rows: Vec<BreakdownRow>,
}

pub(crate) fn normalize_key(key: Option<String>) -> String {
    match key {
        Some(k) if !k.trim().is_empty() => k,
        _ => NOT_INFORMED.to_string(),
    }
}

/// Sum volumes per normalized key, keeping first-seen order
fn merge_keys(rows: impl IntoIterator<Item = (Option<String>, f64)>) -> Vec<(String, f64)> {
    let mut merged: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (key, volume) in rows {
        let key = normalize_key(key);
        match index.get(&key) {
            Some(&i) => merged[i].1 += volume,
            None => {
                index.insert(key.clone(), merged.len());
                merged.push((key, volume));
            }
        }
    }

    merged
}

/// Keep the `top_n` largest buckets and roll the rest into one "Other" row
///
/// Ties keep input order. No "Other" row is emitted when the input has at
/// most `top_n` distinct keys. The output always sums to the input total.
pub fn reduce(rows: Vec<(Option<String>, f64)>, top_n: usize) -> Vec<DistributionRow> {
    let mut merged = merge_keys(rows);
    merged.sort_by(|a, b| b.1.total_cmp(&a.1));

    let row = |(key, volume_kg): (String, f64)| DistributionRow {
        key,
        volume_kg,
        share: None,
        is_other: false,
    };

    let mut out: Vec<DistributionRow> = if merged.len() <= top_n {
        merged.into_iter().map(row).collect()
    } else {
        let rest = merged.split_off(top_n);
        let other_volume: f64 = rest.iter().map(|(_, v)| v).sum();

        let mut kept: Vec<DistributionRow> = merged.into_iter().map(row).collect();
        kept.push(DistributionRow {
            is_other: true,
            ..row((OTHER_LABEL.to_string(), other_volume))
        });
        kept
    };

    share(&mut out);
    out
}

/// Fill each row's fraction of the summed volume
pub fn share(rows: &mut [DistributionRow]) {
    let total: f64 = rows.iter().map(|r| r.volume_kg).sum();
    for r in rows.iter_mut() {
        r.share = safe_ratio(r.volume_kg, total);
    }
}

/// Two-level roll-up: top-N primaries, the rest collapsed to "Other",
/// then exploded by the secondary key
///
/// Rows are ordered by primary rank ("Other" last), then by volume.
pub fn breakdown(rows: Vec<BreakdownSource>, top_n: usize) -> Vec<BreakdownRow> {
    let rows: Vec<(String, String, f64)> = rows
        .into_iter()
        .map(|r| (normalize_key(r.primary), normalize_key(r.secondary), r.volume_kg))
        .collect();

    let ranked = reduce(
        rows.iter().map(|(p, _, v)| (Some(p.clone()), *v)).collect(),
        top_n,
    );
    let rank: HashMap<&str, usize> = ranked
        .iter()
        .filter(|r| !r.is_other)
        .enumerate()
        .map(|(i, r)| (r.key.as_str(), i))
        .collect();
    let other_rank = rank.len();

    let mut grouped: Vec<BreakdownRow> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    for (primary, secondary, volume) in &rows {
        let primary = if rank.contains_key(primary.as_str()) {
            primary.clone()
        } else {
            OTHER_LABEL.to_string()
        };
        let key = (primary, secondary.clone());
        match index.get(&key) {
            Some(&i) => grouped[i].volume_kg += volume,
            None => {
                index.insert(key.clone(), grouped.len());
                grouped.push(BreakdownRow {
                    primary: key.0,
                    secondary: key.1,
                    volume_kg: *volume,
                });
            }
        }
    }

    let rank_of = |p: &str| rank.get(p).copied().unwrap_or(other_rank);
    grouped.sort_by(|a, b| {
        rank_of(&a.primary)
            .cmp(&rank_of(&b.primary))
            .then(b.volume_kg.total_cmp(&a.volume_kg))
    });
    grouped
}

/// Distribution queries for one period
#[derive(Clone)]
pub struct DistributionService {
    store: Arc<dyn AggregateStore>,
    resolver: PeriodResolver,
}

impl DistributionService {
    pub fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self {
            resolver: PeriodResolver::new(store.clone()),
            store,
        }
    }

    /// Top-N distribution of volume by `dimension`; `None` when the flow has no data
    pub async fn distribution(
        &self,
        flow: FlowType,
        year: Option<i32>,
        dimension: Dimension,
        top_n: usize,
    ) -> AnalyticsResult<Option<DistributionReport>> {
        let Some((_, year, ceiling)) = self.resolver.resolve_for(flow, year).await? else {
            return Ok(None);
        };

        let raw = self
            .store
            .query_distribution(flow, year, ceiling, dimension)
            .await?;
        let total_kg = raw.iter().map(|(_, v)| v).sum();

        Ok(Some(DistributionReport {
            flow,
            year,
            month_ceiling: ceiling,
            dimension,
            total_kg,
            rows: reduce(raw, top_n),
        }))
    }

    /// Hierarchical breakdown `primary → secondary`; `None` when the flow has no data
    pub async fn breakdown(
        &self,
        flow: FlowType,
        year: Option<i32>,
        primary: Dimension,
        secondary: Dimension,
        top_n: usize,
    ) -> AnalyticsResult<Option<BreakdownReport>> {
        let Some((_, year, ceiling)) = self.resolver.resolve_for(flow, year).await? else {
            return Ok(None);
        };

        let raw = self
            .store
            .query_breakdown(flow, year, ceiling, primary, secondary)
            .await?;

        Ok(Some(BreakdownReport {
            flow,
            year,
            month_ceiling: ceiling,
            primary,
            secondary,
            rows: breakdown(raw, top_n),
        }))
    }
}
