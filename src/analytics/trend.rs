//! Multi-year trend views: volume/price history, per-key evolution and the
//! tariff-code price drill-down
//!
//! History and evolution cut every year in the window at the selected year's
//! month ceiling so a partial current year lines up against the same months
//! of past years. The tariff drill-down averages whole years.

use super::distribution::{normalize_key, reduce};
use super::error::AnalyticsResult;
use super::period::PeriodResolver;
use super::store::AggregateStore;
use super::types::{
    safe_ratio, window_start, Dimension, FlowType, PriceSource, KG_PER_TONNE, OTHER_LABEL,
    USD_PER_MILLION,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub year: i32,
    pub volume_t: f64,
    pub value_musd: f64,
    pub price_usd_per_t: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryReport {
    pub flow: FlowType,
    pub year: i32,
    pub month_ceiling: u32,
    pub points: Vec<HistoryPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolutionPoint {
    pub year: i32,
    pub key: String,
    pub volume_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolutionReport {
    pub flow: FlowType,
    pub year: i32,
    pub month_ceiling: u32,
    pub dimension: Dimension,
    /// Legend order: the selected year's ranking, "Other" last when present
    pub keys: Vec<String>,
    pub points: Vec<EvolutionPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffPricePoint {
    pub year: i32,
    pub key: String,
    pub volume_t: f64,
    pub price_usd_per_t: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffReport {
    pub flow: FlowType,
    pub year: i32,
    pub dimension: Dimension,
    /// Codes present in the selected year, ascending
    pub tariff_codes: Vec<String>,
    pub tariff_code: Option<String>,
    /// Legend order: volume over every year, descending
    pub keys: Vec<String>,
    pub points: Vec<TariffPricePoint>,
}

/// Average price per (year, key)
///
/// Keys are normalized and merged before dividing, so NULL and blank rows
/// price together as "Not informed". A zero-volume bucket has no price.
pub fn price_evolution(rows: Vec<PriceSource>) -> (Vec<String>, Vec<TariffPricePoint>) {
    let mut sums: BTreeMap<(i32, String), (f64, f64)> = BTreeMap::new();
    let mut totals: HashMap<String, f64> = HashMap::new();
    for r in rows {
        let key = normalize_key(r.key);
        *totals.entry(key.clone()).or_default() += r.volume_kg;
        let (kg, usd) = sums.entry((r.year, key)).or_default();
        *kg += r.volume_kg;
        *usd += r.value_usd;
    }

    let mut keys: Vec<String> = totals.keys().cloned().collect();
    keys.sort_by(|a, b| totals[b].total_cmp(&totals[a]).then_with(|| a.cmp(b)));

    let points = sums
        .into_iter()
        .map(|((year, key), (kg, usd))| TariffPricePoint {
            year,
            key,
            volume_t: kg / KG_PER_TONNE,
            price_usd_per_t: safe_ratio(usd, kg).map(|p| p * KG_PER_TONNE),
        })
        .collect();

    (keys, points)
}

/// Collapse per-(year, key) rows to the keys ranked top-N in `selected_year`
pub fn evolution(
    rows: Vec<(i32, Option<String>, f64)>,
    selected_year: i32,
    top_n: usize,
) -> (Vec<String>, Vec<EvolutionPoint>) {
    let rows: Vec<(i32, String, f64)> = rows
        .into_iter()
        .map(|(y, k, v)| (y, normalize_key(k), v))
        .collect();

    let ranking = reduce(
        rows.iter()
            .filter(|(y, _, _)| *y == selected_year)
            .map(|(_, k, v)| (Some(k.clone()), *v))
            .collect(),
        top_n,
    );
    let top: HashSet<String> = ranking
        .iter()
        .filter(|r| !r.is_other)
        .map(|r| r.key.clone())
        .collect();
    let mut keys: Vec<String> = ranking
        .iter()
        .filter(|r| !r.is_other)
        .map(|r| r.key.clone())
        .collect();

    let mut by_year: BTreeMap<i32, HashMap<String, f64>> = BTreeMap::new();
    for (year, key, volume) in rows {
        let key = if top.contains(&key) {
            key
        } else {
            OTHER_LABEL.to_string()
        };
        *by_year.entry(year).or_default().entry(key).or_default() += volume;
    }

    let has_other = by_year.values().any(|m| m.contains_key(OTHER_LABEL));
    if has_other {
        keys.push(OTHER_LABEL.to_string());
    }

    let mut points = Vec::new();
    for (year, volumes) in by_year {
        for key in &keys {
            if let Some(&volume_kg) = volumes.get(key) {
                points.push(EvolutionPoint {
                    year,
                    key: key.clone(),
                    volume_kg,
                });
            }
        }
    }

    (keys, points)
}

#[derive(Clone)]
pub struct TrendService {
    store: Arc<dyn AggregateStore>,
    resolver: PeriodResolver,
}

impl TrendService {
    pub fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self {
            resolver: PeriodResolver::new(store.clone()),
            store,
        }
    }

    /// Volume, value and average price for each year of the window
    ///
    /// Years without rows are reported as zero volume with no price.
    pub async fn volume_price_history(
        &self,
        flow: FlowType,
        year: Option<i32>,
        history_years: i32,
    ) -> AnalyticsResult<Option<HistoryReport>> {
        let Some((_, year, ceiling)) = self.resolver.resolve_for(flow, year).await? else {
            return Ok(None);
        };

        let first_year = window_start(year, history_years);
        let totals: HashMap<i32, (f64, f64)> = self
            .store
            .query_yearly_totals(flow, first_year, year, ceiling)
            .await?
            .into_iter()
            .map(|t| (t.year, (t.volume_kg, t.value_usd)))
            .collect();

        let points = (first_year..=year)
            .map(|y| {
                let (volume_kg, value_usd) = totals.get(&y).copied().unwrap_or_default();
                HistoryPoint {
                    year: y,
                    volume_t: volume_kg / KG_PER_TONNE,
                    value_musd: value_usd / USD_PER_MILLION,
                    price_usd_per_t: safe_ratio(value_usd, volume_kg).map(|p| p * KG_PER_TONNE),
                }
            })
            .collect();

        Ok(Some(HistoryReport {
            flow,
            year,
            month_ceiling: ceiling,
            points,
        }))
    }

    /// Per-year volume of the selected year's top-N keys
    pub async fn dimension_evolution(
        &self,
        flow: FlowType,
        year: Option<i32>,
        history_years: i32,
        dimension: Dimension,
        top_n: usize,
    ) -> AnalyticsResult<Option<EvolutionReport>> {
        let Some((_, year, ceiling)) = self.resolver.resolve_for(flow, year).await? else {
            return Ok(None);
        };

        let rows = self
            .store
            .query_dimension_by_year(
                flow,
                window_start(year, history_years),
                year,
                ceiling,
                dimension,
            )
            .await?;
        let (keys, points) = evolution(rows, year, top_n);

        Ok(Some(EvolutionReport {
            flow,
            year,
            month_ceiling: ceiling,
            dimension,
            keys,
            points,
        }))
    }

    /// Tariff codes of the selected year and, when `tariff_code` is given,
    /// that code's yearly average price per dimension key
    pub async fn tariff_price_evolution(
        &self,
        flow: FlowType,
        year: Option<i32>,
        tariff_code: Option<&str>,
        dimension: Dimension,
    ) -> AnalyticsResult<Option<TariffReport>> {
        let Some((_, year, _)) = self.resolver.resolve_for(flow, year).await? else {
            return Ok(None);
        };

        let tariff_codes = self.store.query_tariff_codes(flow, year).await?;
        let tariff_code = tariff_code.map(str::trim).filter(|c| !c.is_empty());
        let (keys, points) = match tariff_code {
            Some(code) => {
                price_evolution(self.store.query_price_by_year(flow, code, dimension).await?)
            }
            None => (Vec::new(), Vec::new()),
        };

        Ok(Some(TariffReport {
            flow,
            year,
            dimension,
            tariff_codes,
            tariff_code: tariff_code.map(String::from),
            keys,
            points,
        }))
    }
}
