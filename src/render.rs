//! Chart rendering sink
//!
//! Analytics records go in, embeddable figures come out. `PlotlyFigureSink`
//! emits Plotly figure JSON (`{"data": [...], "layout": {...}}`) that the page
//! hands straight to `Plotly.newPlot`. Empty or missing input renders the
//! "no data for this selection" placeholder instead of an empty chart.
//! Volumes are plotted in tonnes and prices in USD/t throughout.

use crate::analytics::types::KG_PER_TONNE;
use crate::analytics::{
    BreakdownReport, DistributionReport, EvolutionReport, FlowType, HistoryReport, SeriesReport,
    TariffReport, NO_DATA_MESSAGE,
};
use serde_json::{json, Value};
use std::collections::HashMap;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn month_name(month: u32) -> &'static str {
    MONTHS
        .get((month as usize).wrapping_sub(1))
        .copied()
        .unwrap_or("?")
}

fn flow_title(flow: FlowType) -> &'static str {
    match flow {
        FlowType::Import => "Imports",
        FlowType::Export => "Exports",
    }
}

fn window_label(month_ceiling: u32) -> String {
    if month_ceiling >= 12 {
        "full year".to_string()
    } else {
        format!("Jan-{}", month_name(month_ceiling))
    }
}

/// Consumer of the structured analytics records
pub trait ChartSink: Send + Sync {
    fn history(&self, report: Option<&HistoryReport>) -> Value;
    fn cumulative(&self, report: Option<&SeriesReport>) -> Value;
    fn distribution(&self, report: Option<&DistributionReport>) -> Value;
    fn breakdown(&self, report: Option<&BreakdownReport>) -> Value;
    fn evolution(&self, report: Option<&EvolutionReport>) -> Value;
    fn tariff_price(&self, report: Option<&TariffReport>) -> Value;
    fn placeholder(&self, message: &str) -> Value;
}

#[derive(Debug, Clone, Default)]
pub struct PlotlyFigureSink;

impl ChartSink for PlotlyFigureSink {
    /// Volume bars with the average price on a secondary axis
    fn history(&self, report: Option<&HistoryReport>) -> Value {
        let Some(report) = report.filter(|r| r.points.iter().any(|p| p.volume_t > 0.0)) else {
            return self.placeholder(NO_DATA_MESSAGE);
        };

        let years: Vec<i32> = report.points.iter().map(|p| p.year).collect();
        let volumes: Vec<f64> = report.points.iter().map(|p| p.volume_t).collect();
        let prices: Vec<Option<f64>> = report.points.iter().map(|p| p.price_usd_per_t).collect();

        json!({
            "data": [
                {
                    "type": "bar",
                    "name": "Volume (t)",
                    "x": years,
                    "y": volumes,
                },
                {
                    "type": "scatter",
                    "mode": "lines+markers",
                    "name": "Average price (USD/t)",
                    "x": years,
                    "y": prices,
                    "yaxis": "y2",
                },
            ],
            "layout": {
                "title": {"text": format!("{}: volume and price, {}", flow_title(report.flow), window_label(report.month_ceiling))},
                "xaxis": {"type": "category"},
                "yaxis": {"title": {"text": "t"}},
                "yaxis2": {"title": {"text": "USD/t"}, "overlaying": "y", "side": "right"},
                "legend": {"orientation": "h"},
            },
        })
    }

    /// Historical box envelope with the selected and prior year as lines
    fn cumulative(&self, report: Option<&SeriesReport>) -> Value {
        let Some(report) = report.filter(|r| r.current.is_some() || !r.envelope.is_empty()) else {
            return self.placeholder(NO_DATA_MESSAGE);
        };

        let mut data = Vec::new();
        if !report.envelope.is_empty() {
            let env = &report.envelope;
            data.push(json!({
                "type": "box",
                "name": "Historical range",
                "x": env.iter().map(|e| month_name(e.month)).collect::<Vec<_>>(),
                "lowerfence": env.iter().map(|e| e.min / KG_PER_TONNE).collect::<Vec<_>>(),
                "q1": env.iter().map(|e| e.q1 / KG_PER_TONNE).collect::<Vec<_>>(),
                "median": env.iter().map(|e| e.median / KG_PER_TONNE).collect::<Vec<_>>(),
                "q3": env.iter().map(|e| e.q3 / KG_PER_TONNE).collect::<Vec<_>>(),
                "upperfence": env.iter().map(|e| e.max / KG_PER_TONNE).collect::<Vec<_>>(),
            }));
        }
        for series in [&report.prior, &report.current].into_iter().flatten() {
            data.push(json!({
                "type": "scatter",
                "mode": "lines+markers",
                "name": series.year.to_string(),
                "x": series.points.iter().map(|p| month_name(p.month)).collect::<Vec<_>>(),
                "y": series
                    .points
                    .iter()
                    .map(|p| p.cumulative_kg / KG_PER_TONNE)
                    .collect::<Vec<_>>(),
            }));
        }

        json!({
            "data": data,
            "layout": {
                "title": {"text": format!("{}: cumulative monthly volume", flow_title(report.flow))},
                "xaxis": {"type": "category", "categoryarray": MONTHS},
                "yaxis": {"title": {"text": "t"}},
            },
        })
    }

    /// Donut of the top-N buckets
    fn distribution(&self, report: Option<&DistributionReport>) -> Value {
        let Some(report) = report.filter(|r| !r.rows.is_empty()) else {
            return self.placeholder(NO_DATA_MESSAGE);
        };

        json!({
            "data": [{
                "type": "pie",
                "hole": 0.5,
                "sort": false,
                "labels": report.rows.iter().map(|r| r.key.as_str()).collect::<Vec<_>>(),
                "values": report
                    .rows
                    .iter()
                    .map(|r| r.volume_kg / KG_PER_TONNE)
                    .collect::<Vec<_>>(),
            }],
            "layout": {
                "title": {"text": format!(
                    "{} by {} ({} {})",
                    flow_title(report.flow),
                    report.dimension.label().to_lowercase(),
                    report.year,
                    window_label(report.month_ceiling)
                )},
            },
        })
    }

    /// Sunburst with primaries on the inner ring
    fn breakdown(&self, report: Option<&BreakdownReport>) -> Value {
        let Some(report) = report.filter(|r| !r.rows.is_empty()) else {
            return self.placeholder(NO_DATA_MESSAGE);
        };

        let mut primaries: Vec<&str> = Vec::new();
        let mut totals: HashMap<&str, f64> = HashMap::new();
        for r in &report.rows {
            let total = totals.entry(r.primary.as_str()).or_insert_with(|| {
                primaries.push(r.primary.as_str());
                0.0
            });
            *total += r.volume_kg / KG_PER_TONNE;
        }

        let mut ids = Vec::new();
        let mut labels = Vec::new();
        let mut parents = Vec::new();
        let mut values = Vec::new();
        for p in &primaries {
            ids.push(p.to_string());
            labels.push(p.to_string());
            parents.push(String::new());
            values.push(totals[p]);
        }
        for r in &report.rows {
            ids.push(format!("{}/{}", r.primary, r.secondary));
            labels.push(r.secondary.clone());
            parents.push(r.primary.clone());
            values.push(r.volume_kg / KG_PER_TONNE);
        }

        json!({
            "data": [{
                "type": "sunburst",
                "branchvalues": "total",
                "ids": ids,
                "labels": labels,
                "parents": parents,
                "values": values,
            }],
            "layout": {
                "title": {"text": format!(
                    "{} by {} and {} ({})",
                    flow_title(report.flow),
                    report.primary.label().to_lowercase(),
                    report.secondary.label().to_lowercase(),
                    report.year
                )},
            },
        })
    }

    /// One line per key across the history window
    fn evolution(&self, report: Option<&EvolutionReport>) -> Value {
        let Some(report) = report.filter(|r| !r.points.is_empty()) else {
            return self.placeholder(NO_DATA_MESSAGE);
        };

        let data: Vec<Value> = report
            .keys
            .iter()
            .map(|key| {
                let points: Vec<_> = report.points.iter().filter(|p| &p.key == key).collect();
                json!({
                    "type": "scatter",
                    "mode": "lines+markers",
                    "name": key,
                    "x": points.iter().map(|p| p.year).collect::<Vec<_>>(),
                    "y": points.iter().map(|p| p.volume_kg / KG_PER_TONNE).collect::<Vec<_>>(),
                })
            })
            .collect();

        json!({
            "data": data,
            "layout": {
                "title": {"text": format!(
                    "{} by {}, {}",
                    flow_title(report.flow),
                    report.dimension.label().to_lowercase(),
                    window_label(report.month_ceiling)
                )},
                "xaxis": {"type": "category"},
                "yaxis": {"title": {"text": "t"}},
            },
        })
    }

    /// Yearly average price of one tariff code, one line per key
    fn tariff_price(&self, report: Option<&TariffReport>) -> Value {
        let Some(report) = report.filter(|r| r.points.iter().any(|p| p.price_usd_per_t.is_some()))
        else {
            return self.placeholder(NO_DATA_MESSAGE);
        };
        let code = report.tariff_code.as_deref().unwrap_or_default();

        let data: Vec<Value> = report
            .keys
            .iter()
            .map(|key| {
                let points: Vec<_> = report.points.iter().filter(|p| &p.key == key).collect();
                json!({
                    "type": "scatter",
                    "mode": "lines+markers",
                    "name": key,
                    "x": points.iter().map(|p| p.year).collect::<Vec<_>>(),
                    "y": points.iter().map(|p| p.price_usd_per_t).collect::<Vec<_>>(),
                })
            })
            .collect();

        json!({
            "data": data,
            "layout": {
                "title": {"text": format!(
                    "{}: average price of tariff code {} by {}",
                    flow_title(report.flow),
                    code,
                    report.dimension.label().to_lowercase()
                )},
                "xaxis": {"type": "category"},
                "yaxis": {"title": {"text": "USD/t"}},
            },
        })
    }

    fn placeholder(&self, message: &str) -> Value {
        json!({ "placeholder": message })
    }
}
