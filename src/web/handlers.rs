//! Route handlers

use super::params::DashboardQuery;
use super::{cache_key, fresh, not_modified, ApiError, AppState, Section};
use crate::analytics::engine::degrade;
use crate::analytics::{FlowType, OverviewRequest};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

type Handler = Result<Response, ApiError>;

pub(super) async fn index() -> Redirect {
    Redirect::temporary("/api/overview")
}

pub(super) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Latest period per flow; `null` for a flow without rows
pub(super) async fn max_period(State(state): State<Arc<AppState>>) -> Handler {
    let mut body = Map::new();
    for flow in FlowType::all() {
        let period = state.engine.resolver().resolve(flow).await?;
        body.insert(flow.as_str().to_string(), json!(period));
    }
    Ok(fresh(None, Value::Object(body)))
}

pub(super) async fn version(State(state): State<Arc<AppState>>) -> Json<Value> {
    let cache_version = state.version.current_version().ok();
    Json(json!({
        "build_tag": state.config.build_tag,
        "cache_version": cache_version,
    }))
}

pub(super) async fn overview(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
    headers: HeaderMap,
) -> Handler {
    let sel = query.resolve(&state.config)?;
    let key = cache_key(&state, &sel, Some(sel.dimension))
        .await?
        .map(|k| k.with(sel.top_n));
    if let Some(response) = not_modified(key.as_ref(), &headers) {
        return Ok(response);
    }

    let report = state
        .engine
        .overview(OverviewRequest {
            flow: sel.flow,
            year: sel.year,
            dimension: sel.dimension,
            top_n: sel.top_n,
            history_years: sel.history_years,
        })
        .await?;
    Ok(fresh(key.as_ref(), report))
}

pub(super) async fn kpis(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
    headers: HeaderMap,
) -> Handler {
    let sel = query.resolve(&state.config)?;
    let key = cache_key(&state, &sel, None).await?;
    if let Some(response) = not_modified(key.as_ref(), &headers) {
        return Ok(response);
    }

    let year = match (sel.year, key.as_ref().and_then(|k| k.year)) {
        (Some(year), _) | (None, Some(year)) => Some(year),
        (None, None) => state
            .engine
            .resolver()
            .resolve(sel.flow)
            .await?
            .map(|p| p.latest_year),
    };
    let summary = match year {
        Some(year) => Some(state.engine.kpi().compute(sel.flow, year).await?),
        None => None,
    };
    Ok(fresh(
        key.as_ref(),
        Section::new(summary.filter(|s| s.has_data())),
    ))
}

pub(super) async fn distribution(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
    headers: HeaderMap,
) -> Handler {
    let sel = query.resolve(&state.config)?;
    let key = cache_key(&state, &sel, Some(sel.dimension))
        .await?
        .map(|k| k.with(sel.top_n));
    if let Some(response) = not_modified(key.as_ref(), &headers) {
        return Ok(response);
    }

    let report = state
        .engine
        .distribution()
        .distribution(sel.flow, sel.year, sel.dimension, sel.top_n)
        .await?;
    Ok(fresh(key.as_ref(), Section::new(report)))
}

pub(super) async fn breakdown(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
    headers: HeaderMap,
) -> Handler {
    let sel = query.resolve(&state.config)?;
    let key = cache_key(&state, &sel, Some(sel.primary))
        .await?
        .map(|k| k.with(sel.secondary.as_str()).with(sel.top_n));
    if let Some(response) = not_modified(key.as_ref(), &headers) {
        return Ok(response);
    }

    let report = state
        .engine
        .distribution()
        .breakdown(sel.flow, sel.year, sel.primary, sel.secondary, sel.top_n)
        .await?;
    Ok(fresh(key.as_ref(), Section::new(report)))
}

pub(super) async fn series(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
    headers: HeaderMap,
) -> Handler {
    let sel = query.resolve(&state.config)?;
    let key = cache_key(&state, &sel, None)
        .await?
        .map(|k| k.with(sel.history_years));
    if let Some(response) = not_modified(key.as_ref(), &headers) {
        return Ok(response);
    }

    let report = state
        .engine
        .series()
        .cumulative(sel.flow, sel.year, sel.history_years)
        .await?;
    Ok(fresh(key.as_ref(), Section::new(report)))
}

pub(super) async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
    headers: HeaderMap,
) -> Handler {
    let sel = query.resolve(&state.config)?;
    let key = cache_key(&state, &sel, None)
        .await?
        .map(|k| k.with(sel.history_years));
    if let Some(response) = not_modified(key.as_ref(), &headers) {
        return Ok(response);
    }

    let report = state
        .engine
        .trend()
        .volume_price_history(sel.flow, sel.year, sel.history_years)
        .await?;
    Ok(fresh(key.as_ref(), Section::new(report)))
}

pub(super) async fn evolution(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
    headers: HeaderMap,
) -> Handler {
    let sel = query.resolve(&state.config)?;
    let key = cache_key(&state, &sel, Some(sel.dimension))
        .await?
        .map(|k| k.with(sel.history_years).with(sel.top_n));
    if let Some(response) = not_modified(key.as_ref(), &headers) {
        return Ok(response);
    }

    let report = state
        .engine
        .trend()
        .dimension_evolution(
            sel.flow,
            sel.year,
            sel.history_years,
            sel.dimension,
            sel.top_n,
        )
        .await?;
    Ok(fresh(key.as_ref(), Section::new(report)))
}

/// Tariff codes of the selected year plus, with `tariff_code`, that code's
/// yearly average price per dimension key and its figure
pub(super) async fn tariff(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
    headers: HeaderMap,
) -> Handler {
    let sel = query.resolve(&state.config)?;
    let code = query.tariff_code()?;
    let key = cache_key(&state, &sel, Some(sel.dimension))
        .await?
        .map(|k| k.with(code.as_deref().unwrap_or("none")));
    if let Some(response) = not_modified(key.as_ref(), &headers) {
        return Ok(response);
    }

    let report = state
        .engine
        .trend()
        .tariff_price_evolution(sel.flow, sel.year, code.as_deref(), sel.dimension)
        .await?;
    let figure = state.sink.tariff_price(report.as_ref());
    let mut body = json!(Section::new(report));
    body["figure"] = figure;
    Ok(fresh(key.as_ref(), body))
}

/// Every chart of the page as rendered figures; failing sections render
/// as placeholders
pub(super) async fn charts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
    headers: HeaderMap,
) -> Handler {
    let sel = query.resolve(&state.config)?;
    let code = query.tariff_code()?;
    let key = cache_key(&state, &sel, Some(sel.dimension)).await?.map(|k| {
        k.with(sel.top_n)
            .with(sel.primary.as_str())
            .with(sel.secondary.as_str())
            .with(code.as_deref().unwrap_or("none"))
    });
    if let Some(response) = not_modified(key.as_ref(), &headers) {
        return Ok(response);
    }

    let overview = state
        .engine
        .overview(OverviewRequest {
            flow: sel.flow,
            year: sel.year,
            dimension: sel.dimension,
            top_n: sel.top_n,
            history_years: sel.history_years,
        })
        .await?;

    let (breakdown, evolution, tariff) = match overview.year.filter(|_| overview.period.is_some())
    {
        Some(year) => (
            degrade(
                "Breakdown",
                sel.flow,
                state
                    .engine
                    .distribution()
                    .breakdown(sel.flow, Some(year), sel.primary, sel.secondary, sel.top_n)
                    .await,
            ),
            degrade(
                "Evolution",
                sel.flow,
                state
                    .engine
                    .trend()
                    .dimension_evolution(
                        sel.flow,
                        Some(year),
                        sel.history_years,
                        sel.dimension,
                        sel.top_n,
                    )
                    .await,
            ),
            match code.as_deref() {
                Some(code) => degrade(
                    "Tariff price",
                    sel.flow,
                    state
                        .engine
                        .trend()
                        .tariff_price_evolution(sel.flow, Some(year), Some(code), sel.dimension)
                        .await,
                ),
                None => None,
            },
        ),
        None => (None, None, None),
    };

    let sink = &state.sink;
    let body = json!({
        "flow": overview.flow,
        "year": overview.year,
        "month_ceiling": overview.month_ceiling,
        "kpis": overview.kpis,
        "message": overview.message,
        "figures": {
            "history": sink.history(overview.history.as_ref()),
            "cumulative": sink.cumulative(overview.series.as_ref()),
            "distribution": sink.distribution(overview.distribution.as_ref()),
            "breakdown": sink.breakdown(breakdown.as_ref()),
            "evolution": sink.evolution(evolution.as_ref()),
            "tariff": sink.tariff_price(tariff.as_ref()),
        },
    });
    Ok(fresh(key.as_ref(), body))
}

/// Row counts and latest period per table
pub(super) async fn debug_db(State(state): State<Arc<AppState>>) -> Handler {
    let mut tables = Map::new();
    for flow in FlowType::all() {
        let rows = state.store.row_count(flow).await?;
        let latest = state.engine.resolver().resolve(flow).await?;
        tables.insert(
            flow.table().to_string(),
            json!({ "rows": rows, "latest": latest }),
        );
    }

    Ok(Json(json!({
        "db_path": state.config.db_path,
        "tables": tables,
    }))
    .into_response())
}
