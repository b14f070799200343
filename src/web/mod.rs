//! HTTP surface over the dashboard engine
//!
//! Thin axum layer: parse and validate the query string, resolve the
//! reference period, answer 304 when the client's validator still matches,
//! otherwise compute and serialize the section.

mod handlers;
pub mod params;

use crate::analytics::{
    AggregateStore, AnalyticsError, CacheKey, DashboardEngine, Dimension, VersionSource,
};
use crate::config::DashboardConfig;
use crate::render::ChartSink;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use params::Selection;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Shared per-process state, injected into every handler
pub struct AppState {
    pub engine: DashboardEngine,
    pub store: Arc<dyn AggregateStore>,
    pub version: Arc<dyn VersionSource>,
    pub sink: Arc<dyn ChartSink>,
    pub config: DashboardConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AggregateStore>,
        version: Arc<dyn VersionSource>,
        sink: Arc<dyn ChartSink>,
        config: DashboardConfig,
    ) -> Self {
        Self {
            engine: DashboardEngine::new(store.clone()),
            store,
            version,
            sink,
            config,
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Analytics(AnalyticsError),
    BadParameter(String),
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        ApiError::Analytics(err)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Analytics(e) => write!(f, "{}", e),
            ApiError::BadParameter(msg) => write!(f, "{}", msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::Analytics(e) if e.is_invalid_input() => StatusCode::BAD_REQUEST,
            ApiError::Analytics(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        if status == StatusCode::SERVICE_UNAVAILABLE {
            log::error!("❌ Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Body shape of the single-section API routes
#[derive(Debug, Serialize)]
pub struct Section<T: Serialize> {
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl<T: Serialize> Section<T> {
    pub fn new(data: Option<T>) -> Self {
        let message = data
            .is_none()
            .then_some(crate::analytics::NO_DATA_MESSAGE);
        Self { data, message }
    }
}

/// Validation key for a selection, built from the resolved period
///
/// `None` when the version token is unavailable; the response is then served
/// without an ETag.
pub(crate) async fn cache_key(
    state: &AppState,
    selection: &Selection,
    dimension: Option<Dimension>,
) -> Result<Option<CacheKey>, ApiError> {
    let resolved = state
        .engine
        .resolver()
        .resolve_for(selection.flow, selection.year)
        .await?;
    let (year, ceiling) = match resolved {
        Some((_, year, ceiling)) => (Some(year), Some(ceiling)),
        None => (selection.year, None),
    };

    match state.version.current_version() {
        Ok(version) => Ok(Some(CacheKey::new(
            selection.flow,
            year,
            ceiling,
            dimension,
            version,
        ))),
        Err(e) => {
            log::warn!("⚠️  Cache version unavailable, serving without ETag: {}", e);
            Ok(None)
        }
    }
}

/// 304 response when `If-None-Match` still matches `key`
pub(crate) fn not_modified(key: Option<&CacheKey>, headers: &HeaderMap) -> Option<Response> {
    let key = key?;
    let condition = headers.get(header::IF_NONE_MATCH)?.to_str().ok()?;
    if !key.matches(condition) {
        return None;
    }

    let mut response = StatusCode::NOT_MODIFIED.into_response();
    set_validators(response.headers_mut(), Some(key));
    Some(response)
}

/// JSON body with `Cache-Control: no-cache` and the ETag when available
pub(crate) fn fresh<T: Serialize>(key: Option<&CacheKey>, body: T) -> Response {
    let mut response = Json(body).into_response();
    set_validators(response.headers_mut(), key);
    response
}

fn set_validators(headers: &mut HeaderMap, key: Option<&CacheKey>) {
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Some(value) = key.and_then(|k| HeaderValue::from_str(&k.etag()).ok()) {
        headers.insert(header::ETAG, value);
    }
}

/// Adds `Content-Security-Policy: frame-ancestors ...` when configured
async fn frame_ancestors(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    if let Some(origins) = &state.config.frame_ancestors {
        match HeaderValue::from_str(&format!("frame-ancestors {}", origins)) {
            Ok(value) => {
                response
                    .headers_mut()
                    .insert(header::CONTENT_SECURITY_POLICY, value);
            }
            Err(_) => log::warn!("⚠️  FRAME_ANCESTORS is not a valid header value"),
        }
    }
    response
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/health/maxperiod", get(handlers::max_period))
        .route("/__version__", get(handlers::version))
        .route("/api/overview", get(handlers::overview))
        .route("/api/kpis", get(handlers::kpis))
        .route("/api/distribution", get(handlers::distribution))
        .route("/api/breakdown", get(handlers::breakdown))
        .route("/api/series", get(handlers::series))
        .route("/api/history", get(handlers::history))
        .route("/api/evolution", get(handlers::evolution))
        .route("/api/tariff", get(handlers::tariff))
        .route("/api/charts", get(handlers::charts))
        .route("/debug/db", get(handlers::debug_db))
        .layer(middleware::from_fn_with_state(state.clone(), frame_ancestors))
        .with_state(state)
}
