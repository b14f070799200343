//! comexflow - seafood foreign-trade analytics dashboard
//!
//! Reads the import/export trade tables, computes period-bucketed aggregates
//! and year-over-year KPIs, and serves them over HTTP as JSON records and
//! chart figures.
//!
//! ```text
//! SQLite (trade_imports / trade_exports)
//!     ↓
//! SqliteAggregateStore (allow-listed identifiers, bound values)
//!     ↓
//! PeriodResolver → KpiEngine / DistributionService / SeriesService / TrendService
//!     ↓
//! DashboardEngine::overview()
//!     ↓
//! web router (ETag from CacheKey) → ChartSink
//! ```

pub mod analytics;
pub mod config;
pub mod render;
pub mod sqlite_pragma;
pub mod web;

pub use analytics::{
    AggregateStore, AnalyticsError, DashboardEngine, Dimension, FlowType, KpiSummary,
    ReferencePeriod, SqliteAggregateStore,
};
pub use config::DashboardConfig;
