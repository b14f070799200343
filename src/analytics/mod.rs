//! Analytics Core - period-bucketed trade aggregates and KPIs
//!
//! Turns raw import/export rows into the records the dashboard displays.
//! Every view is scoped to a reference period derived from the data itself,
//! so a partial current year is always compared against the same months of
//! earlier years.
//!
//! # Architecture
//!
//! ```text
//! AggregateStore (SQLite, read-only, blocking pool)
//!     ↓
//! PeriodResolver (latest year/month, month ceiling)
//!     ↓
//! KpiEngine            → KpiSummary (t, USD M, USD/t, deltas)
//! DistributionService  → top-N + Other
//! SeriesService        → cumulative lines + historical envelope
//! TrendService         → volume/price history, per-key evolution,
//!                        tariff-code price drill-down
//!     ↓
//! DashboardEngine (overview with per-section degradation)
//! ```

pub mod cache;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod kpi;
pub mod period;
pub mod schema;
pub mod series;
pub mod store;
pub mod trend;
pub mod types;

pub use cache::{CacheKey, CacheVersionError, FileCacheVersion, StaticVersion, VersionSource};
pub use distribution::{
    BreakdownReport, BreakdownRow, DistributionReport, DistributionRow, DistributionService,
};
pub use engine::{DashboardEngine, OverviewReport, OverviewRequest, NO_DATA_MESSAGE};
pub use error::{AnalyticsError, AnalyticsResult};
pub use kpi::{KpiEngine, KpiSummary};
pub use period::PeriodResolver;
pub use schema::{create_trade_tables, run_schema_migrations};
pub use series::{CumulativePoint, MonthEnvelope, SeriesReport, SeriesService, YearSeries};
pub use store::{AggregateStore, SqliteAggregateStore};
pub use trend::{
    EvolutionPoint, EvolutionReport, HistoryPoint, HistoryReport, TariffPricePoint, TariffReport,
    TrendService,
};
pub use types::{
    Dimension, FlowType, MonthlyVolume, PeriodAggregate, PriceSource, ReferencePeriod,
    YearlyTotals,
};
