//! Aggregation store adapter over the trade tables
//!
//! Every query is parameterized. The only identifiers interpolated into SQL
//! text are `FlowType::table()` and `Dimension::column()`, both drawn from
//! closed enums, so request text can never reach query structure.

use super::error::{AnalyticsError, AnalyticsResult};
use super::types::{
    BreakdownSource, Dimension, FlowType, MonthlyVolume, PeriodAggregate, PriceSource,
    YearlyTotals,
};
use crate::sqlite_pragma::apply_read_pragmas;
use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Read-only aggregate queries against the per-flow trade tables
///
/// Implementations are injected into the analytics services as
/// `Arc<dyn AggregateStore>`; all failures surface as `StoreUnavailable`.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Most recent year present for the flow
    async fn query_year_max(&self, flow: FlowType) -> AnalyticsResult<Option<i32>>;

    /// Most recent month present within `year`
    async fn query_month_max(&self, flow: FlowType, year: i32) -> AnalyticsResult<Option<u32>>;

    /// Sum of weight and value for `year`, months `1..=month_ceiling`
    ///
    /// A slice with no rows sums to zero.
    async fn query_period_aggregate(
        &self,
        flow: FlowType,
        year: i32,
        month_ceiling: u32,
    ) -> AnalyticsResult<PeriodAggregate>;

    /// Monthly volume for every (year, month) in `year_from..=year_to`,
    /// ordered by year then month
    async fn query_monthly_series(
        &self,
        flow: FlowType,
        year_from: i32,
        year_to: i32,
    ) -> AnalyticsResult<Vec<MonthlyVolume>>;

    /// Volume per dimension key for one period, ordered by volume descending
    ///
    /// NULL keys are returned as `None`; no row limit is applied so the
    /// reducer can keep `sum(top_n) + other == total`.
    async fn query_distribution(
        &self,
        flow: FlowType,
        year: i32,
        month_ceiling: u32,
        dimension: Dimension,
    ) -> AnalyticsResult<Vec<(Option<String>, f64)>>;

    /// Per-year weight and value within a month ceiling
    async fn query_yearly_totals(
        &self,
        flow: FlowType,
        year_from: i32,
        year_to: i32,
        month_ceiling: u32,
    ) -> AnalyticsResult<Vec<YearlyTotals>>;

    /// Volume per (primary, secondary) key pair for one period
    async fn query_breakdown(
        &self,
        flow: FlowType,
        year: i32,
        month_ceiling: u32,
        primary: Dimension,
        secondary: Dimension,
    ) -> AnalyticsResult<Vec<BreakdownSource>>;

    /// Volume per (year, dimension key) within a month ceiling
    async fn query_dimension_by_year(
        &self,
        flow: FlowType,
        year_from: i32,
        year_to: i32,
        month_ceiling: u32,
        dimension: Dimension,
    ) -> AnalyticsResult<Vec<(i32, Option<String>, f64)>>;

    /// Distinct non-blank tariff codes present in `year`, ascending
    async fn query_tariff_codes(&self, flow: FlowType, year: i32) -> AnalyticsResult<Vec<String>>;

    /// Weight and value per (year, dimension key) for one tariff code,
    /// every year on record, ordered by year
    async fn query_price_by_year(
        &self,
        flow: FlowType,
        tariff_code: &str,
        dimension: Dimension,
    ) -> AnalyticsResult<Vec<PriceSource>>;

    /// Total row count for the flow (diagnostics)
    async fn row_count(&self, flow: FlowType) -> AnalyticsResult<i64>;
}

/// Where `SqliteAggregateStore` takes its connections from
enum ConnectionSource {
    /// Read-only connections to a database file; each query takes its own
    File {
        path: PathBuf,
        busy_timeout: Duration,
        idle: Mutex<Vec<Connection>>,
    },
    /// One caller-configured connection (in-memory databases, tests)
    Shared(Mutex<Connection>),
}

struct StoreInner {
    source: ConnectionSource,
    query_timeout: Duration,
}

/// SQLite implementation of AggregateStore
///
/// Queries run on the blocking pool, never on a runtime worker. A file store
/// hands every query its own read-only connection, so one slow scan does not
/// hold up the others. Each query has a deadline of `query_timeout`: SQLite
/// interrupts the statement once it passes and the caller gets
/// `StoreUnavailable`.
pub struct SqliteAggregateStore {
    inner: Arc<StoreInner>,
}

/// Idle file connections kept for reuse
const MAX_IDLE_CONNECTIONS: usize = 8;

/// VM instructions between deadline checks
const PROGRESS_OPS: i32 = 1_000;

/// Deadline for stores wrapping a caller-provided connection
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

fn timed_out(timeout: Duration) -> AnalyticsError {
    AnalyticsError::StoreUnavailable(format!("query timed out after {:?}", timeout))
}

fn open_read_only(path: &Path, busy_timeout: Duration) -> rusqlite::Result<Connection> {
    // No SQLITE_OPEN_CREATE: a missing file is an error, not a new database
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI,
    )?;
    apply_read_pragmas(&conn, busy_timeout)?;
    conn.execute_batch("PRAGMA query_only = ON")?;
    Ok(conn)
}

/// Run `f` with a progress handler that aborts it past `deadline`
fn interruptible<T>(
    conn: &Connection,
    deadline: Instant,
    timeout: Duration,
    f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
) -> AnalyticsResult<T> {
    conn.progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= deadline));
    let result = f(conn);
    conn.progress_handler(0, None::<fn() -> bool>);

    result.map_err(|err| match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::OperationInterrupted => {
            timed_out(timeout)
        }
        other => other.into(),
    })
}

impl StoreInner {
    fn execute<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> AnalyticsResult<T> {
        let deadline = Instant::now() + self.query_timeout;

        match &self.source {
            ConnectionSource::Shared(conn) => {
                let conn = conn.lock().map_err(|_| {
                    AnalyticsError::StoreUnavailable("connection lock poisoned".into())
                })?;
                interruptible(&conn, deadline, self.query_timeout, f)
            }
            ConnectionSource::File {
                path,
                busy_timeout,
                idle,
            } => {
                let pooled = idle.lock().ok().and_then(|mut idle| idle.pop());
                let conn = match pooled {
                    Some(conn) => conn,
                    None => open_read_only(path, *busy_timeout)?,
                };

                let result = interruptible(&conn, deadline, self.query_timeout, f);

                if let Ok(mut idle) = idle.lock() {
                    if idle.len() < MAX_IDLE_CONNECTIONS {
                        idle.push(conn);
                    }
                }
                result
            }
        }
    }
}

impl SqliteAggregateStore {
    /// Open the database at `db_path` read-only (file and tables must exist)
    ///
    /// `query_timeout` bounds both lock waits and statement run time.
    pub fn open(db_path: impl AsRef<Path>, query_timeout: Duration) -> AnalyticsResult<Self> {
        let path = db_path.as_ref().to_path_buf();

        // Fail at startup rather than on the first request
        let first = open_read_only(&path, query_timeout)?;

        Ok(Self {
            inner: Arc::new(StoreInner {
                source: ConnectionSource::File {
                    path,
                    busy_timeout: query_timeout,
                    idle: Mutex::new(vec![first]),
                },
                query_timeout,
            }),
        })
    }

    /// Wrap an already configured connection (in-memory databases, tests)
    ///
    /// Queries share the one connection and run one at a time.
    pub fn from_connection(conn: Connection) -> Self {
        Self::from_connection_with_timeout(conn, DEFAULT_QUERY_TIMEOUT)
    }

    pub fn from_connection_with_timeout(conn: Connection, query_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                source: ConnectionSource::Shared(Mutex::new(conn)),
                query_timeout,
            }),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        self.inner.query_timeout
    }

    /// Run `f` on the blocking pool under the query deadline
    pub(crate) async fn run<T, F>(&self, f: F) -> AnalyticsResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let inner = self.inner.clone();
        let timeout = inner.query_timeout;
        let task = tokio::task::spawn_blocking(move || inner.execute(f));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(AnalyticsError::StoreUnavailable(format!(
                "query task failed: {}",
                join
            ))),
            // The detached task is interrupted by its own deadline
            Err(_) => Err(timed_out(timeout)),
        }
    }
}

#[async_trait]
impl AggregateStore for SqliteAggregateStore {
    async fn query_year_max(&self, flow: FlowType) -> AnalyticsResult<Option<i32>> {
        let sql = format!("SELECT MAX(year) FROM {}", flow.table());
        self.run(move |conn| conn.query_row(&sql, [], |row| row.get(0)))
            .await
    }

    async fn query_month_max(&self, flow: FlowType, year: i32) -> AnalyticsResult<Option<u32>> {
        let sql = format!("SELECT MAX(month) FROM {} WHERE year = ?1", flow.table());
        self.run(move |conn| conn.query_row(&sql, [year], |row| row.get(0)))
            .await
    }

    async fn query_period_aggregate(
        &self,
        flow: FlowType,
        year: i32,
        month_ceiling: u32,
    ) -> AnalyticsResult<PeriodAggregate> {
        let sql = format!(
            "SELECT COALESCE(SUM(weight_kg), 0.0), COALESCE(SUM(value_usd), 0.0)
             FROM {}
             WHERE year = ?1 AND month <= ?2",
            flow.table()
        );

        self.run(move |conn| {
            conn.query_row(&sql, params![year, month_ceiling], |row| {
                Ok(PeriodAggregate {
                    volume_kg: row.get(0)?,
                    value_usd: row.get(1)?,
                })
            })
        })
        .await
    }

    async fn query_monthly_series(
        &self,
        flow: FlowType,
        year_from: i32,
        year_to: i32,
    ) -> AnalyticsResult<Vec<MonthlyVolume>> {
        let sql = format!(
            "SELECT year, month, COALESCE(SUM(weight_kg), 0.0)
             FROM {}
             WHERE year BETWEEN ?1 AND ?2
             GROUP BY year, month
             ORDER BY year, month",
            flow.table()
        );

        let rows = self.run(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let iter = stmt.query_map(params![year_from, year_to], |row| {
                Ok(MonthlyVolume {
                    year: row.get(0)?,
                    month: row.get(1)?,
                    volume_kg: row.get(2)?,
                })
            })?;
            iter.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await?;

        log::debug!(
            "📥 {} monthly rows for {} {}..={}",
            rows.len(),
            flow.as_str(),
            year_from,
            year_to
        );
        Ok(rows)
    }

    async fn query_distribution(
        &self,
        flow: FlowType,
        year: i32,
        month_ceiling: u32,
        dimension: Dimension,
    ) -> AnalyticsResult<Vec<(Option<String>, f64)>> {
        let col = dimension.column();
        let sql = format!(
            "SELECT {col}, COALESCE(SUM(weight_kg), 0.0) AS volume
             FROM {table}
             WHERE year = ?1 AND month <= ?2
             GROUP BY {col}
             ORDER BY volume DESC, {col}",
            col = col,
            table = flow.table()
        );

        let rows = self.run(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let iter = stmt.query_map(params![year, month_ceiling], |row| {
                Ok((row.get::<_, Option<String>>(0)?, row.get::<_, f64>(1)?))
            })?;
            iter.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await?;

        log::debug!(
            "📥 {} {} buckets for {} {} (months <= {})",
            rows.len(),
            dimension.as_str(),
            flow.as_str(),
            year,
            month_ceiling
        );
        Ok(rows)
    }

    async fn query_yearly_totals(
        &self,
        flow: FlowType,
        year_from: i32,
        year_to: i32,
        month_ceiling: u32,
    ) -> AnalyticsResult<Vec<YearlyTotals>> {
        let sql = format!(
            "SELECT year,
                    SUM(CASE WHEN month <= ?3 THEN weight_kg ELSE 0.0 END),
                    SUM(CASE WHEN month <= ?3 THEN value_usd ELSE 0.0 END)
             FROM {}
             WHERE year BETWEEN ?1 AND ?2
             GROUP BY year
             ORDER BY year",
            flow.table()
        );

        self.run(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let iter = stmt.query_map(params![year_from, year_to, month_ceiling], |row| {
                Ok(YearlyTotals {
                    year: row.get(0)?,
                    volume_kg: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                    value_usd: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                })
            })?;
            iter.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    async fn query_breakdown(
        &self,
        flow: FlowType,
        year: i32,
        month_ceiling: u32,
        primary: Dimension,
        secondary: Dimension,
    ) -> AnalyticsResult<Vec<BreakdownSource>> {
        let sql = format!(
            "SELECT {p}, {s}, COALESCE(SUM(weight_kg), 0.0)
             FROM {table}
             WHERE year = ?1 AND month <= ?2
             GROUP BY {p}, {s}",
            p = primary.column(),
            s = secondary.column(),
            table = flow.table()
        );

        self.run(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let iter = stmt.query_map(params![year, month_ceiling], |row| {
                Ok(BreakdownSource {
                    primary: row.get(0)?,
                    secondary: row.get(1)?,
                    volume_kg: row.get(2)?,
                })
            })?;
            iter.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    async fn query_dimension_by_year(
        &self,
        flow: FlowType,
        year_from: i32,
        year_to: i32,
        month_ceiling: u32,
        dimension: Dimension,
    ) -> AnalyticsResult<Vec<(i32, Option<String>, f64)>> {
        let col = dimension.column();
        let sql = format!(
            "SELECT year, {col}, SUM(CASE WHEN month <= ?3 THEN weight_kg ELSE 0.0 END)
             FROM {table}
             WHERE year BETWEEN ?1 AND ?2
             GROUP BY year, {col}
             ORDER BY year, {col}",
            col = col,
            table = flow.table()
        );

        self.run(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let iter = stmt.query_map(params![year_from, year_to, month_ceiling], |row| {
                Ok((
                    row.get::<_, i32>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                ))
            })?;
            iter.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    async fn query_tariff_codes(&self, flow: FlowType, year: i32) -> AnalyticsResult<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT tariff_code
             FROM {}
             WHERE year = ?1 AND tariff_code IS NOT NULL AND TRIM(tariff_code) <> ''
             ORDER BY tariff_code",
            flow.table()
        );

        self.run(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let iter = stmt.query_map([year], |row| row.get::<_, String>(0))?;
            iter.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    async fn query_price_by_year(
        &self,
        flow: FlowType,
        tariff_code: &str,
        dimension: Dimension,
    ) -> AnalyticsResult<Vec<PriceSource>> {
        let col = dimension.column();
        let sql = format!(
            "SELECT year, {col}, COALESCE(SUM(weight_kg), 0.0), COALESCE(SUM(value_usd), 0.0)
             FROM {table}
             WHERE tariff_code = ?1
             GROUP BY year, {col}
             ORDER BY year, {col}",
            col = col,
            table = flow.table()
        );
        let code = tariff_code.to_string();

        let rows = self
            .run(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let iter = stmt.query_map([&code], |row| {
                    Ok(PriceSource {
                        year: row.get(0)?,
                        key: row.get(1)?,
                        volume_kg: row.get(2)?,
                        value_usd: row.get(3)?,
                    })
                })?;
                iter.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;

        log::debug!(
            "📥 {} price rows for tariff code {} ({} by {})",
            rows.len(),
            tariff_code,
            flow.as_str(),
            dimension.as_str()
        );
        Ok(rows)
    }

    async fn row_count(&self, flow: FlowType) -> AnalyticsResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", flow.table());
        self.run(move |conn| conn.query_row(&sql, [], |row| row.get(0)))
            .await
    }
}
