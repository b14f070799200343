//! Shared fixtures for the integration tests
#![allow(dead_code)]

use comexflow::analytics::{create_trade_tables, StaticVersion};
use comexflow::render::PlotlyFigureSink;
use comexflow::web::AppState;
use comexflow::{DashboardConfig, FlowType, SqliteAggregateStore};
use rusqlite::{params, Connection};
use std::ops::RangeInclusive;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct TradeRow {
    pub year: i32,
    pub month: u32,
    pub weight_kg: f64,
    pub value_usd: f64,
    pub country: Option<&'static str>,
    pub state: Option<&'static str>,
    pub species: Option<&'static str>,
    pub tariff_code: Option<&'static str>,
}

pub fn trade(year: i32, month: u32, weight_kg: f64, value_usd: f64) -> TradeRow {
    TradeRow {
        year,
        month,
        weight_kg,
        value_usd,
        country: None,
        state: None,
        species: None,
        tariff_code: None,
    }
}

/// One row per month over `months`
pub fn monthly(
    year: i32,
    months: RangeInclusive<u32>,
    weight_kg: f64,
    value_usd: f64,
) -> Vec<TradeRow> {
    months.map(|m| trade(year, m, weight_kg, value_usd)).collect()
}

pub fn insert(conn: &Connection, flow: FlowType, rows: &[TradeRow]) {
    let sql = format!(
        "INSERT INTO {} (year, month, weight_kg, value_usd, country, state, species, tariff_code)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        flow.table()
    );
    for r in rows {
        conn.execute(
            &sql,
            params![
                r.year,
                r.month,
                r.weight_kg,
                r.value_usd,
                r.country,
                r.state,
                r.species,
                r.tariff_code
            ],
        )
        .unwrap();
    }
}

/// In-memory store seeded with both flows
pub fn store_with(imports: &[TradeRow], exports: &[TradeRow]) -> SqliteAggregateStore {
    let conn = Connection::open_in_memory().unwrap();
    create_trade_tables(&conn).unwrap();
    insert(&conn, FlowType::Import, imports);
    insert(&conn, FlowType::Export, exports);
    SqliteAggregateStore::from_connection(conn)
}

/// Store without tables: every query fails
pub fn broken_store() -> SqliteAggregateStore {
    SqliteAggregateStore::from_connection(Connection::open_in_memory().unwrap())
}

/// Imports of two tariff codes across 2023 and 2024
pub fn tariff_store() -> SqliteAggregateStore {
    let rows = [
        (2023, "03021100", Some("CL"), 2_000.0, 10_000.0),
        (2023, "03021100", Some("NO"), 1_000.0, 8_000.0),
        (2024, "03021100", Some("CL"), 1_000.0, 6_000.0),
        (2024, "03061711", None, 500.0, 4_000.0),
    ]
    .map(|(year, code, country, kg, usd)| TradeRow {
        country,
        tariff_code: Some(code),
        ..trade(year, 3, kg, usd)
    });
    store_with(&rows, &[])
}

/// Imports 2023-01..12 and 2024-01..06, exports 2023 only
pub fn reference_store() -> SqliteAggregateStore {
    let mut imports = monthly(2023, 1..=12, 1_000.0, 2_000.0);
    imports.extend(monthly(2024, 1..=6, 1_500.0, 3_600.0));
    let exports = monthly(2023, 1..=12, 500.0, 5_000.0);
    store_with(&imports, &exports)
}

pub fn app_state(store: SqliteAggregateStore, version: &str) -> Arc<AppState> {
    app_state_with(store, version, DashboardConfig::default())
}

pub fn app_state_with(
    store: SqliteAggregateStore,
    version: &str,
    config: DashboardConfig,
) -> Arc<AppState> {
    Arc::new(AppState::new(
        Arc::new(store),
        Arc::new(StaticVersion(version.to_string())),
        Arc::new(PlotlyFigureSink),
        config,
    ))
}
