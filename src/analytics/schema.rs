//! Trade table schema and the idempotent migration loader
//!
//! The dashboard never writes rows, but local databases and test fixtures
//! need the tables to exist. Every file must use IF NOT EXISTS clauses.

use super::error::{AnalyticsError, AnalyticsResult};
use rusqlite::Connection;
use std::fs;
use std::path::Path;

/// Bundled copy of `sql/00_trade_tables.sql`
pub const TRADE_TABLES_SQL: &str = include_str!("../../sql/00_trade_tables.sql");

/// Create both trade tables from the bundled schema
pub fn create_trade_tables(conn: &Connection) -> AnalyticsResult<()> {
    conn.execute_batch(TRADE_TABLES_SQL)?;
    Ok(())
}

/// Run schema migrations from SQL files
///
/// Reads all .sql files from `schema_dir`, sorted by file name (00_, 01_, ...),
/// and executes each one as a batch. Stops at the first failure.
pub fn run_schema_migrations(conn: &mut Connection, schema_dir: &str) -> AnalyticsResult<usize> {
    let schema_path = Path::new(schema_dir);

    if !schema_path.is_dir() {
        return Err(AnalyticsError::StoreUnavailable(format!(
            "Schema directory not found: {}",
            schema_dir
        )));
    }

    let io_err = |e: std::io::Error| AnalyticsError::StoreUnavailable(e.to_string());

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)
        .map_err(io_err)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();

    sql_files.sort_by_key(|entry| entry.file_name());

    log::info!("🔧 Running schema migrations from: {}", schema_dir);

    let tx = conn.transaction()?;
    for entry in &sql_files {
        let path = entry.path();
        let filename = entry.file_name().to_string_lossy().to_string();

        log::info!("   ├─ Executing: {}", filename);
        let sql_content = fs::read_to_string(&path).map_err(io_err)?;
        tx.execute_batch(&sql_content)?;
    }
    tx.commit()?;

    log::info!("✅ {} schema migration(s) applied", sql_files.len());

    Ok(sql_files.len())
}
