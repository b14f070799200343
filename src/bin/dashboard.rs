//! Dashboard server
//!
//! Opens the trade database read-only, wires the analytics engine into the
//! HTTP router and serves until CTRL+C.
//!
//! Usage:
//!   cargo run --release --bin dashboard
//!
//! Environment variables:
//!   COMEX_DB_PATH - SQLite database path (default: comex.db)
//!   DASHBOARD_BIND_ADDR - Listen address (default: 127.0.0.1:8000)
//!   CACHE_VERSION_PATH - Cache version file (default: cache_version.json)
//!   SCHEMA_DIR - Apply .sql migrations from this directory before serving

use comexflow::analytics::{run_schema_migrations, FileCacheVersion, VersionSource};
use comexflow::render::PlotlyFigureSink;
use comexflow::web::{router, AppState};
use comexflow::{AggregateStore, DashboardConfig, SqliteAggregateStore};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info, warn};
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = DashboardConfig::from_env()?;

    info!("🚀 comexflow dashboard");
    info!("   ├─ Build: {}", config.build_tag);
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Bind: {}", config.bind_addr);
    info!("   ├─ Cache version: {}", config.cache_version_path);
    info!("   ├─ Top-N: {}", config.top_n);
    info!("   └─ History window: {} years", config.history_years);

    if let Some(schema_dir) = &config.schema_dir {
        info!("🔧 Initializing database...");
        let mut conn = Connection::open(&config.db_path)?;
        run_schema_migrations(&mut conn, schema_dir)?;
        drop(conn); // Close temporary connection
    }

    let store: Arc<dyn AggregateStore> = Arc::new(SqliteAggregateStore::open(
        &config.db_path,
        Duration::from_millis(config.query_timeout_ms),
    )?);
    info!("✅ Store opened (read-only)");

    let version = FileCacheVersion::new(&config.cache_version_path);
    match version.current_version() {
        Ok(v) => info!("✅ Cache version: {}", v),
        Err(e) => warn!("⚠️  Cache version unavailable, ETags disabled: {}", e),
    }

    let bind_addr = config.bind_addr;
    let state = Arc::new(AppState::new(
        store,
        Arc::new(version),
        Arc::new(PlotlyFigureSink),
        config,
    ));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("🌐 Listening on http://{}", bind_addr);
    info!("🔄 Press CTRL+C to shutdown gracefully");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server failed: {}", e);
        return Err(e.into());
    }

    info!("✅ Dashboard stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
        Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
    }
}
