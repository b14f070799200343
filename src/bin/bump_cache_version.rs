//! Bump the dashboard cache version
//!
//! Run after every data load so clients revalidate their cached responses.
//!
//! Usage:
//!   cargo run --bin bump_cache_version [path]
//!
//! The path defaults to CACHE_VERSION_PATH (or cache_version.json).

use comexflow::analytics::FileCacheVersion;
use comexflow::DashboardConfig;
use dotenv::dotenv;
use env_logger::Env;
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let path = match env::args().nth(1) {
        Some(path) => path,
        None => DashboardConfig::from_env()?.cache_version_path,
    };

    let version = FileCacheVersion::new(path).bump()?;
    println!("{}", version);
    Ok(())
}
