//! Cache-version token and HTTP validation keys
//!
//! The version is a UTC timestamp stored in a small JSON file that the
//! ingestion side bumps after every load. Response validators combine it with
//! the resolved period so a client revalidates only when either changes.

use super::types::{Dimension, FlowType};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Timestamp layout of the version token, e.g. `20240715T093000Z`
pub const VERSION_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Debug)]
pub enum CacheVersionError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl std::fmt::Display for CacheVersionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheVersionError::Io(e) => write!(f, "Cache version I/O error: {}", e),
            CacheVersionError::Serialization(e) => {
                write!(f, "Cache version serialization error: {}", e)
            }
        }
    }
}

impl std::error::Error for CacheVersionError {}

impl From<std::io::Error> for CacheVersionError {
    fn from(err: std::io::Error) -> Self {
        CacheVersionError::Io(err)
    }
}

impl From<serde_json::Error> for CacheVersionError {
    fn from(err: serde_json::Error) -> Self {
        CacheVersionError::Serialization(err)
    }
}

/// Source of the data-version token
pub trait VersionSource: Send + Sync {
    fn current_version(&self) -> Result<String, CacheVersionError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionFile {
    version: String,
}

/// Version token persisted as `{"version": "..."}`
#[derive(Debug, Clone)]
pub struct FileCacheVersion {
    path: PathBuf,
}

impl FileCacheVersion {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a fresh token stamped with the current UTC time
    ///
    /// Written to a sibling temp file and renamed, so readers never observe a
    /// half-written file.
    pub fn bump(&self) -> Result<String, CacheVersionError> {
        let version = Utc::now().format(VERSION_FORMAT).to_string();
        let body = serde_json::to_string(&VersionFile {
            version: version.clone(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;

        log::info!("🔄 Cache version bumped to {} ({})", version, self.path.display());
        Ok(version)
    }

    fn read(&self) -> Result<String, CacheVersionError> {
        let raw = fs::read_to_string(&self.path)?;
        let file: VersionFile = serde_json::from_str(&raw)?;
        Ok(file.version)
    }
}

impl VersionSource for FileCacheVersion {
    /// Missing or corrupt files are replaced by a fresh bump
    fn current_version(&self) -> Result<String, CacheVersionError> {
        match self.read() {
            Ok(version) if !version.trim().is_empty() => Ok(version),
            Ok(_) => self.bump(),
            Err(e) => {
                log::warn!(
                    "⚠️  Cache version file {} unreadable ({}), regenerating",
                    self.path.display(),
                    e
                );
                self.bump()
            }
        }
    }
}

/// Fixed token, for tests and read-only deployments
#[derive(Debug, Clone)]
pub struct StaticVersion(pub String);

impl VersionSource for StaticVersion {
    fn current_version(&self) -> Result<String, CacheVersionError> {
        Ok(self.0.clone())
    }
}

/// Inputs that determine a dashboard response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub flow: FlowType,
    pub year: Option<i32>,
    pub month_ceiling: Option<u32>,
    pub dimension: Option<Dimension>,
    pub version: String,
    extra: Vec<String>,
}

impl CacheKey {
    pub fn new(
        flow: FlowType,
        year: Option<i32>,
        month_ceiling: Option<u32>,
        dimension: Option<Dimension>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            flow,
            year,
            month_ceiling,
            dimension,
            version: version.into(),
            extra: Vec::new(),
        }
    }

    /// Add a further response-shaping parameter (top-N, secondary key, ...)
    pub fn with(mut self, part: impl ToString) -> Self {
        self.extra.push(part.to_string());
        self
    }

    /// Quoted strong validator
    pub fn etag(&self) -> String {
        let opt = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
        let mut parts = vec![
            self.version.clone(),
            self.flow.as_str().to_string(),
            opt(self.year.map(|y| y.to_string())),
            opt(self.month_ceiling.map(|m| m.to_string())),
            opt(self.dimension.map(|d| d.as_str().to_string())),
        ];
        parts.extend(self.extra.iter().cloned());

        let sanitized: String = parts
            .join("-")
            .chars()
            .filter(|c| c.is_ascii_graphic() && *c != '"')
            .collect();
        format!("\"{}\"", sanitized)
    }

    /// Evaluate an `If-None-Match` header value against this key
    ///
    /// Accepts `*` and comma-separated lists; weak tags compare by opaque value.
    pub fn matches(&self, if_none_match: &str) -> bool {
        let etag = self.etag();
        if_none_match.split(',').map(str::trim).any(|candidate| {
            candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
        })
    }
}
