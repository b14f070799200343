//! Shared SQLite PRAGMA setup for dashboard connections
//!
//! The dashboard only reads. Every PRAGMA here is connection-local, so
//! applying them never writes to the database file; the journal mode stays
//! whatever the ingestion job chose.

use rusqlite::Connection;
use std::time::Duration;

/// Apply read-side PRAGMAs (NORMAL sync, MEMORY temp store, mmap, cache)
/// and the busy timeout after which a locked query fails.
pub fn apply_read_pragmas(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "mmap_size", 268_435_456i64)?;
    conn.pragma_update(None, "cache_size", -64_000i64)?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::OpenFlags;

    #[test]
    fn test_pragmas_apply_on_read_only_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pragma.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER)")
            .unwrap();

        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY).unwrap();
        apply_read_pragmas(&conn, Duration::from_millis(250)).unwrap();

        let temp_store: i64 = conn
            .query_row("PRAGMA temp_store", [], |row| row.get(0))
            .unwrap();
        assert_eq!(temp_store, 2); // MEMORY

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "delete");
    }

    #[test]
    fn test_pragmas_apply_in_memory() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(apply_read_pragmas(&conn, Duration::from_secs(1)).is_ok());
    }
}
