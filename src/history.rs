//! Bounded-retention history store.
//!
//! One SQLite row per completed collection cycle: the summary percentages
//! for trend queries plus the full serialized snapshot for replay. The
//! retention bound is enforced on every append, not only at startup, so no
//! retained record is ever older than the configured window.
//!
//! The orchestrator is the single writer; the API process opens read-only
//! connections per request. A busy timeout covers the brief write bursts, so
//! no cross-process locking beyond SQLite's own is needed.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::snapshot::Snapshot;

/// Hard upper bound on rows returned by a single query.
pub const MAX_QUERY_LIMIT: i64 = 1000;

/// How long a connection waits on a locked database before erroring.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Table and index DDL for the snapshots log.
const SCHEMA_DDL: &str = "
CREATE TABLE IF NOT EXISTS snapshots (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    collected_at TEXT NOT NULL,
    hostname     TEXT,
    cpu_percent  REAL,
    ram_percent  REAL,
    disk_percent REAL,
    raw_json     TEXT
);
CREATE INDEX IF NOT EXISTS idx_snapshots_collected_at ON snapshots(collected_at);
";

/// Errors from the history store.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Database operation failed.
    #[error("history database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Data directory could not be created.
    #[error("history io error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be serialized for the raw_json column.
    #[error("history serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One summary row, newest first in query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub collected_at: String,
    pub hostname: Option<String>,
    pub cpu_percent: Option<f64>,
    pub ram_percent: Option<f64>,
    pub disk_percent: Option<f64>,
}

/// Append-only snapshot log with retention pruning.
pub struct HistoryStore {
    conn: Connection,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore").finish_non_exhaustive()
    }
}

impl HistoryStore {
    /// Open (creating if needed) the store for writing.
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA_DDL)?;
        Ok(Self { conn })
    }

    /// Open an existing store read-only (the API process's view).
    pub fn open_read_only(path: &Path) -> Result<Self, HistoryError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    /// Insert one record for a completed cycle and enforce retention.
    pub fn append(&self, snapshot: &Snapshot, keep_days: u32) -> Result<(), HistoryError> {
        let raw = serde_json::to_string(snapshot)?;
        self.conn.execute(
            "INSERT INTO snapshots (collected_at, hostname, cpu_percent, ram_percent, disk_percent, raw_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                snapshot.collected_at.to_rfc3339(),
                snapshot.hostname,
                snapshot.cpu_percent(),
                snapshot.ram_percent(),
                snapshot.disk_percent(),
                raw,
            ],
        )?;
        self.prune(keep_days)?;
        Ok(())
    }

    /// Delete records older than the retention window. Returns rows removed.
    pub fn prune(&self, keep_days: u32) -> Result<usize, HistoryError> {
        let cutoff = format!("-{} days", keep_days);
        let removed = self.conn.execute(
            "DELETE FROM snapshots WHERE datetime(collected_at) < datetime('now', ?1)",
            params![cutoff],
        )?;
        if removed > 0 {
            tracing::debug!(removed, keep_days, "Pruned history records");
        }
        Ok(removed)
    }

    /// Fetch up to `limit` summary rows, newest first.
    ///
    /// A non-positive limit is defined as an empty result, and any limit is
    /// clamped to [`MAX_QUERY_LIMIT`] to bound response size.
    pub fn query(&self, limit: i64) -> Result<Vec<HistoryRecord>, HistoryError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let limit = limit.min(MAX_QUERY_LIMIT);

        let mut stmt = self.conn.prepare(
            "SELECT collected_at, hostname, cpu_percent, ram_percent, disk_percent
             FROM snapshots ORDER BY collected_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(HistoryRecord {
                collected_at: row.get(0)?,
                hostname: row.get(1)?,
                cpu_percent: row.get(2)?,
                ram_percent: row.get(3)?,
                disk_percent: row.get(4)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(HistoryError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{RamStats, SectionData};
    use chrono::{Duration as ChronoDuration, Utc};
    use tempfile::tempdir;

    fn sample_snapshot(ram_percent: f64) -> Snapshot {
        let mut snapshot = Snapshot::new("historian");
        snapshot.ram = Some(SectionData::Collected(RamStats {
            percent: ram_percent,
            total_gb: 8.0,
            used_gb: 4.0,
            free_gb: 4.0,
            swap_total_gb: 0.0,
            swap_used_gb: 0.0,
            swap_percent: 0.0,
        }));
        snapshot
    }

    /// Insert a row whose collected_at lies `days` in the past.
    fn insert_backdated(path: &Path, days: i64) {
        let conn = Connection::open(path).unwrap();
        let ts = (Utc::now() - ChronoDuration::days(days)).to_rfc3339();
        conn.execute(
            "INSERT INTO snapshots (collected_at, hostname) VALUES (?1, 'old')",
            params![ts],
        )
        .unwrap();
    }

    #[test]
    fn test_append_and_query() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atlas.db");
        let store = HistoryStore::open(&path).unwrap();

        store.append(&sample_snapshot(10.0), 7).unwrap();
        store.append(&sample_snapshot(20.0), 7).unwrap();

        let records = store.query(100).unwrap();
        assert_eq!(records.len(), 2);
        // Newest first.
        assert_eq!(records[0].ram_percent, Some(20.0));
        assert_eq!(records[0].hostname.as_deref(), Some("historian"));
    }

    #[test]
    fn test_retention_purges_expired_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atlas.db");
        let store = HistoryStore::open(&path).unwrap();

        insert_backdated(&path, 8);
        insert_backdated(&path, 6);

        // Any subsequent append enforces the 7-day window.
        store.append(&sample_snapshot(1.0), 7).unwrap();

        let records = store.query(100).unwrap();
        assert_eq!(records.len(), 2, "8-day-old record must be purged");
        let old_rows = records
            .iter()
            .filter(|r| r.hostname.as_deref() == Some("old"))
            .count();
        assert_eq!(old_rows, 1, "only the 6-day-old record survives");
    }

    #[test]
    fn test_prune_is_a_noop_within_window() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atlas.db");
        let store = HistoryStore::open(&path).unwrap();

        insert_backdated(&path, 6);
        assert_eq!(store.prune(7).unwrap(), 0);
        assert_eq!(store.query(10).unwrap().len(), 1);
    }

    #[test]
    fn test_query_limit_clamp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atlas.db");
        let store = HistoryStore::open(&path).unwrap();

        {
            let conn = Connection::open(&path).unwrap();
            let tx = conn.unchecked_transaction().unwrap();
            let now = Utc::now().to_rfc3339();
            for _ in 0..1100 {
                tx.execute(
                    "INSERT INTO snapshots (collected_at, hostname) VALUES (?1, 'bulk')",
                    params![now],
                )
                .unwrap();
            }
            tx.commit().unwrap();
        }

        assert_eq!(store.query(5000).unwrap().len(), 1000);
        assert_eq!(store.query(5).unwrap().len(), 5);
    }

    #[test]
    fn test_query_non_positive_limit_is_empty() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(&dir.path().join("atlas.db")).unwrap();
        store.append(&sample_snapshot(1.0), 7).unwrap();

        assert!(store.query(0).unwrap().is_empty());
        assert!(store.query(-3).unwrap().is_empty());
    }

    #[test]
    fn test_read_only_view() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atlas.db");
        let store = HistoryStore::open(&path).unwrap();
        store.append(&sample_snapshot(33.0), 7).unwrap();

        let reader = HistoryStore::open_read_only(&path).unwrap();
        assert_eq!(reader.query(10).unwrap().len(), 1);
    }

    #[test]
    fn test_read_only_open_missing_is_error() {
        let dir = tempdir().unwrap();
        assert!(HistoryStore::open_read_only(&dir.path().join("absent.db")).is_err());
    }
}
