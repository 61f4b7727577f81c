mod db;
#[cfg(test)]
mod tests;

use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};

use harness_core::{HistorySink, SessionRecord};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::{HistoryQuery, HistoryStatistics};
use db::{RawRecordRow, SELECT_COLUMNS};

/// SQLite-backed session history.
///
/// Rows are written once when a session finishes and never updated. The
/// oldest rows beyond `max_records` are pruned on insert.
pub struct HistoryStore {
    conn: Mutex<Connection>,
    max_records: usize,
}

impl HistoryStore {
    /// Open (or create) `{data_dir}/history.db`.
    pub fn open(data_dir: &Path, max_records: usize) -> Result<Self, String> {
        fs::create_dir_all(data_dir)
            .map_err(|e| format!("failed to create data dir {}: {e}", data_dir.display()))?;

        let db_path = data_dir.join("history.db");
        let conn = Connection::open(&db_path)
            .map_err(|e| format!("failed to open SQLite at {}: {e}", db_path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;
             PRAGMA synchronous=NORMAL;",
        )
        .map_err(|e| format!("failed to set pragmas: {e}"))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id                TEXT PRIMARY KEY,
                timestamp         INTEGER NOT NULL,
                genre             TEXT NOT NULL,
                algorithm         TEXT NOT NULL,
                status            TEXT NOT NULL,
                duration_seconds  REAL NOT NULL,
                coverage          INTEGER NOT NULL,
                crashes           INTEGER NOT NULL,
                total_steps       INTEGER NOT NULL,
                reward_mean       REAL NOT NULL,
                episodes          INTEGER NOT NULL DEFAULT 0,
                notes             TEXT
             );
             CREATE INDEX IF NOT EXISTS idx_sessions_timestamp ON sessions(timestamp);",
        )
        .map_err(|e| format!("failed to create schema: {e}"))?;

        Ok(Self {
            conn: Mutex::new(conn),
            max_records: max_records.max(1),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert one record and prune anything past the retention cap.
    pub fn insert(&self, record: &SessionRecord) -> Result<(), String> {
        let conn = self.conn();
        Self::insert_row(&conn, record)?;

        let pruned = conn
            .execute(
                "DELETE FROM sessions WHERE id NOT IN (
                     SELECT id FROM sessions ORDER BY timestamp DESC, rowid DESC LIMIT ?1
                 )",
                params![self.max_records as i64],
            )
            .map_err(|e| format!("prune history failed: {e}"))?;
        if pruned > 0 {
            tracing::info!(pruned, max_records = self.max_records, "pruned old session history");
        }
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Option<SessionRecord>, String> {
        let row = {
            let conn = self.conn();
            let mut stmt = conn
                .prepare(&format!("SELECT {SELECT_COLUMNS} FROM sessions WHERE id = ?1"))
                .map_err(|e| format!("get record failed: {e}"))?;
            let mut rows = stmt
                .query_map(params![id.to_string()], RawRecordRow::from_row)
                .map_err(|e| format!("get record failed: {e}"))?;
            rows.next()
                .transpose()
                .map_err(|e| format!("get record failed: {e}"))?
        };

        row.map(RawRecordRow::into_record).transpose()
    }

    /// Newest first. Filters compare case-insensitively.
    pub fn list(&self, query: &HistoryQuery) -> Result<Vec<SessionRecord>, String> {
        let rows: Vec<RawRecordRow> = {
            let conn = self.conn();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM sessions
                     WHERE (?1 IS NULL OR LOWER(genre) = LOWER(?1))
                       AND (?2 IS NULL OR LOWER(algorithm) = LOWER(?2))
                       AND (?3 IS NULL OR LOWER(status) = LOWER(?3))
                     ORDER BY timestamp DESC, rowid DESC
                     LIMIT ?4"
                ))
                .map_err(|e| format!("list history failed: {e}"))?;
            let rows = stmt
                .query_map(
                    params![
                        query.genre.as_deref(),
                        query.algorithm.as_deref(),
                        query.status.as_deref(),
                        query.limit() as i64,
                    ],
                    RawRecordRow::from_row,
                )
                .map_err(|e| format!("list history failed: {e}"))?;
            rows.collect::<Result<_, _>>()
                .map_err(|e| format!("list history failed: {e}"))?
        };

        rows.into_iter().map(RawRecordRow::into_record).collect()
    }

    /// Number of rows matching the query filters, ignoring its limit.
    pub fn count_matching(&self, query: &HistoryQuery) -> Result<usize, String> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sessions
                 WHERE (?1 IS NULL OR LOWER(genre) = LOWER(?1))
                   AND (?2 IS NULL OR LOWER(algorithm) = LOWER(?2))
                   AND (?3 IS NULL OR LOWER(status) = LOWER(?3))",
                params![
                    query.genre.as_deref(),
                    query.algorithm.as_deref(),
                    query.status.as_deref(),
                ],
                |row| row.get(0),
            )
            .map_err(|e| format!("count history failed: {e}"))?;
        Ok(count as usize)
    }

    /// Returns true if the record existed.
    pub fn delete(&self, id: Uuid) -> Result<bool, String> {
        let conn = self.conn();
        let deleted = conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id.to_string()])
            .map_err(|e| format!("delete record failed: {e}"))?;
        Ok(deleted > 0)
    }

    /// Remove every record. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, String> {
        let conn = self.conn();
        conn.execute("DELETE FROM sessions", [])
            .map_err(|e| format!("clear history failed: {e}"))
    }

    pub fn count(&self) -> Result<usize, String> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .map_err(|e| format!("count failed: {e}"))?;
        Ok(count as usize)
    }

    pub fn statistics(&self) -> Result<HistoryStatistics, String> {
        let conn = self.conn();
        let (total_tests, average_coverage, average_crashes, total_crashes) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(AVG(coverage), 0.0), COALESCE(AVG(crashes), 0.0),
                        COALESCE(SUM(crashes), 0)
                 FROM sessions",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .map_err(|e| format!("statistics failed: {e}"))?;

        Ok(HistoryStatistics {
            total_tests: total_tests as u64,
            by_genre: Self::group_counts(&conn, "genre")?,
            by_algorithm: Self::group_counts(&conn, "algorithm")?,
            by_status: Self::group_counts(&conn, "status")?,
            average_coverage,
            average_crashes,
            total_crashes: total_crashes as u64,
        })
    }

    /// `column` is one of a fixed set of names, never user input.
    fn group_counts(conn: &Connection, column: &'static str) -> Result<BTreeMap<String, u64>, String> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {column}, COUNT(*) FROM sessions GROUP BY {column}"
            ))
            .map_err(|e| format!("group by {column} failed: {e}"))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| format!("group by {column} failed: {e}"))?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (key, count) = row.map_err(|e| format!("group by {column} failed: {e}"))?;
            counts.insert(key, count as u64);
        }
        Ok(counts)
    }
}

impl HistorySink for HistoryStore {
    fn record(&self, record: &SessionRecord) -> Result<(), String> {
        self.insert(record)
    }
}
