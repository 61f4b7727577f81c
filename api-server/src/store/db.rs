use std::str::FromStr;

use harness_core::{Genre, RecordedMetrics, SessionRecord, SessionStatus};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::HistoryStore;

pub(super) const SELECT_COLUMNS: &str = "id, timestamp, genre, algorithm, status, duration_seconds,
     coverage, crashes, total_steps, reward_mean, episodes, notes";

impl HistoryStore {
    /// Insert one session row into SQLite.
    pub(super) fn insert_row(conn: &Connection, record: &SessionRecord) -> Result<(), String> {
        conn.execute(
            "INSERT INTO sessions (
                id, timestamp, genre, algorithm, status, duration_seconds,
                coverage, crashes, total_steps, reward_mean, episodes, notes
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
            params![
                record.id.to_string(),
                record.timestamp as i64,
                record.genre.as_str(),
                record.algorithm,
                record.status.as_str(),
                record.duration_seconds,
                record.metrics.coverage as i64,
                record.metrics.crashes as i64,
                record.metrics.total_steps as i64,
                record.metrics.reward_mean,
                record.metrics.episodes as i64,
                record.notes.as_deref(),
            ],
        )
        .map_err(|e| format!("insert session record failed: {e}"))?;
        Ok(())
    }
}

pub(super) struct RawRecordRow {
    id: String,
    timestamp: i64,
    genre: String,
    algorithm: String,
    status: String,
    duration_seconds: f64,
    coverage: i64,
    crashes: i64,
    total_steps: i64,
    reward_mean: f64,
    episodes: i64,
    notes: Option<String>,
}

impl RawRecordRow {
    pub(super) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            genre: row.get(2)?,
            algorithm: row.get(3)?,
            status: row.get(4)?,
            duration_seconds: row.get(5)?,
            coverage: row.get(6)?,
            crashes: row.get(7)?,
            total_steps: row.get(8)?,
            reward_mean: row.get(9)?,
            episodes: row.get(10)?,
            notes: row.get(11)?,
        })
    }

    pub(super) fn into_record(self) -> Result<SessionRecord, String> {
        let id = Uuid::parse_str(&self.id).map_err(|e| format!("bad uuid in db: {e}"))?;
        let genre = Genre::from_str(&self.genre).map_err(|e| format!("bad genre in db: {e}"))?;
        let status = SessionStatus::from_str(&self.status)?;

        Ok(SessionRecord {
            id,
            timestamp: self.timestamp as u64,
            genre,
            algorithm: self.algorithm,
            status,
            duration_seconds: self.duration_seconds,
            metrics: RecordedMetrics {
                coverage: self.coverage as usize,
                crashes: self.crashes as u64,
                total_steps: self.total_steps as u64,
                reward_mean: self.reward_mean,
                episodes: self.episodes as u64,
            },
            notes: self.notes,
        })
    }
}
