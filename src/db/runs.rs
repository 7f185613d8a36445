//! Run storage. Each run is stored as one JSON snapshot; saving again
//! replaces the previous snapshot.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use super::{open_database, open_memory_database, recent_oracle_calls, DatabaseError, OracleCallEntry};
use crate::models::{FilingState, RunRecord};

/// Listing entry for a stored run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: FilingState,
}

pub trait RunStore: Send + Sync {
    /// Insert or replace the snapshot of `run`.
    fn save(&self, run: &RunRecord) -> Result<(), DatabaseError>;

    fn load(&self, run_id: &Uuid) -> Result<Option<RunRecord>, DatabaseError>;

    /// All stored runs, newest first.
    fn list(&self) -> Result<Vec<RunSummary>, DatabaseError>;
}

pub struct SqliteRunStore {
    conn: Mutex<Connection>,
}

impl SqliteRunStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    /// Wrap a connection that has already been migrated.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Recent entries of the oracle audit table kept in the same database.
    pub fn oracle_calls(&self, limit: usize) -> Result<Vec<OracleCallEntry>, DatabaseError> {
        recent_oracle_calls(&*self.conn()?, limit)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

impl RunStore for SqliteRunStore {
    fn save(&self, run: &RunRecord) -> Result<(), DatabaseError> {
        let data_json = serde_json::to_string(run)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO runs (run_id, created_at, updated_at, state, data_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run.run_id.to_string(),
                timestamp(&run.created_at),
                timestamp(&run.updated_at),
                run.state().as_str(),
                data_json,
            ],
        )?;
        tracing::debug!(run_id = %run.run_id, state = run.state().as_str(), "Run saved");
        Ok(())
    }

    fn load(&self, run_id: &Uuid) -> Result<Option<RunRecord>, DatabaseError> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data_json FROM runs WHERE run_id = ?1",
                params![run_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<RunSummary>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, created_at, updated_at, state FROM runs
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(run_id, created_at, updated_at, state)| {
                Ok(RunSummary {
                    run_id: parse_uuid(&run_id)?,
                    created_at: parse_timestamp("created_at", &created_at)?,
                    updated_at: parse_timestamp("updated_at", &updated_at)?,
                    state: FilingState::from_str(&state)?,
                })
            })
            .collect()
    }
}

/// Fixed-width UTC so text order is time order.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_uuid(value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|_| DatabaseError::InvalidEnum {
        field: "run_id".into(),
        value: value.into(),
    })
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidEnum {
            field: field.into(),
            value: value.into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::models::{FilingStatus, TaxpayerProfile};

    fn run_at(offset_secs: i64) -> RunRecord {
        let mut run = RunRecord::new(TaxpayerProfile::default());
        run.created_at += Duration::seconds(offset_secs);
        run.updated_at = run.created_at;
        run
    }

    #[test]
    fn save_then_load() {
        let store = SqliteRunStore::in_memory().unwrap();
        let run = run_at(0);
        store.save(&run).unwrap();
        assert_eq!(store.load(&run.run_id).unwrap(), Some(run));
    }

    #[test]
    fn missing_run_loads_as_none() {
        let store = SqliteRunStore::in_memory().unwrap();
        assert!(store.load(&Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn save_replaces_snapshot() {
        let store = SqliteRunStore::in_memory().unwrap();
        let mut run = run_at(0);
        store.save(&run).unwrap();

        run.status = FilingStatus::NeedsReview { since: Utc::now() };
        run.review_reason = Some("low confidence".into());
        store.save(&run).unwrap();

        let loaded = store.load(&run.run_id).unwrap().unwrap();
        assert_eq!(loaded.state(), FilingState::NeedsReview);
        assert_eq!(loaded.review_reason.as_deref(), Some("low confidence"));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn list_newest_first() {
        let store = SqliteRunStore::in_memory().unwrap();
        let older = run_at(-60);
        let newer = run_at(0);
        store.save(&newer).unwrap();
        store.save(&older).unwrap();

        let ids: Vec<Uuid> = store.list().unwrap().iter().map(|s| s.run_id).collect();
        assert_eq!(ids, vec![newer.run_id, older.run_id]);
    }

    #[test]
    fn fresh_store_has_no_oracle_calls() {
        let store = SqliteRunStore::in_memory().unwrap();
        assert!(store.oracle_calls(10).unwrap().is_empty());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.db");
        let run = run_at(0);
        {
            let store = SqliteRunStore::open(&path).unwrap();
            store.save(&run).unwrap();
        }
        let store = SqliteRunStore::open(&path).unwrap();
        let summaries = store.list().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].run_id, run.run_id);
        assert_eq!(summaries[0].state, FilingState::Pending);
        assert_eq!(summaries[0].created_at, run.created_at);
    }
}
