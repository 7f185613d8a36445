//! Oracle call audit log.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

use super::{open_database, open_memory_database, DatabaseError};
use crate::pipeline::oracle::{InferenceOracle, OracleError, TargetShape};

/// One stored oracle call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleCallEntry {
    pub called_at: String,
    pub shape: String,
    pub model: String,
    pub prompt: String,
    pub response: Option<String>,
    pub error: Option<String>,
    pub duration_ms: i64,
}

pub fn insert_oracle_call(conn: &Connection, entry: &OracleCallEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO oracle_calls (called_at, shape, model, prompt, response, error, duration_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.called_at,
            entry.shape,
            entry.model,
            entry.prompt,
            entry.response,
            entry.error,
            entry.duration_ms,
        ],
    )?;
    Ok(())
}

/// Most recent calls first.
pub fn recent_oracle_calls(conn: &Connection, limit: usize) -> Result<Vec<OracleCallEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT called_at, shape, model, prompt, response, error, duration_ms FROM oracle_calls
         ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok(OracleCallEntry {
                called_at: row.get(0)?,
                shape: row.get(1)?,
                model: row.get(2)?,
                prompt: row.get(3)?,
                response: row.get(4)?,
                error: row.get(5)?,
                duration_ms: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Wraps an oracle and writes every call to `oracle_calls`. A failed write is
/// logged and never changes the call's result.
pub struct RecordingOracle {
    inner: Arc<dyn InferenceOracle>,
    conn: Mutex<Connection>,
}

impl RecordingOracle {
    pub fn new(inner: Arc<dyn InferenceOracle>, conn: Connection) -> Self {
        Self {
            inner,
            conn: Mutex::new(conn),
        }
    }

    pub fn open(inner: Arc<dyn InferenceOracle>, path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(inner, open_database(path)?))
    }

    pub fn in_memory(inner: Arc<dyn InferenceOracle>) -> Result<Self, DatabaseError> {
        Ok(Self::new(inner, open_memory_database()?))
    }

    pub fn recent_calls(&self, limit: usize) -> Result<Vec<OracleCallEntry>, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        recent_oracle_calls(&conn, limit)
    }

    fn record(&self, entry: &OracleCallEntry) -> Result<(), DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        insert_oracle_call(&conn, entry)
    }
}

impl InferenceOracle for RecordingOracle {
    fn is_live(&self) -> bool {
        self.inner.is_live()
    }

    fn infer(&self, prompt: &str, shape: &TargetShape) -> Result<serde_json::Value, OracleError> {
        let called_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let start = Instant::now();
        let result = self.inner.infer(prompt, shape);

        let (response, error) = match &result {
            Ok(value) => (Some(value.to_string()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let entry = OracleCallEntry {
            called_at,
            shape: shape.name.to_string(),
            model: self.inner.model_name().to_string(),
            prompt: prompt.to_string(),
            response,
            error,
            duration_ms: start.elapsed().as_millis() as i64,
        };
        if let Err(e) = self.record(&entry) {
            tracing::warn!(shape = shape.name, error = %e, "Failed to record oracle call");
        }
        result
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
