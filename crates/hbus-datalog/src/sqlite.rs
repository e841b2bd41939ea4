//! Reference [`DatalogBackend`] backed by SQLite via `rusqlite`.
//!
//! Grounded on `services/receiver/src/db.rs` and
//! `services/forwarder/src/storage/journal.rs`: WAL journal mode,
//! `synchronous=FULL`, a bounded WAL autocheckpoint, foreign keys on, and
//! an integrity check at open. Like those, access is synchronous
//! `rusqlite` calls behind a `tokio::sync::Mutex`, not `spawn_blocking` —
//! these are single-row/small-batch operations on a local file, not
//! something worth a blocking-pool round trip for.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hbus_core::{Value, ValueKind};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::backend::{DatalogBackend, LogEntry};
use crate::error::{DatalogError, DatalogResult};

const SCHEMA_SQL: &str = include_str!("schema.sql");

pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> DatalogResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> DatalogResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> DatalogResult<Self> {
        apply_pragmas(&conn)?;
        conn.execute_batch(SCHEMA_SQL)?;
        let backend = SqliteBackend { conn: Mutex::new(conn) };
        Ok(backend)
    }

    pub async fn integrity_check(&self) -> DatalogResult<()> {
        let conn = self.conn.lock().await;
        let result: String = conn.pragma_query_value(None, "integrity_check", |row| row.get(0))?;
        if result != "ok" {
            return Err(DatalogError::IntegrityCheckFailed(result));
        }
        Ok(())
    }
}

fn apply_pragmas(conn: &Connection) -> DatalogResult<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=FULL;
         PRAGMA wal_autocheckpoint=1000;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

fn encode(value: &Value) -> DatalogResult<(Option<i64>, Option<f64>, Option<String>, Option<String>)> {
    match value {
        Value::Unit => Err(DatalogError::Decode("unit values cannot be logged".into())),
        Value::Bool(b) => Ok((Some(i64::from(*b)), None, None, None)),
        Value::Int(i) => Ok((Some(*i), None, None, None)),
        Value::Float(f) => Ok((None, Some(*f), None, None)),
        Value::Str(s) => Ok((None, None, Some(s.clone()), None)),
        Value::Other { tag, json } => Ok((None, None, Some(json.to_string()), Some(tag.clone()))),
    }
}

fn decode(
    kind: ValueKind,
    value_int: Option<i64>,
    value_float: Option<f64>,
    value_str: Option<String>,
    kind_tag: Option<String>,
) -> DatalogResult<Value> {
    match kind {
        ValueKind::Unit => Err(DatalogError::Decode("unit values cannot be logged".into())),
        ValueKind::Bool => value_int
            .map(|i| Value::Bool(i != 0))
            .ok_or_else(|| DatalogError::Decode("row missing value_int for bool column".into())),
        ValueKind::Int => value_int
            .map(Value::Int)
            .ok_or_else(|| DatalogError::Decode("row missing value_int for int column".into())),
        ValueKind::Float => value_float
            .map(Value::Float)
            .ok_or_else(|| DatalogError::Decode("row missing value_float for float column".into())),
        ValueKind::Str => value_str
            .map(Value::Str)
            .ok_or_else(|| DatalogError::Decode("row missing value_str for str column".into())),
        ValueKind::Other(expected_tag) => {
            let tag = kind_tag.ok_or_else(|| DatalogError::Decode("row missing kind_tag for other column".into()))?;
            if tag != expected_tag {
                return Err(DatalogError::Decode(format!(
                    "row kind_tag {tag} does not match expected {expected_tag}"
                )));
            }
            let raw = value_str.ok_or_else(|| DatalogError::Decode("row missing value_str for other column".into()))?;
            let json: serde_json::Value = serde_json::from_str(&raw).map_err(|e| DatalogError::Decode(e.to_string()))?;
            Ok(Value::Other { tag, json })
        }
    }
}

fn row_to_entry(
    kind: ValueKind,
    ts: String,
    value_int: Option<i64>,
    value_float: Option<f64>,
    value_str: Option<String>,
    kind_tag: Option<String>,
) -> DatalogResult<LogEntry> {
    let ts: DateTime<Utc> = ts.parse().map_err(|e: chrono::ParseError| DatalogError::Decode(e.to_string()))?;
    let value = decode(kind, value_int, value_float, value_str, kind_tag)?;
    Ok(LogEntry { ts, value })
}

#[async_trait]
impl DatalogBackend for SqliteBackend {
    async fn write_batch(&self, name: &str, batch: &[LogEntry]) -> DatalogResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO log (name, ts, value_int, value_float, value_str, kind_tag) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for entry in batch {
                let (value_int, value_float, value_str, kind_tag) = encode(&entry.value)?;
                stmt.execute(params![
                    name,
                    entry.ts.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
                    value_int,
                    value_float,
                    value_str,
                    kind_tag,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn query_range(
        &self,
        name: &str,
        kind: ValueKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        include_previous: bool,
    ) -> DatalogResult<Vec<LogEntry>> {
        let conn = self.conn.lock().await;
        let start_s = start.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);
        let end_s = end.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);

        let mut entries = Vec::new();

        if include_previous {
            let previous = conn
                .query_row(
                    "SELECT ts, value_int, value_float, value_str, kind_tag FROM log
                     WHERE name = ?1 AND ts < ?2 ORDER BY ts DESC LIMIT 1",
                    params![name, start_s],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, Option<i64>>(1)?,
                            row.get::<_, Option<f64>>(2)?,
                            row.get::<_, Option<String>>(3)?,
                            row.get::<_, Option<String>>(4)?,
                        ))
                    },
                )
                .optional()?;
            if let Some((ts, vi, vf, vs, tag)) = previous {
                entries.push(row_to_entry(kind, ts, vi, vf, vs, tag)?);
            }
        }

        let mut stmt = conn.prepare(
            "SELECT ts, value_int, value_float, value_str, kind_tag FROM log
             WHERE name = ?1 AND ts >= ?2 AND ts < ?3 ORDER BY ts ASC",
        )?;
        let rows = stmt.query_map(params![name, start_s, end_s], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<i64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;
        for row in rows {
            let (ts, vi, vf, vs, tag) = row?;
            entries.push(row_to_entry(kind, ts, vi, vf, vs, tag)?);
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    #[tokio::test]
    async fn write_and_query_round_trips_int_values() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .write_batch(
                "kitchen.temp",
                &[
                    LogEntry { ts: ts(10), value: Value::Int(20) },
                    LogEntry { ts: ts(20), value: Value::Int(21) },
                ],
            )
            .await
            .unwrap();

        let got = backend
            .query_range("kitchen.temp", ValueKind::Int, ts(0), ts(30), false)
            .await
            .unwrap();
        assert_eq!(got, vec![
            LogEntry { ts: ts(10), value: Value::Int(20) },
            LogEntry { ts: ts(20), value: Value::Int(21) },
        ]);
    }

    #[tokio::test]
    async fn include_previous_prepends_latest_row_before_start() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .write_batch(
                "v",
                &[
                    LogEntry { ts: ts(5), value: Value::Int(1) },
                    LogEntry { ts: ts(15), value: Value::Int(2) },
                ],
            )
            .await
            .unwrap();

        let got = backend
            .query_range("v", ValueKind::Int, ts(10), ts(20), true)
            .await
            .unwrap();
        assert_eq!(got, vec![
            LogEntry { ts: ts(5), value: Value::Int(1) },
            LogEntry { ts: ts(15), value: Value::Int(2) },
        ]);
    }

    #[tokio::test]
    async fn other_values_round_trip_through_json() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let value = Value::Other {
            tag: "Weekday".into(),
            json: serde_json::json!("MONDAY"),
        };
        backend
            .write_batch("day", &[LogEntry { ts: ts(1), value: value.clone() }])
            .await
            .unwrap();

        let got = backend
            .query_range("day", ValueKind::Other("Weekday"), ts(0), ts(2), false)
            .await
            .unwrap();
        assert_eq!(got, vec![LogEntry { ts: ts(1), value }]);
    }

    #[tokio::test]
    async fn integrity_check_passes_on_fresh_database() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.integrity_check().await.unwrap();
    }
}
