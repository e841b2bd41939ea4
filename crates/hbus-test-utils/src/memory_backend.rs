//! An in-memory [`DatalogBackend`], grounded on `hbus_datalog::sqlite::SqliteBackend`'s
//! shape but backed by a plain `Vec` instead of SQLite — lets tests in
//! other crates exercise flush coalescing and live views without a real
//! file or `:memory:` connection.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hbus_core::{Value, ValueKind};
use hbus_datalog::{DatalogBackend, DatalogResult, LogEntry};

#[derive(Default)]
pub struct MemoryBackend {
    rows: Mutex<Vec<(String, LogEntry)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    /// Total rows written across every name, for assertions on flush
    /// coalescing (how many round trips actually happened).
    pub fn write_count(&self) -> usize {
        self.rows.lock().expect("memory backend poisoned").len()
    }
}

#[async_trait]
impl DatalogBackend for MemoryBackend {
    async fn write_batch(&self, name: &str, batch: &[LogEntry]) -> DatalogResult<()> {
        let mut rows = self.rows.lock().expect("memory backend poisoned");
        rows.extend(batch.iter().map(|e| (name.to_string(), e.clone())));
        Ok(())
    }

    async fn query_range(
        &self,
        name: &str,
        _kind: ValueKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        include_previous: bool,
    ) -> DatalogResult<Vec<LogEntry>> {
        let rows = self.rows.lock().expect("memory backend poisoned");
        let mut matching: Vec<LogEntry> = rows.iter().filter(|(n, _)| n == name).map(|(_, e)| e.clone()).collect();
        matching.sort_by_key(|e| e.ts);

        let mut previous = None;
        if include_previous {
            previous = matching.iter().filter(|e| e.ts < start).next_back().cloned();
        }

        let mut in_range: Vec<LogEntry> = matching.into_iter().filter(|e| e.ts >= start && e.ts < end).collect();

        if let Some(prev) = previous {
            if in_range.first().is_none_or(|first| first.ts != prev.ts) {
                in_range.insert(0, prev);
            }
        }
        Ok(in_range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hbus_core::Value;

    fn ts(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    #[tokio::test]
    async fn query_range_prepends_previous_entry_when_requested() {
        let backend = MemoryBackend::new();
        backend
            .write_batch(
                "v",
                &[
                    LogEntry { ts: ts(0), value: Value::Int(1) },
                    LogEntry { ts: ts(10), value: Value::Int(2) },
                ],
            )
            .await
            .unwrap();

        let entries = backend.query_range("v", ValueKind::Int, ts(5), ts(20), true).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value, Value::Int(1));
        assert_eq!(entries[1].value, Value::Int(2));
    }

    #[tokio::test]
    async fn query_range_excludes_entries_outside_window_without_previous() {
        let backend = MemoryBackend::new();
        backend.write_batch("v", &[LogEntry { ts: ts(0), value: Value::Int(1) }]).await.unwrap();
        let entries = backend.query_range("v", ValueKind::Int, ts(5), ts(20), false).await.unwrap();
        assert!(entries.is_empty());
    }
}
