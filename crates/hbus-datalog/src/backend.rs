//! The persistence seam a data-log variable writes through.
//!
//! Kept separate from [`crate::variable::DataLogVariable`] so the
//! flush-coalescing logic is backend-agnostic — [`crate::sqlite::SqliteBackend`]
//! is the reference implementation, and `hbus-test-utils` provides an
//! in-memory fake with the same trait for tests that don't want real I/O.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hbus_core::{Value, ValueKind};

use crate::error::DatalogResult;

/// One persisted sample.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub ts: DateTime<Utc>,
    pub value: Value,
}

#[async_trait]
pub trait DatalogBackend: Send + Sync {
    /// Persist a batch of entries for `name`, in timestamp order.
    async fn write_batch(&self, name: &str, batch: &[LogEntry]) -> DatalogResult<()>;

    /// Entries with `start <= ts < end`. When `include_previous` is set and
    /// no entry exists at exactly `start`, the latest entry with `ts <
    /// start` is prepended.
    ///
    /// `kind` is the variable's declared ground type, needed to decode
    /// `value_int`/`value_float`/`value_str` columns back into the right
    /// `Value` variant (and, for `Other`, to check the stored tag matches).
    async fn query_range(
        &self,
        name: &str,
        kind: ValueKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        include_previous: bool,
    ) -> DatalogResult<Vec<LogEntry>>;
}
