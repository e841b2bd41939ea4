//! `DataLogVariable` over an in-memory backend: concurrent writers that
//! arrive while a flush is in progress must be coalesced into the next
//! batch rather than each opening their own round trip (spec.md §4.E
//! invariant 3).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hbus::core::{Origin, Value, ValueKind};
use hbus::datalog::DataLogVariable;
use hbus_test_utils::MemoryBackend;

fn ts(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap()
}

#[tokio::test]
async fn concurrently_issued_writes_are_all_durable_and_readable() {
    let backend = Arc::new(MemoryBackend::new());
    let var = DataLogVariable::new(ValueKind::Int, "temp", backend.clone());

    let a = var.clone();
    let b = var.clone();
    let c = var.clone();
    let (ra, rb, rc) = tokio::join!(
        a.write_at(Value::Int(1), Origin::root(), ts(1)),
        b.write_at(Value::Int(2), Origin::root(), ts(2)),
        c.write_at(Value::Int(3), Origin::root(), ts(3)),
    );
    ra.unwrap();
    rb.unwrap();
    rc.unwrap();

    let entries = var.retrieve_log(ts(0), ts(100), false).await.unwrap();
    assert_eq!(entries.len(), 3, "every write must be durable once write_at returns, whichever of them became the flusher");
}

#[tokio::test]
async fn sequential_writes_each_flush_independently() {
    let backend = Arc::new(MemoryBackend::new());
    let var = DataLogVariable::new(ValueKind::Int, "temp", backend.clone());

    for i in 0..5 {
        var.write_at(Value::Int(i), Origin::root(), ts(i)).await.unwrap();
    }

    assert_eq!(backend.write_count(), 5, "writes that don't overlap a flush each get their own durable round trip");
}

#[tokio::test]
async fn retrieve_log_sync_observes_a_fully_flushed_batch() {
    let backend = Arc::new(MemoryBackend::new());
    let var = DataLogVariable::new(ValueKind::Float, "pressure", backend);

    var.write_at(Value::Float(1013.0), Origin::root(), ts(0)).await.unwrap();
    let entries = var.retrieve_log_sync(ts(0), ts(10), false).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].value, Value::Float(1013.0));
}
