//! `DataLogVariable`: a connectable that durably logs every write and
//! fans out both the current value (to ordinary in-process subscribers)
//! and the flushed batch (to registered live views).
//!
//! Grounded on `shc.log.generic.WritableDataLogVariable`: writes append to
//! a pending queue; the first writer to arrive while no flush is running
//! becomes the flusher for the whole queue and only returns once the
//! batch is durable, so concurrent writers are coalesced into one round
//! trip to the backend instead of one each.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hbus_core::{Converter, CoreError, ObjectId, Origin, Readable, Subscribable, SubscriberList, Value, ValueKind, Writable};
use tokio::sync::{Mutex as AsyncMutex, Notify, RwLock as AsyncRwLock};

use crate::aggregate::{aggregate, AggregatedBucket, AggregationMethod};
use crate::backend::{DatalogBackend, LogEntry};
use crate::error::{DatalogError, DatalogResult};
use crate::live_view::LiveViewSink;

struct Coordinator {
    pending: Vec<LogEntry>,
    in_flight: Option<Arc<Notify>>,
}

pub struct DataLogVariable<B: DatalogBackend> {
    id: ObjectId,
    kind: ValueKind,
    name: String,
    backend: Arc<B>,
    current: AsyncRwLock<Option<Value>>,
    subscribers: SubscriberList,
    coord: AsyncMutex<Coordinator>,
    live_views: StdRwLock<Vec<Arc<dyn LiveViewSink>>>,
    flushing: AtomicBool,
}

impl<B: DatalogBackend + 'static> DataLogVariable<B> {
    pub fn new(kind: ValueKind, name: impl Into<String>, backend: Arc<B>) -> Arc<Self> {
        Arc::new(DataLogVariable {
            id: ObjectId::new(),
            kind,
            name: name.into(),
            backend,
            current: AsyncRwLock::new(None),
            subscribers: SubscriberList::new(),
            coord: AsyncMutex::new(Coordinator { pending: Vec::new(), in_flight: None }),
            live_views: StdRwLock::new(Vec::new()),
            flushing: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Register a live view to receive every flushed batch verbatim.
    /// Push-mode views call this instead of subscribing through the
    /// ordinary [`Subscribable`] fan-out, since they need the whole batch
    /// (with timestamps), not just the latest value.
    pub fn register_live_view(&self, sink: Arc<dyn LiveViewSink>) {
        self.live_views.write().expect("live view list poisoned").push(sink);
    }

    fn check_kind(&self, value: &Value) -> DatalogResult<()> {
        if value.kind() == self.kind {
            Ok(())
        } else {
            Err(CoreError::TypeMismatch { expected: self.kind, actual: value.kind() }.into())
        }
    }

    /// The write path, with an explicit timestamp for testability. The
    /// public `Writable::write` impl calls this with `Utc::now()`.
    pub async fn write_at(&self, value: Value, origin: Origin, ts: DateTime<Utc>) -> DatalogResult<()> {
        self.check_kind(&value)?;

        let (became_flusher, notify) = {
            let mut coord = self.coord.lock().await;
            coord.pending.push(LogEntry { ts, value: value.clone() });
            match &coord.in_flight {
                Some(existing) => (false, existing.clone()),
                None => {
                    let notify = Arc::new(Notify::new());
                    coord.in_flight = Some(notify.clone());
                    (true, notify)
                }
            }
        };

        *self.current.write().await = Some(value.clone());
        if let Err(err) = self.subscribers.publish(self.id, value, &origin).await {
            tracing::warn!(variable = %self.name, error = %err, "data-log subscriber publish failed");
        }

        if became_flusher {
            self.run_flush(notify).await
        } else {
            notify.notified().await;
            Ok(())
        }
    }

    async fn run_flush(&self, notify: Arc<Notify>) -> DatalogResult<()> {
        self.flushing.store(true, Ordering::SeqCst);
        let batch = {
            let mut coord = self.coord.lock().await;
            std::mem::take(&mut coord.pending)
        };

        let live_views = self.live_views.read().expect("live view list poisoned").clone();
        let backend_fut = self.backend.write_batch(&self.name, &batch);
        let live_fut = futures_util::future::join_all(live_views.iter().map(|lv| lv.notify_new_values(&batch)));
        let (backend_res, _) = tokio::join!(backend_fut, live_fut);

        {
            let mut coord = self.coord.lock().await;
            coord.in_flight = None;
        }
        self.flushing.store(false, Ordering::SeqCst);
        notify.notify_waiters();
        backend_res
    }

    /// Entries with `start <= ts < end`, optionally prefixed with the
    /// latest entry before `start`. May interleave with an in-flight
    /// flush's pending (unflushed) entries — this is the fast, eventually
    /// consistent read.
    pub async fn retrieve_log(&self, start: DateTime<Utc>, end: DateTime<Utc>, include_previous: bool) -> DatalogResult<Vec<LogEntry>> {
        self.backend.query_range(&self.name, self.kind, start, end, include_previous).await
    }

    /// Same as [`Self::retrieve_log`], but waits for any in-flight flush
    /// to finish and holds the flush coordinator lock for the duration of
    /// the read, so no new flush can start underneath it.
    pub async fn retrieve_log_sync(&self, start: DateTime<Utc>, end: DateTime<Utc>, include_previous: bool) -> DatalogResult<Vec<LogEntry>> {
        loop {
            let guard = self.coord.lock().await;
            if let Some(notify) = guard.in_flight.clone() {
                drop(guard);
                notify.notified().await;
                continue;
            }
            let result = self.backend.query_range(&self.name, self.kind, start, end, include_previous).await;
            return result;
        }
    }

    pub async fn retrieve_aggregated_log(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        method: AggregationMethod,
        interval: chrono::Duration,
    ) -> DatalogResult<Vec<AggregatedBucket>> {
        let entries = self.retrieve_log(start, end, true).await?;
        aggregate(self.kind, &entries, start, end, interval, method)
    }
}

#[async_trait]
impl<B: DatalogBackend + 'static> Readable for DataLogVariable<B> {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        self.kind
    }
    async fn read(&self) -> hbus_core::CoreResult<Value> {
        self.current.read().await.clone().ok_or(CoreError::Uninitialized)
    }
}

#[async_trait]
impl<B: DatalogBackend + 'static> Writable for DataLogVariable<B> {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        self.kind
    }
    async fn write(&self, value: Value, origin: Origin) -> hbus_core::CoreResult<()> {
        self.write_at(value, origin, Utc::now()).await.map_err(|e| match e {
            DatalogError::Core(core_err) => core_err,
            other => CoreError::Configuration(other.to_string()),
        })
    }
}

#[async_trait]
impl<B: DatalogBackend + 'static> Subscribable for DataLogVariable<B> {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        self.kind
    }
    fn subscribe(&self, target: Arc<dyn Writable>, converter: Option<Converter>) {
        self.subscribers.add(target, converter);
    }
    async fn publish(&self, value: Value, origin: Origin) -> hbus_core::CoreResult<()> {
        self.write(value, origin).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteBackend;
    use std::sync::atomic::AtomicUsize;

    fn ts(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    #[tokio::test]
    async fn concurrent_writes_are_coalesced_into_one_flush() {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        let var = DataLogVariable::new(ValueKind::Int, "v", backend.clone());

        let a = var.clone();
        let b = var.clone();
        let (ra, rb) = tokio::join!(a.write_at(Value::Int(1), Origin::root(), ts(1)), b.write_at(Value::Int(2), Origin::root(), ts(2)));
        ra.unwrap();
        rb.unwrap();

        let entries = var.retrieve_log(ts(0), ts(10), false).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn retrieve_log_sync_waits_for_in_flight_flush() {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        let var = DataLogVariable::new(ValueKind::Int, "v", backend);
        var.write_at(Value::Int(1), Origin::root(), ts(1)).await.unwrap();
        let entries = var.retrieve_log_sync(ts(0), ts(10), false).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    struct CountingLiveView {
        count: Arc<AtomicUsize>,
    }
    #[async_trait]
    impl LiveViewSink for CountingLiveView {
        async fn notify_new_values(&self, batch: &[LogEntry]) {
            self.count.fetch_add(batch.len(), Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn registered_live_view_receives_flushed_batch() {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        let var = DataLogVariable::new(ValueKind::Int, "v", backend);
        let count = Arc::new(AtomicUsize::new(0));
        var.register_live_view(Arc::new(CountingLiveView { count: count.clone() }));

        var.write_at(Value::Int(1), Origin::root(), ts(1)).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn write_of_unit_value_is_rejected() {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        let var = DataLogVariable::new(ValueKind::Int, "v", backend);
        let err = var.write_at(Value::Unit, Origin::root(), ts(1)).await.unwrap_err();
        assert!(matches!(err, DatalogError::Core(CoreError::TypeMismatch { .. })));
    }
}
