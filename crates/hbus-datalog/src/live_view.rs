//! Live views over a data log: a connectable that keeps a rolling window
//! of recent samples in sync, either by watching every flush go by or by
//! polling the backend on a timer.
//!
//! Grounded on `shc.log.generic.LiveDataLogView`. Push mode applies when
//! the source is a writable data-log nothing else writes to directly and
//! no aggregation is requested — the view just re-broadcasts each flushed
//! batch. Everything else falls back to polling on an `Every` schedule
//! borrowed from `hbus-timer`, at `min(window / 20, 1 minute)` by default,
//! with an external write to the source waking the poll loop early
//! instead of waiting out the rest of its interval.

use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hbus_core::ValueKind;
use hbus_timer::{sleep_until_logarithmic, Every};
use tokio::sync::{Mutex as AsyncMutex, Notify};

use crate::aggregate::{aggregate, AggregatedBucket, AggregationMethod};
use crate::backend::LogEntry;
use crate::error::DatalogResult;
use crate::variable::DataLogVariable;
use crate::DatalogBackend;

/// Receives a verbatim copy of each batch as it is flushed or polled.
/// Implemented by downstream live views and by test fakes that want to
/// observe writes without standing up a real backend.
#[async_trait]
pub trait LiveViewSink: Send + Sync {
    async fn notify_new_values(&self, batch: &[LogEntry]);
}

/// The parts of a data-log variable a live view needs, independent of its
/// backend type — lets one `LiveDataLogView` sit in front of any
/// `DataLogVariable<B>` without itself becoming generic over `B`.
#[async_trait]
pub trait DataLogSource: Send + Sync {
    fn kind(&self) -> ValueKind;
    async fn retrieve_log(&self, start: DateTime<Utc>, end: DateTime<Utc>, include_previous: bool) -> DatalogResult<Vec<LogEntry>>;
    async fn retrieve_log_sync(&self, start: DateTime<Utc>, end: DateTime<Utc>, include_previous: bool) -> DatalogResult<Vec<LogEntry>>;
    fn register_live_view(&self, sink: Arc<dyn LiveViewSink>);
}

#[async_trait]
impl<B: DatalogBackend + 'static> DataLogSource for DataLogVariable<B> {
    fn kind(&self) -> ValueKind {
        DataLogVariable::kind(self)
    }
    async fn retrieve_log(&self, start: DateTime<Utc>, end: DateTime<Utc>, include_previous: bool) -> DatalogResult<Vec<LogEntry>> {
        DataLogVariable::retrieve_log(self, start, end, include_previous).await
    }
    async fn retrieve_log_sync(&self, start: DateTime<Utc>, end: DateTime<Utc>, include_previous: bool) -> DatalogResult<Vec<LogEntry>> {
        DataLogVariable::retrieve_log_sync(self, start, end, include_previous).await
    }
    fn register_live_view(&self, sink: Arc<dyn LiveViewSink>) {
        DataLogVariable::register_live_view(self, sink)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewMode {
    Push,
    Poll,
}

/// A snapshot returned by [`LiveDataLogView::get_current_view`]: raw
/// entries, or aggregated buckets if an aggregation spec was configured.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewSnapshot {
    Raw(Vec<LogEntry>),
    Aggregated(Vec<AggregatedBucket>),
}

pub struct LiveDataLogView {
    source: Arc<dyn DataLogSource>,
    window: ChronoDuration,
    aggregation: Option<(AggregationMethod, ChronoDuration)>,
    mode: ViewMode,
    last_retrieved: AsyncMutex<DateTime<Utc>>,
    downstream: StdRwLock<Vec<Arc<dyn LiveViewSink>>>,
    wake: Notify,
}

impl LiveDataLogView {
    /// `push_eligible` is the caller's assertion that the source is a
    /// writable data-log nobody else writes to directly; combined with
    /// the absence of an aggregation spec, that's exactly push mode's
    /// precondition. Anything else polls.
    pub fn new(
        source: Arc<dyn DataLogSource>,
        window: ChronoDuration,
        aggregation: Option<(AggregationMethod, ChronoDuration)>,
        push_eligible: bool,
    ) -> Arc<Self> {
        let mode = if push_eligible && aggregation.is_none() { ViewMode::Push } else { ViewMode::Poll };
        Arc::new(LiveDataLogView {
            source,
            window,
            aggregation,
            mode,
            last_retrieved: AsyncMutex::new(Utc::now() - window),
            downstream: StdRwLock::new(Vec::new()),
            wake: Notify::new(),
        })
    }

    pub fn subscribe_live(&self, sink: Arc<dyn LiveViewSink>) {
        self.downstream.write().expect("live view downstream list poisoned").push(sink);
    }

    /// Registers with the source and, in poll mode, spawns the background
    /// polling loop. Must be called once after construction — split out
    /// from `new` because it needs an `Arc<Self>` to hand to the source.
    pub fn activate(self: &Arc<Self>) {
        self.source.register_live_view(self.clone());
        if self.mode == ViewMode::Poll {
            tokio::spawn(self.clone().run_poll_loop());
        }
    }

    fn update_interval(&self) -> ChronoDuration {
        let one_minute = ChronoDuration::minutes(1);
        (self.window / 20).min(one_minute)
    }

    async fn run_poll_loop(self: Arc<Self>) {
        let schedule = Every::new(self.update_interval().to_std().unwrap_or(StdDuration::from_secs(60))).aligned(false);
        let mut last_fire = None;
        loop {
            let target = schedule.next_execution(last_fire, std::time::SystemTime::now());
            tokio::select! {
                _ = sleep_until_logarithmic(target) => {}
                _ = self.wake.notified() => {}
            }
            last_fire = Some(std::time::SystemTime::now());
            self.poll_once().await;
        }
    }

    async fn poll_once(&self) {
        let now = Utc::now();
        let mut cutoff = self.last_retrieved.lock().await;
        let start = *cutoff;
        if start >= now {
            return;
        }
        match self.source.retrieve_log(start, now, false).await {
            Ok(batch) => {
                *cutoff = now;
                drop(cutoff);
                if !batch.is_empty() {
                    self.deliver(&batch).await;
                }
            }
            Err(err) => tracing::warn!(error = %err, "live view poll failed"),
        }
    }

    async fn deliver(&self, batch: &[LogEntry]) {
        let downstream = self.downstream.read().expect("live view downstream list poisoned").clone();
        futures_util::future::join_all(downstream.iter().map(|sink| sink.notify_new_values(batch))).await;
    }

    /// The full window right now: in push mode, whatever the backend has
    /// for `[now - window, now)`; in poll mode, only what has actually
    /// been polled in so far (`[now - window, last_retrieved)`), since
    /// the view hasn't seen anything newer yet.
    pub async fn get_current_view(&self, include_previous: bool) -> DatalogResult<ViewSnapshot> {
        let now = Utc::now();
        let raw = match self.mode {
            ViewMode::Push => self.source.retrieve_log_sync(now - self.window, now, include_previous).await?,
            ViewMode::Poll => {
                let cutoff = *self.last_retrieved.lock().await;
                self.source.retrieve_log(now - self.window, cutoff, include_previous).await?
            }
        };

        match &self.aggregation {
            None => Ok(ViewSnapshot::Raw(raw)),
            Some((method, interval)) => {
                let buckets = aggregate(self.source.kind(), &raw, now - self.window, now, *interval, *method)?;
                Ok(ViewSnapshot::Aggregated(buckets))
            }
        }
    }
}

#[async_trait]
impl LiveViewSink for LiveDataLogView {
    async fn notify_new_values(&self, batch: &[LogEntry]) {
        match self.mode {
            ViewMode::Push => self.deliver(batch).await,
            ViewMode::Poll => self.wake.notify_one(),
        }
    }
}
