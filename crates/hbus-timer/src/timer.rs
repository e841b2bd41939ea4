//! The timer connectable: a [`Subscribable`] that fires `Value::Unit` on
//! its schedule and never anything else.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use hbus_core::{Converter, CoreResult, ObjectId, Origin, Subscribable, SubscriberList, Value, ValueKind, Writable};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::schedule::{sleep_until_logarithmic, Every};

pub struct Timer {
    id: ObjectId,
    name: String,
    schedule: Every,
    subscribers: SubscriberList,
    last_execution: AsyncMutex<Option<SystemTime>>,
}

impl Timer {
    pub fn new(name: impl Into<String>, schedule: Every) -> Arc<Self> {
        Arc::new(Timer {
            id: ObjectId::new(),
            name: name.into(),
            schedule,
            subscribers: SubscriberList::new(),
            last_execution: AsyncMutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn fire_once(self: &Arc<Self>) {
        let mut last = self.last_execution.lock().await;
        let now = SystemTime::now();
        let target = self.schedule.next_execution(*last, now);
        drop(last);

        sleep_until_logarithmic(target).await;

        *self.last_execution.lock().await = Some(target);

        // Publish in a detached task so a slow subscriber never delays the
        // next firing.
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(err) = this.subscribers.publish(this.id, Value::Unit, &Origin::root()).await {
                tracing::warn!(timer = %this.name, error = %err, "timer publish failed");
            }
        });
    }
}

#[async_trait]
impl Subscribable for Timer {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        ValueKind::Unit
    }
    fn subscribe(&self, target: Arc<dyn Writable>, converter: Option<Converter>) {
        self.subscribers.add(target, converter);
    }
    async fn publish(&self, value: Value, origin: Origin) -> CoreResult<()> {
        self.subscribers.publish(self.id, value, &origin).await
    }
}

/// A handle to a running timer's supervised task. Dropping it leaves the
/// timer running; call [`TimerTaskHandle::cancel`] to stop it.
pub struct TimerTaskHandle {
    handle: JoinHandle<()>,
}

impl TimerTaskHandle {
    /// Cancel the timer task. Safe to call mid-sleep: aborting a task
    /// parked in `tokio::time::sleep` drops it silently, it is never
    /// observed as an error by anything awaiting this handle.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawn a timer's firing loop as a supervised background task.
pub fn spawn(timer: Arc<Timer>) -> TimerTaskHandle {
    let handle = tokio::spawn(async move {
        loop {
            timer.fire_once().await;
        }
    });
    TimerTaskHandle { handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::RandomFn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSink {
        id: ObjectId,
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Writable for CountingSink {
        fn id(&self) -> ObjectId {
            self.id
        }
        fn kind(&self) -> ValueKind {
            ValueKind::Unit
        }
        async fn write(&self, _value: Value, _origin: Origin) -> CoreResult<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn fire_once_publishes_to_subscribers() {
        let schedule = Every::new(Duration::from_millis(1))
            .aligned(false)
            .with_jitter(Duration::ZERO, RandomFn::Uniform);
        let timer = Timer::new("tick", schedule);
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(CountingSink {
            id: ObjectId::new(),
            count: count.clone(),
        });
        timer.subscribe(sink, None);

        timer.fire_once().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Real wall time has advanced well past the 1ms unaligned delta by
        // now, so the second firing's sleep also resolves immediately.
        timer.fire_once().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancel_stops_the_supervised_loop() {
        let schedule = Every::new(Duration::from_secs(3600)).aligned(false);
        let timer = Timer::new("slow", schedule);
        let task = spawn(timer);
        assert!(!task.is_finished());
        task.cancel();
        tokio::task::yield_now().await;
        assert!(task.is_finished());
    }
}
