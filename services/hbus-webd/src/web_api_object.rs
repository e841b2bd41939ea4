//! `WebApiObject`: a Reading + Writable + Subscribable connectable whose
//! subscribers are ordinary in-process consumers plus outside HTTP/
//! websocket clients (spec.md §4.F).
//!
//! The long-poll etag handshake is built on an always-replaced
//! `tokio::sync::watch` channel rather than a raw future: every write
//! replaces the channel's value with a fresh `(etag, value)` pair, and a
//! waiting `GET` is just `watch::Receiver::changed()` under a timeout.
//! `watch` only ever remembers the latest value, so a client that is slow
//! to poll can miss intermediate writes — that is the behaviour the
//! "next-value future" wording in the spec describes, not an oversight.

use std::sync::Arc;
use std::sync::RwLock as StdRwLock;
use std::time::Duration;

use async_trait::async_trait;
use hbus_core::base::Converter;
use hbus_core::{CoreError, CoreResult, ObjectId, Origin, Readable, Reading, Subscribable, SubscriberList, Value, ValueKind, Writable};
use tokio::sync::watch;

/// A snapshot of the current value plus the etag identifying it, handed
/// back to long-poll `GET` callers.
#[derive(Debug, Clone, PartialEq)]
pub struct NextValue {
    pub etag: u64,
    pub value: Option<Value>,
}

/// The outcome of a long-poll `GET`, before HTTP status codes are laid on
/// top by the handler.
#[derive(Debug, Clone, PartialEq)]
pub enum LongPollOutcome {
    /// Either the caller already holds the current etag (and didn't ask
    /// to wait), or it did wait and timed out without a new value.
    NotChanged { etag: u64 },
    /// A value the caller hasn't seen yet, current as of `etag`.
    Value(NextValue),
}

struct ProviderBinding {
    provider: Arc<dyn Readable>,
    converter: Option<Converter>,
    optional: bool,
}

pub struct WebApiObject {
    id: ObjectId,
    kind: ValueKind,
    name: String,
    subscribers: SubscriberList,
    next_tx: watch::Sender<NextValue>,
    next_rx: watch::Receiver<NextValue>,
    provider: StdRwLock<Option<ProviderBinding>>,
}

impl WebApiObject {
    pub fn new(kind: ValueKind, name: impl Into<String>) -> Arc<Self> {
        let (next_tx, next_rx) = watch::channel(NextValue { etag: 0, value: None });
        Arc::new(WebApiObject {
            id: ObjectId::new(),
            kind,
            name: name.into(),
            subscribers: SubscriberList::new(),
            next_tx,
            next_rx,
            provider: StdRwLock::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// The current value and its etag, without waiting for anything.
    pub fn current(&self) -> NextValue {
        self.next_rx.borrow().clone()
    }

    fn check_kind(&self, value: &Value) -> CoreResult<()> {
        if value.kind() == self.kind {
            Ok(())
        } else {
            Err(CoreError::TypeMismatch { expected: self.kind, actual: value.kind() })
        }
    }

    /// Store `value`, mint a fresh etag, and fan it out to every
    /// subscriber (in-process and websocket-bridge alike). Used by both
    /// the `Writable` impl and `POST /api/v1/object/{name}`.
    async fn set_and_publish(&self, value: Value, origin: Origin) -> CoreResult<()> {
        self.check_kind(&value)?;
        let next_etag = self.next_rx.borrow().etag + 1;
        let _ = self.next_tx.send(NextValue { etag: next_etag, value: Some(value.clone()) });
        self.subscribers.publish(self.id, value, &origin).await
    }

    /// The long-poll `GET` handler's core logic.
    ///
    /// - `wait=false`: returns `NotChanged` if `if_none_match` already
    ///   names the current etag, otherwise the current value immediately.
    /// - `wait=true`: if the caller's etag is already stale, behaves like
    ///   `wait=false`; otherwise awaits the next write up to `timeout`,
    ///   returning `NotChanged` with the unchanged etag on timeout.
    pub async fn long_poll(&self, if_none_match: Option<u64>, wait: bool, timeout: Duration) -> LongPollOutcome {
        let mut rx = self.next_rx.clone();
        let snapshot = rx.borrow().clone();
        let etag_matches = if_none_match == Some(snapshot.etag);

        if !wait || !etag_matches {
            return if etag_matches {
                LongPollOutcome::NotChanged { etag: snapshot.etag }
            } else {
                LongPollOutcome::Value(snapshot)
            };
        }

        match tokio::time::timeout(timeout, rx.changed()).await {
            Ok(Ok(())) => LongPollOutcome::Value(rx.borrow().clone()),
            _ => LongPollOutcome::NotChanged { etag: snapshot.etag },
        }
    }

    /// Pull the initial value through the registered provider, the way
    /// `hbus_core::variable::initialize_from_provider` does for ordinary
    /// `Variable`s. A no-op, successfully, if no provider was ever bound.
    pub async fn initialize_from_provider(&self) -> CoreResult<()> {
        let binding = {
            let guard = self.provider.read().expect("provider lock poisoned");
            match guard.as_ref() {
                Some(b) => (b.provider.clone(), b.converter.clone()),
                None => return Ok(()),
            }
        };
        let (provider, converter) = binding;
        let raw = provider.read().await?;
        let value = match converter {
            Some(c) => c(&raw)?,
            None => raw,
        };
        self.set_and_publish(value, Origin::root()).await
    }
}

#[async_trait]
impl Writable for WebApiObject {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        self.kind
    }
    async fn write(&self, value: Value, origin: Origin) -> CoreResult<()> {
        self.set_and_publish(value, origin).await
    }
}

#[async_trait]
impl Subscribable for WebApiObject {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        self.kind
    }
    fn subscribe(&self, target: Arc<dyn Writable>, converter: Option<Converter>) {
        self.subscribers.add(target, converter);
    }
    async fn publish(&self, value: Value, origin: Origin) -> CoreResult<()> {
        self.set_and_publish(value, origin).await
    }
}

#[async_trait]
impl Reading for WebApiObject {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        self.kind
    }
    fn set_provider(&self, provider: Arc<dyn Readable>, converter: Option<Converter>, optional: bool) {
        *self.provider.write().expect("provider lock poisoned") = Some(ProviderBinding { provider, converter, optional });
    }
    fn is_optional(&self) -> bool {
        self.provider.read().expect("provider lock poisoned").as_ref().is_some_and(|b| b.optional)
    }
    async fn from_provider(&self) -> CoreResult<Value> {
        let binding = {
            let guard = self.provider.read().expect("provider lock poisoned");
            match guard.as_ref() {
                Some(b) => (b.provider.clone(), b.converter.clone()),
                None => return Err(CoreError::Configuration(format!("web api object {} has no provider bound", self.name))),
            }
        };
        let (provider, converter) = binding;
        let raw = provider.read().await?;
        match converter {
            Some(c) => c(&raw),
            None => Ok(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_mints_a_fresh_etag_each_time() {
        let obj = WebApiObject::new(ValueKind::Int, "kitchen.light");
        let first = obj.current();
        assert_eq!(first, NextValue { etag: 0, value: None });

        obj.write(Value::Int(1), Origin::root()).await.unwrap();
        let second = obj.current();
        assert_eq!(second, NextValue { etag: 1, value: Some(Value::Int(1)) });

        obj.write(Value::Int(1), Origin::root()).await.unwrap();
        let third = obj.current();
        assert_eq!(third.etag, 2, "every write mints a new etag, even a value-equal one");
    }

    #[tokio::test]
    async fn long_poll_without_wait_reports_not_changed_on_matching_etag() {
        let obj = WebApiObject::new(ValueKind::Int, "v");
        obj.write(Value::Int(5), Origin::root()).await.unwrap();
        let outcome = obj.long_poll(Some(1), false, Duration::from_secs(1)).await;
        assert_eq!(outcome, LongPollOutcome::NotChanged { etag: 1 });
    }

    #[tokio::test]
    async fn long_poll_without_wait_returns_current_value_on_stale_etag() {
        let obj = WebApiObject::new(ValueKind::Int, "v");
        obj.write(Value::Int(5), Origin::root()).await.unwrap();
        let outcome = obj.long_poll(Some(0), false, Duration::from_secs(1)).await;
        assert_eq!(outcome, LongPollOutcome::Value(NextValue { etag: 1, value: Some(Value::Int(5)) }));
    }

    #[tokio::test(start_paused = true)]
    async fn long_poll_with_wait_times_out_with_the_same_etag() {
        let obj = WebApiObject::new(ValueKind::Int, "v");
        obj.write(Value::Int(5), Origin::root()).await.unwrap();

        let wait_handle = {
            let obj = obj.clone();
            tokio::spawn(async move { obj.long_poll(Some(1), true, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_secs(6)).await;
        let outcome = wait_handle.await.unwrap();
        assert_eq!(outcome, LongPollOutcome::NotChanged { etag: 1 });
    }

    #[tokio::test]
    async fn long_poll_with_wait_resolves_as_soon_as_a_new_value_lands() {
        let obj = WebApiObject::new(ValueKind::Int, "v");
        obj.write(Value::Int(5), Origin::root()).await.unwrap();

        let wait_handle = {
            let obj = obj.clone();
            tokio::spawn(async move { obj.long_poll(Some(1), true, Duration::from_secs(30)).await })
        };
        tokio::task::yield_now().await;
        obj.write(Value::Int(6), Origin::root()).await.unwrap();

        let outcome = wait_handle.await.unwrap();
        assert_eq!(outcome, LongPollOutcome::Value(NextValue { etag: 2, value: Some(Value::Int(6)) }));
    }
}
