//! A scriptable [`Interface`] fake for exercising the supervisor's
//! reconnect behavior (spec.md scenario S6) from outside `hbus-supervisor`
//! itself — e.g. from the root integration tests.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hbus_supervisor::{Interface, InterfaceError, InterfaceResult};
use tokio::sync::Notify;

/// Fails `connect()` the first `fail_connects` times, then succeeds.
/// Once running, stays up until [`FakeInterface::disconnect`] is called
/// (by the supervisor on shutdown) or [`FakeInterface::kill`] is called
/// by the test to simulate the interface dying on its own.
pub struct FakeInterface {
    name: String,
    fail_connects: AtomicU32,
    connect_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    kill_signal: Arc<Notify>,
}

impl FakeInterface {
    pub fn new(name: impl Into<String>, fail_connects: u32) -> Arc<Self> {
        Arc::new(FakeInterface {
            name: name.into(),
            fail_connects: AtomicU32::new(fail_connects),
            connect_calls: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            kill_signal: Arc::new(Notify::new()),
        })
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Simulates the interface's `run()` loop exiting on its own, as if
    /// the remote end dropped the connection.
    pub fn kill(&self) {
        self.kill_signal.notify_waiters();
    }
}

#[async_trait]
impl Interface for FakeInterface {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> InterfaceResult<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_connects.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_ok() {
            return Err(InterfaceError::Other(format!("{} simulated connect failure", self.name)));
        }
        Ok(())
    }

    async fn run(&self, running: Arc<Notify>) -> InterfaceResult<()> {
        running.notify_one();
        self.kill_signal.notified().await;
        Ok(())
    }

    async fn subscribe(&self) -> InterfaceResult<()> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.kill_signal.notify_waiters();
    }
}
