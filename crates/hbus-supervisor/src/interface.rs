//! The [`Interface`] trait: the four hooks every long-lived external
//! collaborator implements, grounded on `shc.supervisor.AbstractInterface`.
//!
//! A concrete interface (a fieldbus client, a chat bot poller, a database
//! pool) is driven entirely through these four calls; [`crate::supervisor::Supervisor`]
//! owns the state machine and never touches the interface's internals.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::InterfaceResult;
use crate::status::InterfaceStatus;

/// A long-lived collaborator that connects to a remote endpoint.
///
/// Implementations must uphold:
/// - `connect()` is idempotent across any prior failure — no prior
///   `disconnect()` is issued before a retry.
/// - `run()` signals `running` as soon as it is ready to receive traffic,
///   and must exit promptly once `disconnect()` has been called.
/// - `subscribe()` runs only after `run()` has signaled ready, and is
///   called again after every successful reconnect.
/// - `disconnect()` is idempotent, must not panic, and must cause a
///   concurrently running `run()` to exit.
#[async_trait]
pub trait Interface: Send + Sync {
    /// A stable name used in logs and in the web API's admin endpoint.
    fn name(&self) -> &str;

    /// Establish the underlying connection. Does not start accepting
    /// traffic; `run()` does that.
    async fn connect(&self) -> InterfaceResult<()>;

    /// The long-lived receive loop. Must call `running.notify_one()` (or
    /// `notify_waiters()`) as soon as the interface is ready to accept
    /// traffic, then keep running until `disconnect()` causes it to
    /// return. Returning before signaling ready is treated as a startup
    /// failure.
    async fn run(&self, running: Arc<Notify>) -> InterfaceResult<()>;

    /// Resubscribe to whatever upstream topics/endpoints this interface
    /// needs, now that `run()` is ready to deliver traffic. Called again
    /// after every reconnect.
    async fn subscribe(&self) -> InterfaceResult<()>;

    /// Idempotent teardown; must cause a running `run()` task to exit.
    async fn disconnect(&self);

    /// Optional health probe surfaced by the web API's admin endpoint.
    /// Interfaces with nothing interesting to report can rely on the
    /// default, which is always `Status::Ok`.
    async fn status(&self) -> InterfaceStatus {
        InterfaceStatus::ok()
    }
}
