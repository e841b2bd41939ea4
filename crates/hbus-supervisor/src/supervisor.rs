//! The [`Supervisor`]: drives one [`Interface`] through
//! connect/run/subscribe and keeps it running, reconnecting with
//! exponential backoff on failure.
//!
//! Grounded on `shc.supervisor.InterfaceSupervisor`. Shutdown uses a
//! `watch::Sender<bool>`/`Receiver<bool>` pair rather than `Notify`,
//! mirroring `services/receiver/src/session.rs`'s `shutdown` channel:
//! `watch` remembers its last value, so a `stop()` issued while the
//! supervise loop is between awaits is never lost the way a bare
//! `notify_waiters()` call would be.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::{InterfaceError, InterfaceResult};
use crate::interface::Interface;
use crate::state::{InterfaceState, StateCell};
use crate::status::InterfaceStatus;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub connect_timeout: Duration,
    pub subscribe_timeout: Duration,
    pub running_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_exponent: f64,
    pub backoff_max: Option<Duration>,
    pub auto_reconnect: bool,
    /// If true, a failed first startup attempt still leaves the
    /// supervisor retrying in the background rather than failing the
    /// whole process; see spec.md §4.C's fail-safe start mode.
    pub failsafe_start: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            connect_timeout: Duration::from_secs(30),
            subscribe_timeout: Duration::from_secs(30),
            running_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_secs(1),
            backoff_exponent: 1.25,
            backoff_max: None,
            auto_reconnect: true,
            failsafe_start: false,
        }
    }
}

/// Supervises a single [`Interface`] for its whole lifetime.
pub struct Supervisor {
    interface: Arc<dyn Interface>,
    config: SupervisorConfig,
    state: StateCell,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    /// Invoked once startup or reconnection fails in a way that is not
    /// recoverable under the current config (auto_reconnect disabled).
    /// The process supervisor wires this to its own fatal-shutdown path.
    on_fatal: Arc<dyn Fn(String) + Send + Sync>,
}

impl Supervisor {
    pub fn new(interface: Arc<dyn Interface>, config: SupervisorConfig, on_fatal: Arc<dyn Fn(String) + Send + Sync>) -> Arc<Self> {
        let (stop_tx, stop_rx) = watch::channel(false);
        Arc::new(Supervisor {
            interface,
            config,
            state: StateCell::new(InterfaceState::Created),
            stop_tx,
            stop_rx,
            on_fatal,
        })
    }

    pub fn name(&self) -> &str {
        self.interface.name()
    }

    pub fn state(&self) -> InterfaceState {
        self.state.get()
    }

    pub async fn status(&self) -> InterfaceStatus {
        self.interface.status().await
    }

    /// Runs the first connect/run/subscribe attempt, then hands off to
    /// the reconnect loop in a background task. Returns once the first
    /// attempt has either reached `Running` or been handed to the
    /// background retry loop under `failsafe_start`/`auto_reconnect`.
    pub async fn start(self: &Arc<Self>) -> InterfaceResult<()> {
        match self.attempt().await {
            Ok(run_handle) => {
                self.state.set(InterfaceState::Running);
                self.spawn_supervise_loop(run_handle, 0);
                Ok(())
            }
            Err(err) => {
                if self.config.failsafe_start || self.config.auto_reconnect {
                    tracing::warn!(interface = self.name(), error = %err, "initial startup failed, retrying in background");
                    self.state.set(InterfaceState::Backoff);
                    let this = self.clone();
                    tokio::spawn(async move { this.backoff_then_retry_loop(0).await });
                    Ok(())
                } else {
                    self.state.set(InterfaceState::Failed);
                    (self.on_fatal)(format!("{} failed to start: {err}", self.name()));
                    Err(err)
                }
            }
        }
    }

    /// Signals the supervise loop to stop and tears down the interface.
    /// Idempotent.
    pub async fn stop(&self) {
        self.state.set(InterfaceState::Stopping);
        let _ = self.stop_tx.send(true);
        self.interface.disconnect().await;
        self.state.set(InterfaceState::Stopped);
    }

    fn spawn_supervise_loop(self: &Arc<Self>, run_handle: JoinHandle<InterfaceResult<()>>, attempt_number: u32) {
        let this = self.clone();
        tokio::spawn(async move { this.supervise_loop(run_handle, attempt_number).await });
    }

    /// Waits on the currently running interface task until it exits or
    /// `stop()` fires, then reconnects with backoff.
    async fn supervise_loop(self: Arc<Self>, mut run_handle: JoinHandle<InterfaceResult<()>>, mut attempt_number: u32) {
        loop {
            let mut stop_rx = self.stop_rx.clone();
            let run_result = tokio::select! {
                biased;
                _ = stop_rx.changed() => {
                    run_handle.abort();
                    return;
                }
                joined = &mut run_handle => Some(joined),
            };

            match run_result {
                Some(Ok(Ok(()))) => attempt_number = 0,
                Some(Ok(Err(err))) => tracing::warn!(interface = self.name(), error = %err, "interface run loop exited with error"),
                Some(Err(join_err)) => tracing::warn!(interface = self.name(), error = %join_err, "interface run task panicked"),
                None => unreachable!("select always resolves one branch"),
            }

            if *self.stop_rx.borrow() {
                return;
            }

            if !self.config.auto_reconnect {
                self.state.set(InterfaceState::Failed);
                (self.on_fatal)(format!("{} exited and auto_reconnect is disabled", self.name()));
                return;
            }

            self.state.set(InterfaceState::Backoff);
            if !self.enter_backoff(attempt_number).await {
                return;
            }

            match self.retry_until_connected(&mut attempt_number).await {
                Some(new_handle) => {
                    self.state.set(InterfaceState::Running);
                    run_handle = new_handle;
                    attempt_number = 0;
                }
                None => return,
            }
        }
    }

    /// Used when the initial `start()` attempt fails outright: keeps
    /// retrying `attempt()` behind a backoff until it succeeds or
    /// `stop()` is signaled, then hands off to the normal supervise loop.
    async fn backoff_then_retry_loop(self: Arc<Self>, mut attempt_number: u32) {
        if !self.enter_backoff(attempt_number).await {
            return;
        }
        match self.retry_until_connected(&mut attempt_number).await {
            Some(run_handle) => {
                self.state.set(InterfaceState::Running);
                self.supervise_loop(run_handle, 0).await;
            }
            None => {}
        }
    }

    /// Keeps calling `attempt()`, backing off between failures, until one
    /// succeeds or `stop()` fires (returns `None`).
    async fn retry_until_connected(&self, attempt_number: &mut u32) -> Option<JoinHandle<InterfaceResult<()>>> {
        loop {
            if *self.stop_rx.borrow() {
                return None;
            }
            match self.attempt().await {
                Ok(handle) => return Some(handle),
                Err(err) => {
                    tracing::warn!(interface = self.name(), error = %err, "reconnect attempt failed");
                    *attempt_number += 1;
                    self.state.set(InterfaceState::Backoff);
                    if !self.enter_backoff(*attempt_number).await {
                        return None;
                    }
                }
            }
        }
    }

    /// One connect -> run-until-ready -> subscribe cycle. On success,
    /// returns the join handle of the interface's still-running `run()`
    /// task; the caller is responsible for joining or aborting it.
    async fn attempt(&self) -> InterfaceResult<JoinHandle<InterfaceResult<()>>> {
        self.state.set(InterfaceState::Connecting);
        timeout(self.config.connect_timeout, self.interface.connect())
            .await
            .map_err(|_| InterfaceError::Timeout { phase: "connect" })??;

        self.state.set(InterfaceState::RunningStartup);
        let running = Arc::new(Notify::new());
        let mut run_handle = {
            let interface = self.interface.clone();
            let running = running.clone();
            tokio::spawn(async move { interface.run(running).await })
        };

        let ready_or_exit = timeout(self.config.running_timeout, async {
            tokio::select! {
                _ = running.notified() => Ok(()),
                joined = &mut run_handle => match joined {
                    Ok(Ok(())) => Err(InterfaceError::RunExitedBeforeReady),
                    Ok(Err(err)) => Err(err),
                    Err(join_err) => Err(InterfaceError::Join(join_err.to_string())),
                },
            }
        })
        .await;

        match ready_or_exit {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                run_handle.abort();
                return Err(InterfaceError::Timeout { phase: "run_startup" });
            }
        }

        self.state.set(InterfaceState::Subscribing);
        let subscribe_result = timeout(self.config.subscribe_timeout, self.interface.subscribe()).await;
        match subscribe_result {
            Ok(Ok(())) => Ok(run_handle),
            Ok(Err(err)) => {
                run_handle.abort();
                Err(err)
            }
            Err(_) => {
                run_handle.abort();
                Err(InterfaceError::Timeout { phase: "subscribe" })
            }
        }
    }

    /// Sleeps for `backoff_base * backoff_exponent^attempt_number`,
    /// capped at `backoff_max` if set. Returns `false` if `stop()` fires
    /// during the sleep.
    async fn enter_backoff(&self, attempt_number: u32) -> bool {
        let scaled = self.config.backoff_base.mul_f64(self.config.backoff_exponent.powi(attempt_number as i32));
        let delay = match self.config.backoff_max {
            Some(cap) => scaled.min(cap),
            None => scaled,
        };

        let mut stop_rx = self.stop_rx.clone();
        tokio::select! {
            biased;
            _ = stop_rx.changed() => !*stop_rx.borrow(),
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
