//! Process-wide startup/shutdown orchestration, grounded on
//! `shc.supervisor.ServiceLifecycle` and spec.md §4.G: start every
//! registered interface in parallel, initialize variables from their
//! providers, start timers, then block until a stop signal or a fatal
//! interface error.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use hbus_core::variable::{initialize_from_provider, Variable};
use hbus_timer::{spawn as spawn_timer, Timer, TimerTaskHandle};
use tokio::sync::{watch, Mutex as AsyncMutex};

use crate::error::InterfaceResult;
use crate::interface::Interface;
use crate::status::InterfaceStatus;
use crate::supervisor::{Supervisor, SupervisorConfig};

/// Owns every interface supervisor, variable, and timer registered for
/// one process, and drives the full startup/shutdown sequence.
pub struct ProcessSupervisor {
    interfaces: AsyncMutex<Vec<Arc<Supervisor>>>,
    variables: AsyncMutex<Vec<Arc<Variable>>>,
    timers: AsyncMutex<Vec<Arc<Timer>>>,
    timer_handles: AsyncMutex<Vec<TimerTaskHandle>>,
    exit_code: AtomicI32,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl ProcessSupervisor {
    pub fn new() -> Arc<Self> {
        let (stop_tx, stop_rx) = watch::channel(false);
        Arc::new(ProcessSupervisor {
            interfaces: AsyncMutex::new(Vec::new()),
            variables: AsyncMutex::new(Vec::new()),
            timers: AsyncMutex::new(Vec::new()),
            timer_handles: AsyncMutex::new(Vec::new()),
            exit_code: AtomicI32::new(0),
            stop_tx,
            stop_rx,
        })
    }

    /// Registers an interface under a fresh [`Supervisor`], wired so that
    /// an unrecoverable failure calls back into [`Self::interface_failure`].
    pub async fn register_interface(self: &Arc<Self>, interface: Arc<dyn Interface>, config: SupervisorConfig) -> Arc<Supervisor> {
        let name = interface.name().to_string();
        let this = self.clone();
        let on_fatal = Arc::new(move |reason: String| {
            let this = this.clone();
            let name = name.clone();
            tokio::spawn(async move { this.interface_failure(&name, reason).await });
        });
        let supervisor = Supervisor::new(interface, config, on_fatal);
        self.interfaces.lock().await.push(supervisor.clone());
        supervisor
    }

    pub async fn register_variable(&self, variable: Arc<Variable>) {
        self.variables.lock().await.push(variable);
    }

    pub async fn register_timer(&self, timer: Arc<Timer>) {
        self.timers.lock().await.push(timer);
    }

    /// Startup sequence: start all interfaces in parallel, initialize
    /// variables from their providers, start timers.
    pub async fn start_all(self: &Arc<Self>) -> InterfaceResult<()> {
        let interfaces = self.interfaces.lock().await.clone();
        let starts = interfaces.iter().map(|s| s.start());
        for result in futures_util::future::join_all(starts).await {
            result?;
        }

        let variables = self.variables.lock().await.clone();
        for variable in &variables {
            if let Err(err) = initialize_from_provider(variable.as_ref()).await {
                tracing::warn!(error = %err, "variable provider initialization failed");
            }
        }

        let timers = self.timers.lock().await.clone();
        let mut handles = self.timer_handles.lock().await;
        for timer in timers {
            handles.push(spawn_timer(timer));
        }

        Ok(())
    }

    /// Blocks until [`Self::stop`] or [`Self::interface_failure`] fires.
    pub async fn wait_for_stop(&self) -> i32 {
        let mut rx = self.stop_rx.clone();
        loop {
            if *rx.borrow() {
                return self.exit_code.load(Ordering::SeqCst);
            }
            if rx.changed().await.is_err() {
                return self.exit_code.load(Ordering::SeqCst);
            }
        }
    }

    /// Shutdown sequence: stop all interfaces and cancel all timers in
    /// parallel, swallowing individual errors, then signal the stop
    /// event so [`Self::wait_for_stop`] returns.
    pub async fn shutdown_all(&self) {
        let interfaces = self.interfaces.lock().await.clone();
        futures_util::future::join_all(interfaces.iter().map(|s| s.stop())).await;

        let mut handles = self.timer_handles.lock().await;
        for handle in handles.drain(..) {
            handle.cancel();
        }

        let _ = self.stop_tx.send(true);
    }

    /// Called when an interface supervisor gives up for good under the
    /// current config (`auto_reconnect = false`). Sets exit code 1 and
    /// schedules a full process shutdown.
    pub async fn interface_failure(self: &Arc<Self>, name: &str, reason: String) {
        tracing::error!(interface = name, reason = %reason, "interface failed fatally");
        self.exit_code.store(1, Ordering::SeqCst);
        self.shutdown_all().await;
    }

    pub async fn interface_statuses(&self) -> Vec<(String, InterfaceStatus)> {
        let interfaces = self.interfaces.lock().await.clone();
        let mut out = Vec::with_capacity(interfaces.len());
        for supervisor in interfaces {
            let status = supervisor.status().await;
            out.push((supervisor.name().to_string(), status));
        }
        out
    }

    /// The registered supervisors themselves, for callers that need both
    /// `state()` and `status()` per interface (the web API's admin
    /// endpoint).
    pub async fn interfaces(&self) -> Vec<Arc<Supervisor>> {
        self.interfaces.lock().await.clone()
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        // `new()` returns an `Arc<Self>`; `Default` is provided only for
        // call sites that need a bare value (e.g. struct literal
        // defaults), constructing an equivalent unwrapped instance.
        let (stop_tx, stop_rx) = watch::channel(false);
        ProcessSupervisor {
            interfaces: AsyncMutex::new(Vec::new()),
            variables: AsyncMutex::new(Vec::new()),
            timers: AsyncMutex::new(Vec::new()),
            timer_handles: AsyncMutex::new(Vec::new()),
            exit_code: AtomicI32::new(0),
            stop_tx,
            stop_rx,
        }
    }
}
