//! The interface lifecycle state machine, grounded on `shc.supervisor`'s
//! state diagram (see spec.md §4.C): `created -> connecting ->
//! running_startup -> subscribing -> running`, with any state able to
//! fall back to `backoff`/`failed` on error or advance to
//! `stopping`/`stopped` on shutdown.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InterfaceState {
    Created = 0,
    Connecting = 1,
    RunningStartup = 2,
    Subscribing = 3,
    Running = 4,
    Backoff = 5,
    Stopping = 6,
    Stopped = 7,
    Failed = 8,
}

impl InterfaceState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => InterfaceState::Created,
            1 => InterfaceState::Connecting,
            2 => InterfaceState::RunningStartup,
            3 => InterfaceState::Subscribing,
            4 => InterfaceState::Running,
            5 => InterfaceState::Backoff,
            6 => InterfaceState::Stopping,
            7 => InterfaceState::Stopped,
            _ => InterfaceState::Failed,
        }
    }
}

impl std::fmt::Display for InterfaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InterfaceState::Created => "created",
            InterfaceState::Connecting => "connecting",
            InterfaceState::RunningStartup => "running_startup",
            InterfaceState::Subscribing => "subscribing",
            InterfaceState::Running => "running",
            InterfaceState::Backoff => "backoff",
            InterfaceState::Stopping => "stopping",
            InterfaceState::Stopped => "stopped",
            InterfaceState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// An atomically readable/writable [`InterfaceState`] cell, cheap enough
/// to poll from the web API's admin endpoint without a lock.
#[derive(Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(initial: InterfaceState) -> Self {
        StateCell(AtomicU8::new(initial as u8))
    }

    pub fn get(&self) -> InterfaceState {
        InterfaceState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: InterfaceState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_cell_round_trips_every_variant() {
        let cell = StateCell::new(InterfaceState::Created);
        for state in [
            InterfaceState::Connecting,
            InterfaceState::RunningStartup,
            InterfaceState::Subscribing,
            InterfaceState::Running,
            InterfaceState::Backoff,
            InterfaceState::Stopping,
            InterfaceState::Stopped,
            InterfaceState::Failed,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }
}
