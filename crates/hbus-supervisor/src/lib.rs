//! Interface lifecycle supervision (connect/run/subscribe with backoff)
//! and process-wide startup/shutdown orchestration.
//!
//! Grounded on `shc.supervisor`: one [`Supervisor`] per interface drives
//! its connect/run/subscribe cycle and reconnects with exponential
//! backoff; one [`ProcessSupervisor`] owns every interface, variable, and
//! timer in a process and drives the overall startup/shutdown sequence.

pub mod error;
pub mod interface;
pub mod process;
pub mod state;
pub mod status;
pub mod supervisor;

pub use error::{InterfaceError, InterfaceResult};
pub use interface::Interface;
pub use process::ProcessSupervisor;
pub use state::InterfaceState;
pub use status::{InterfaceStatus, Status};
pub use supervisor::{Supervisor, SupervisorConfig};
