use crate::value::ValueKind;
use thiserror::Error;

/// Errors raised by the propagation engine proper (base traits, Variable,
/// conversion registry). Interface and data-log errors live in their own
/// crates' error enums (`hbus-supervisor::SupervisorError`,
/// `hbus-datalog::DatalogError`).
#[derive(Debug, Error)]
pub enum CoreError {
    /// A `read()` was attempted before any value exists.
    #[error("object has no value yet")]
    Uninitialized,

    /// No converter registered for this type pair at wiring time.
    #[error("no converter registered from {from} to {to}")]
    NoConverter { from: ValueKind, to: ValueKind },

    /// A write arrived carrying a value of the wrong ground type.
    #[error("expected value of kind {expected}, got {actual}")]
    TypeMismatch {
        expected: ValueKind,
        actual: ValueKind,
    },

    /// Raised by `connect()` when neither side of the edge exposes a
    /// capability the other can use.
    #[error("cannot connect: {0}")]
    Configuration(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
