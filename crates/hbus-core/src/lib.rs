//! Connectable object model: capability traits, origin-tracked propagation,
//! the reference `Variable` type, and the value conversion registry.
//!
//! This crate has no notion of interfaces, timers, or persistence; it is
//! the propagation substrate those other crates connect into.

pub mod base;
pub mod conversion;
pub mod error;
pub mod ids;
pub mod value;
pub mod variable;

pub use base::{connect, Converter, ConverterLookup, Endpoint, Origin, Readable, Reading, Subscribable, Writable};
pub use conversion::ConversionRegistry;
pub use error::{CoreError, CoreResult};
pub use ids::ObjectId;
pub use value::{Value, ValueKind};
pub use variable::Variable;
