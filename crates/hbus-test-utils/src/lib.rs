//! Shared test fakes for the hbus workspace: an in-memory data-log
//! backend and a scriptable interface, used by `hbus-supervisor`'s own
//! tests and by the root integration suites.

pub mod fake_interface;
pub mod memory_backend;

pub use fake_interface::FakeInterface;
pub use memory_backend::MemoryBackend;
