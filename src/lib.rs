//! Facade crate tying the `hbus` workspace's crates together for the
//! root integration suites: no novel logic lives here, only re-exports
//! of the propagation substrate (`hbus-core`), the interface supervisor
//! (`hbus-supervisor`), the periodic timer (`hbus-timer`), the data-log
//! (`hbus-datalog`), and the wire types (`hbus-protocol`) the web API
//! service builds on.

pub use hbus_core as core;
pub use hbus_datalog as datalog;
pub use hbus_protocol as protocol;
pub use hbus_supervisor as supervisor;
pub use hbus_timer as timer;
pub use hbus_ui_log as ui_log;
