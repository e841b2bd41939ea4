//! Health status reporting for interfaces, surfaced by the web API's
//! admin collaborator endpoint.
//!
//! Grounded on `shc/supervisor.py::Status`/`InterfaceStatus`.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceStatus {
    pub status: Status,
    pub message: String,
    pub indicators: HashMap<String, serde_json::Value>,
}

impl Default for InterfaceStatus {
    fn default() -> Self {
        InterfaceStatus { status: Status::Ok, message: String::new(), indicators: HashMap::new() }
    }
}

impl InterfaceStatus {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_message(status: Status, message: impl Into<String>) -> Self {
        InterfaceStatus { status, message: message.into(), indicators: HashMap::new() }
    }
}
