#[derive(Debug, Clone, thiserror::Error)]
pub enum InterfaceError {
    #[error("{phase} timed out")]
    Timeout { phase: &'static str },
    #[error("interface task panicked or was cancelled: {0}")]
    Join(String),
    #[error("run() exited before signaling it was ready")]
    RunExitedBeforeReady,
    #[error("run() exited while subscribe() was in progress")]
    RunExitedDuringSubscribe,
    #[error("interface was stopped before startup completed")]
    StoppedBeforeStart,
    #[error("{0}")]
    Other(String),
}

pub type InterfaceResult<T> = Result<T, InterfaceError>;
