use thiserror::Error;

/// Errors raised inside the web API boundary: object registry lookups,
/// JSON decode failures, and upstream propagation errors surfaced back
/// to an HTTP or websocket client.
#[derive(Debug, Error)]
pub enum WebApiError {
    #[error("unknown object '{0}'")]
    UnknownObject(String),

    #[error("object '{0}' has no value yet")]
    Uninitialized(String),

    #[error("invalid value for object '{0}': {1}")]
    Decode(String, String),

    #[error("upstream propagation error: {0}")]
    Core(#[from] hbus_core::CoreError),
}

pub type WebApiResult<T> = Result<T, WebApiError>;
