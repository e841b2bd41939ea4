use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatalogError {
    #[error("SQLite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("integrity check failed: {0}")]
    IntegrityCheckFailed(String),

    #[error("upstream propagation error: {0}")]
    Core(#[from] hbus_core::CoreError),

    #[error("aggregation method {method} does not apply to value kind {kind}")]
    UnsupportedAggregation { method: &'static str, kind: hbus_core::ValueKind },

    #[error("cannot decode logged value: {0}")]
    Decode(String),
}

pub type DatalogResult<T> = Result<T, DatalogError>;
