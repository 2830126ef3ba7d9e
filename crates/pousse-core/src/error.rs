//! Engine result and error types

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Store(#[from] std::io::Error),

    #[error("task encoding error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid cron expression: {0}")]
    InvalidSchedule(String),
}
