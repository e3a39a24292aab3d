//! Executor error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Order submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Failed to spawn dispatcher thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
