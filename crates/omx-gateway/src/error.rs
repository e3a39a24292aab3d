//! Gateway error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Risk error: {0}")]
    Risk(#[from] omx_risk::RiskError),

    #[error("Executor error: {0}")]
    Executor(#[from] omx_executor::ExecutorError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] omx_lifecycle::LifecycleError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Recovery did not drain within {0} ms")]
    RecoveryStalled(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
