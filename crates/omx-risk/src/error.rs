//! Risk error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Invalid throttle capacity: {0}")]
    InvalidThrottleCapacity(i64),

    #[error("Invalid purchasing power: {0}")]
    InvalidPurchasingPower(i64),
}

pub type RiskResult<T> = Result<T, RiskError>;
