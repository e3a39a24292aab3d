//! Lifecycle error types.

use thiserror::Error;

use crate::state::{LifecycleState, LifecycleTarget};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Invalid transition from {from} towards {target}")]
    InvalidTransition {
        from: LifecycleState,
        target: LifecycleTarget,
    },

    #[error("Pending hook for {target} failed: {reason}")]
    HookFailed {
        target: LifecycleTarget,
        reason: String,
    },

    #[error("Child '{child}' reached {actual} instead of {expected}")]
    UnexpectedChildState {
        child: String,
        expected: LifecycleState,
        actual: LifecycleState,
    },

    #[error("Child '{child}' is not clear after reset")]
    NotClearAfterReset { child: String },
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
