//! Lifecycle states and transition targets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of one lifecycle-managed component.
///
/// `Pending*` states are transient: the component sits there while its
/// pending hook runs, then either enters the stable state or falls back
/// to where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    Init,
    PendingWarmup,
    Warmup,
    PendingRecovery,
    Recovery,
    PendingActive,
    Active,
    PendingReset,
    Reset,
    PendingStop,
    Stopped,
}

impl LifecycleState {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::PendingWarmup
                | Self::PendingRecovery
                | Self::PendingActive
                | Self::PendingReset
                | Self::PendingStop
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "INIT",
            Self::PendingWarmup => "PENDING_WARMUP",
            Self::Warmup => "WARMUP",
            Self::PendingRecovery => "PENDING_RECOVERY",
            Self::Recovery => "RECOVERY",
            Self::PendingActive => "PENDING_ACTIVE",
            Self::Active => "ACTIVE",
            Self::PendingReset => "PENDING_RESET",
            Self::Reset => "RESET",
            Self::PendingStop => "PENDING_STOP",
            Self::Stopped => "STOPPED",
        };
        write!(f, "{s}")
    }
}

/// Stable states a transition can aim for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleTarget {
    Warmup,
    Recovery,
    Active,
    Reset,
    Stop,
}

impl LifecycleTarget {
    /// The pending state entered while the transition runs.
    #[must_use]
    pub fn pending_state(&self) -> LifecycleState {
        match self {
            Self::Warmup => LifecycleState::PendingWarmup,
            Self::Recovery => LifecycleState::PendingRecovery,
            Self::Active => LifecycleState::PendingActive,
            Self::Reset => LifecycleState::PendingReset,
            Self::Stop => LifecycleState::PendingStop,
        }
    }

    /// The stable state reached when the transition confirms.
    #[must_use]
    pub fn final_state(&self) -> LifecycleState {
        match self {
            Self::Warmup => LifecycleState::Warmup,
            Self::Recovery => LifecycleState::Recovery,
            Self::Active => LifecycleState::Active,
            Self::Reset => LifecycleState::Reset,
            Self::Stop => LifecycleState::Stopped,
        }
    }

    /// Whether a transition towards this target may start from `from`.
    #[must_use]
    pub fn allowed_from(&self, from: LifecycleState) -> bool {
        use LifecycleState::*;
        match self {
            Self::Warmup => matches!(from, Init),
            Self::Recovery => matches!(from, Init | Reset),
            Self::Active => matches!(from, Recovery),
            Self::Reset => matches!(from, Warmup | Recovery | Active),
            Self::Stop => !matches!(from, Stopped),
        }
    }
}

impl fmt::Display for LifecycleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.final_state())
    }
}
