//! Per-child lifecycle controller.

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, LifecycleResult};
use crate::state::{LifecycleState, LifecycleTarget};

/// Hooks a lifecycle-managed component installs on its controller.
///
/// `on_pending_*` hooks may refuse, aborting the transition; the
/// controller then falls back to the pre-transition state. `on_*_enter`
/// hooks swap the component's active behavior and must not fail.
///
/// CAUTION: pending hooks are invoked from the orchestrating thread,
/// not from the component's own worker thread.
pub trait LifecycleHooks: Send + Sync {
    fn on_pending_warmup(&self) -> Result<(), String> {
        Ok(())
    }
    fn on_warmup_enter(&self) {}

    fn on_pending_recovery(&self) -> Result<(), String> {
        Ok(())
    }
    fn on_recovery_enter(&self) {}

    fn on_pending_active(&self) -> Result<(), String> {
        Ok(())
    }
    fn on_active_enter(&self) {}

    fn on_pending_reset(&self) -> Result<(), String> {
        Ok(())
    }
    fn on_reset_enter(&self) {}

    fn on_pending_stop(&self) -> Result<(), String> {
        Ok(())
    }
    fn on_stopped(&self) {}
}

/// Hooks implementation with no behavior, for children that only track
/// state.
#[derive(Debug, Default)]
pub struct NoopHooks;

impl LifecycleHooks for NoopHooks {}

/// Drives one component through the lifecycle state machine.
pub struct LifecycleController {
    name: String,
    state: Mutex<LifecycleState>,
    hooks: Box<dyn LifecycleHooks>,
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl LifecycleController {
    #[must_use]
    pub fn new(name: impl Into<String>, hooks: Box<dyn LifecycleHooks>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(LifecycleState::Init),
            hooks,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Run one transition: validate, enter the pending state, run the
    /// pending hook, then confirm the stable state and run its enter
    /// hook. A failing pending hook restores the pre-transition state.
    pub fn transition(&self, target: LifecycleTarget) -> LifecycleResult<LifecycleState> {
        let from = {
            let mut state = self.state.lock();
            let from = *state;
            if !target.allowed_from(from) {
                return Err(LifecycleError::InvalidTransition { from, target });
            }
            *state = target.pending_state();
            from
        };
        debug!(name = %self.name, %from, %target, "Lifecycle transition started");

        let pending_result = match target {
            LifecycleTarget::Warmup => self.hooks.on_pending_warmup(),
            LifecycleTarget::Recovery => self.hooks.on_pending_recovery(),
            LifecycleTarget::Active => self.hooks.on_pending_active(),
            LifecycleTarget::Reset => self.hooks.on_pending_reset(),
            LifecycleTarget::Stop => self.hooks.on_pending_stop(),
        };

        if let Err(reason) = pending_result {
            warn!(
                name = %self.name,
                %target,
                reason,
                "Pending hook refused, falling back"
            );
            *self.state.lock() = from;
            return Err(LifecycleError::HookFailed { target, reason });
        }

        *self.state.lock() = target.final_state();
        match target {
            LifecycleTarget::Warmup => self.hooks.on_warmup_enter(),
            LifecycleTarget::Recovery => self.hooks.on_recovery_enter(),
            LifecycleTarget::Active => self.hooks.on_active_enter(),
            LifecycleTarget::Reset => self.hooks.on_reset_enter(),
            LifecycleTarget::Stop => self.hooks.on_stopped(),
        }
        info!(name = %self.name, state = %target.final_state(), "Lifecycle transition complete");
        Ok(target.final_state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingHooks {
        pending_reset_calls: Arc<AtomicU32>,
        active_entered: Arc<AtomicBool>,
        refuse_recovery: bool,
    }

    impl LifecycleHooks for CountingHooks {
        fn on_pending_recovery(&self) -> Result<(), String> {
            if self.refuse_recovery {
                Err("not ready".to_string())
            } else {
                Ok(())
            }
        }

        fn on_active_enter(&self) {
            self.active_entered.store(true, Ordering::Release);
        }

        fn on_pending_reset(&self) -> Result<(), String> {
            self.pending_reset_calls.fetch_add(1, Ordering::AcqRel);
            Ok(())
        }
    }

    #[test]
    fn test_full_lifecycle_path() {
        let entered = Arc::new(AtomicBool::new(false));
        let controller = LifecycleController::new(
            "child",
            Box::new(CountingHooks {
                active_entered: Arc::clone(&entered),
                ..Default::default()
            }),
        );

        assert_eq!(controller.state(), LifecycleState::Init);
        controller.transition(LifecycleTarget::Warmup).unwrap();
        controller.transition(LifecycleTarget::Reset).unwrap();
        controller.transition(LifecycleTarget::Recovery).unwrap();
        controller.transition(LifecycleTarget::Active).unwrap();
        assert_eq!(controller.state(), LifecycleState::Active);
        assert!(entered.load(Ordering::Acquire));

        controller.transition(LifecycleTarget::Stop).unwrap();
        assert_eq!(controller.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let controller = LifecycleController::new("child", Box::new(NoopHooks));
        let err = controller.transition(LifecycleTarget::Active).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
        assert_eq!(controller.state(), LifecycleState::Init);
    }

    #[test]
    fn test_failing_pending_hook_falls_back() {
        let controller = LifecycleController::new(
            "child",
            Box::new(CountingHooks {
                refuse_recovery: true,
                ..Default::default()
            }),
        );
        let err = controller.transition(LifecycleTarget::Recovery).unwrap_err();
        assert!(matches!(err, LifecycleError::HookFailed { .. }));
        assert_eq!(controller.state(), LifecycleState::Init);
    }
}
