//! Multi-component lifecycle orchestration.
//!
//! Sequences several independently-threaded children through
//! coordinated transitions. Order matters and is fixed at construction:
//! on recovery entry the dispatcher and reconciliation stage must reach
//! Recovery before the exchange-facing engine starts replaying, and on
//! stop the children shut down disruptively before the engine is told
//! to stop.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::controller::LifecycleController;
use crate::error::{LifecycleError, LifecycleResult};
use crate::state::LifecycleTarget;

/// One orchestrated component.
pub trait LifecycleChild: Send + Sync {
    fn name(&self) -> &str;

    fn controller(&self) -> &LifecycleController;

    /// Whether every mutable structure of the child is back at its
    /// configured starting value. Checked after reset.
    fn is_clear(&self) -> bool {
        true
    }

    /// Begin disruptive shutdown (stop worker threads, drain buffers).
    /// Must be non-blocking; completion is observed via `is_stopped`.
    fn begin_disruptive_stop(&self) {}

    /// Whether disruptive shutdown has completed.
    fn is_stopped(&self) -> bool {
        true
    }
}

/// Orchestrator timing knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Bound on the per-child stop wait.
    pub stop_timeout: Duration,
    /// Poll interval while waiting for a child to stop.
    pub stop_poll_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(5),
            stop_poll_interval: Duration::from_millis(10),
        }
    }
}

/// Sequences children through lifecycle transitions, aborting on the
/// first child that does not confirm the expected resulting state.
pub struct LifecycleOrchestrator {
    children: Vec<Arc<dyn LifecycleChild>>,
    config: OrchestratorConfig,
}

impl LifecycleOrchestrator {
    #[must_use]
    pub fn new(children: Vec<Arc<dyn LifecycleChild>>, config: OrchestratorConfig) -> Self {
        Self { children, config }
    }

    /// Ask every child, in order, to reach `target`; fail on the first
    /// child that does not confirm.
    pub fn transition_all(&self, target: LifecycleTarget) -> LifecycleResult<()> {
        for child in &self.children {
            let reached = child.controller().transition(target)?;
            let expected = target.final_state();
            if reached != expected {
                return Err(LifecycleError::UnexpectedChildState {
                    child: child.name().to_string(),
                    expected,
                    actual: reached,
                });
            }
            info!(child = child.name(), state = %reached, "Child transitioned");
        }
        Ok(())
    }

    pub fn warmup(&self) -> LifecycleResult<()> {
        self.transition_all(LifecycleTarget::Warmup)
    }

    /// Recovery entry. The fixed child order guarantees listeners are
    /// installed before the engine (last child) begins replaying.
    pub fn recover(&self) -> LifecycleResult<()> {
        self.transition_all(LifecycleTarget::Recovery)
    }

    pub fn activate(&self) -> LifecycleResult<()> {
        self.transition_all(LifecycleTarget::Active)
    }

    /// Reset every child, then verify each independently reports clear.
    pub fn reset(&self) -> LifecycleResult<()> {
        self.transition_all(LifecycleTarget::Reset)?;
        for child in &self.children {
            if !child.is_clear() {
                return Err(LifecycleError::NotClearAfterReset {
                    child: child.name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Stop every child in order: disruptive shutdown with a bounded
    /// wait-and-poll per child, then the lifecycle transition. A child
    /// that misses the bound is logged as an error, not fatal.
    pub async fn stop(&self) -> LifecycleResult<()> {
        for child in &self.children {
            child.begin_disruptive_stop();
            let deadline = tokio::time::Instant::now() + self.config.stop_timeout;
            while !child.is_stopped() {
                if tokio::time::Instant::now() >= deadline {
                    error!(
                        child = child.name(),
                        timeout_ms = self.config.stop_timeout.as_millis() as u64,
                        "Child did not stop within bound"
                    );
                    break;
                }
                tokio::time::sleep(self.config.stop_poll_interval).await;
            }
            child.controller().transition(LifecycleTarget::Stop)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{LifecycleHooks, NoopHooks};
    use crate::state::LifecycleState;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct TestChild {
        name: String,
        controller: LifecycleController,
        clear: AtomicBool,
        stop_requested: AtomicBool,
        stops_immediately: bool,
    }

    impl TestChild {
        fn new(name: &str, clear: bool, stops_immediately: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                controller: LifecycleController::new(name, Box::new(NoopHooks)),
                clear: AtomicBool::new(clear),
                stop_requested: AtomicBool::new(false),
                stops_immediately,
            })
        }
    }

    impl LifecycleChild for TestChild {
        fn name(&self) -> &str {
            &self.name
        }

        fn controller(&self) -> &LifecycleController {
            &self.controller
        }

        fn is_clear(&self) -> bool {
            self.clear.load(Ordering::Acquire)
        }

        fn begin_disruptive_stop(&self) {
            self.stop_requested.store(true, Ordering::Release);
        }

        fn is_stopped(&self) -> bool {
            self.stops_immediately && self.stop_requested.load(Ordering::Acquire)
        }
    }

    fn orchestrator(children: Vec<Arc<dyn LifecycleChild>>) -> LifecycleOrchestrator {
        LifecycleOrchestrator::new(
            children,
            OrchestratorConfig {
                stop_timeout: Duration::from_millis(50),
                stop_poll_interval: Duration::from_millis(5),
            },
        )
    }

    #[test]
    fn test_transition_all_in_order() {
        let a = TestChild::new("a", true, true);
        let b = TestChild::new("b", true, true);
        let orch = orchestrator(vec![a.clone(), b.clone()]);

        orch.warmup().unwrap();
        assert_eq!(a.controller.state(), LifecycleState::Warmup);
        assert_eq!(b.controller.state(), LifecycleState::Warmup);

        orch.reset().unwrap();
        orch.recover().unwrap();
        orch.activate().unwrap();
        assert_eq!(b.controller.state(), LifecycleState::Active);
    }

    #[test]
    fn test_reset_fails_when_child_not_clear() {
        let a = TestChild::new("a", true, true);
        let dirty: Arc<dyn LifecycleChild> = TestChild::new("dirty", false, true);
        let orch = orchestrator(vec![a, dirty]);

        orch.warmup().unwrap();
        let err = orch.reset().unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::NotClearAfterReset { ref child } if child == "dirty"
        ));
    }

    #[test]
    fn test_abort_on_first_failing_child() {
        struct RefusingHooks;
        impl LifecycleHooks for RefusingHooks {
            fn on_pending_warmup(&self) -> Result<(), String> {
                Err("refused".into())
            }
        }

        struct Refuser {
            controller: LifecycleController,
        }
        impl LifecycleChild for Refuser {
            fn name(&self) -> &str {
                "refuser"
            }
            fn controller(&self) -> &LifecycleController {
                &self.controller
            }
        }

        let refuser = Arc::new(Refuser {
            controller: LifecycleController::new("refuser", Box::new(RefusingHooks)),
        });
        let after = TestChild::new("after", true, true);
        let orch = orchestrator(vec![refuser, after.clone()]);

        assert!(orch.warmup().is_err());
        // The child behind the failing one was never asked.
        assert_eq!(after.controller.state(), LifecycleState::Init);
    }

    #[tokio::test]
    async fn test_stop_sequences_and_survives_timeout() {
        let fast = TestChild::new("fast", true, true);
        let slow = TestChild::new("slow", true, false);
        let orch = orchestrator(vec![fast.clone(), slow.clone()]);

        // A child that never confirms stopping is logged, not fatal.
        orch.stop().await.unwrap();
        assert_eq!(fast.controller.state(), LifecycleState::Stopped);
        assert_eq!(slow.controller.state(), LifecycleState::Stopped);
        assert!(slow.stop_requested.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_stop_order_is_fixed() {
        static ORDER: AtomicU32 = AtomicU32::new(0);

        struct Ordered {
            name: String,
            controller: LifecycleController,
            seen: AtomicU32,
        }
        impl LifecycleChild for Ordered {
            fn name(&self) -> &str {
                &self.name
            }
            fn controller(&self) -> &LifecycleController {
                &self.controller
            }
            fn begin_disruptive_stop(&self) {
                self.seen
                    .store(ORDER.fetch_add(1, Ordering::AcqRel) + 1, Ordering::Release);
            }
        }

        let first = Arc::new(Ordered {
            name: "first".into(),
            controller: LifecycleController::new("first", Box::new(NoopHooks)),
            seen: AtomicU32::new(0),
        });
        let second = Arc::new(Ordered {
            name: "second".into(),
            controller: LifecycleController::new("second", Box::new(NoopHooks)),
            seen: AtomicU32::new(0),
        });

        let orch = orchestrator(vec![first.clone(), second.clone()]);
        orch.stop().await.unwrap();
        assert!(first.seen.load(Ordering::Acquire) < second.seen.load(Ordering::Acquire));
    }
}
