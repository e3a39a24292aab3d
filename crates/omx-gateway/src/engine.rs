//! The exchange-facing engine as a lifecycle child.
//!
//! The engine itself (session, codec, transport) lives outside this
//! workspace; the gateway drives it through `EngineControl` and wraps
//! it so the orchestrator can sequence it with the other children.
//! Ordering is load-bearing: the engine is the LAST child, so on
//! recovery entry its replay starts only after the dispatcher and the
//! reconciliation stage are listening, and on stop it is told to stop
//! only after they have shut down.

use std::sync::Arc;

use omx_lifecycle::{LifecycleChild, LifecycleController, LifecycleHooks};

use crate::command::EngineAction;

/// Control surface of the exchange-facing engine.
pub trait EngineControl: Send + Sync {
    /// Begin replaying execution reports for recovery.
    fn start_recovery(&self);

    /// Clear engine-side mutable state.
    fn reset(&self);

    /// Disconnect and stop the engine.
    fn stop(&self);

    /// Whether engine-side state is back at its starting values.
    fn is_clear(&self) -> bool;

    /// Apply an operational action (line actions, order-info dumps).
    /// Returns false when the engine does not support the action.
    fn apply_action(&self, action: &EngineAction) -> bool;
}

struct EngineHooks {
    control: Arc<dyn EngineControl>,
}

impl LifecycleHooks for EngineHooks {
    fn on_recovery_enter(&self) {
        // Listeners upstream are installed by now; safe to replay.
        self.control.start_recovery();
    }

    fn on_pending_reset(&self) -> Result<(), String> {
        self.control.reset();
        Ok(())
    }

    fn on_stopped(&self) {
        self.control.stop();
    }
}

/// Lifecycle wrapper around the engine control surface.
pub struct EngineChild {
    name: String,
    control: Arc<dyn EngineControl>,
    controller: LifecycleController,
}

impl EngineChild {
    #[must_use]
    pub fn new(name: impl Into<String>, control: Arc<dyn EngineControl>) -> Arc<Self> {
        let name = name.into();
        let controller = LifecycleController::new(
            format!("{name}-lifecycle"),
            Box::new(EngineHooks {
                control: Arc::clone(&control),
            }),
        );
        Arc::new(Self {
            name,
            control,
            controller,
        })
    }

    #[must_use]
    pub fn control(&self) -> &Arc<dyn EngineControl> {
        &self.control
    }
}

impl LifecycleChild for EngineChild {
    fn name(&self) -> &str {
        &self.name
    }

    fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    fn is_clear(&self) -> bool {
        self.control.is_clear()
    }
}
