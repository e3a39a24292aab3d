//! Lifecycle state machine and orchestration.
//!
//! One state machine drives every subsystem of the gateway through
//! coordinated transitions (init → warm-up → recovery → active → reset
//! → stopped). Each child owns a `LifecycleController`; the
//! `LifecycleOrchestrator` asks every child to reach the target state
//! in a fixed order and aborts the transition on the first child that
//! does not confirm.

pub mod controller;
pub mod error;
pub mod orchestrator;
pub mod state;

pub use controller::{LifecycleController, LifecycleHooks, NoopHooks};
pub use error::{LifecycleError, LifecycleResult};
pub use orchestrator::{LifecycleChild, LifecycleOrchestrator, OrchestratorConfig};
pub use state::{LifecycleState, LifecycleTarget};
