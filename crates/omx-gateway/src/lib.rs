//! The omx order-management gateway service.
//!
//! Composes admission control, the throttle-gated dispatcher, order
//! state reconciliation and the lifecycle orchestrator behind one
//! service facade. Strategies submit order intents, receive exactly one
//! completion per request, and subscribe to the sequenced update
//! stream.

pub mod admission;
pub mod command;
pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod logging;
pub mod recovery;
pub mod service;
pub mod stage;

pub use admission::{
    AdmissionConfig, AdmissionController, CancelOrderInstruction, DispatchCompletions,
    NewOrderInstruction,
};
pub use command::{Command, CommandAck, EngineAction};
pub use config::{GatewayConfig, ThrottleDomainConfig};
pub use distribution::{CompletionHub, SubscriberHub};
pub use engine::{EngineChild, EngineControl};
pub use error::{GatewayError, GatewayResult};
pub use recovery::{run_recovery_protocol, PersistenceClient};
pub use service::OrderGateway;
pub use stage::{spawn_update_stage, UpdateStage};
