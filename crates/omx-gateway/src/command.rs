//! Operational command surface.

use serde::{Deserialize, Serialize};

use omx_core::OrderSid;

/// Actions forwarded to the exchange-facing engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineAction {
    /// Engine-specific line action (connect, disconnect, ...).
    LineHandlerAction(String),
    /// Dump every known order into the engine's log.
    PrintAllOrderInfo,
    /// Dump one order into the engine's log.
    PrintOrderInfo(OrderSid),
}

/// Operational control commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Advance the service one step along its startup sequence.
    EvaluateState,
    /// Clear all mutable state; only valid while active.
    Reset,
    /// Forward an action to the exchange-facing engine.
    Engine(EngineAction),
}

/// Command acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandAck {
    Ok,
    Failed,
    NotSupported,
}
