//! Order state reconciliation for the omx venue gateway.
//!
//! Consumes decoded exchange execution reports, reconciles them against
//! locally tracked order contexts (creating them lazily on first
//! evidence), reverses admission reservations exactly once per terminal
//! transition, and fans normalized sequenced updates back out.
//!
//! *STRICT*: all updates are driven by reports from the exchange-facing
//! engine; nothing here originates state.

pub mod context;
pub mod manager;
pub mod recovery;
pub mod seams;

pub use context::{ContextState, OrderContext};
pub use manager::{OrderContextManager, ReconcileMode, START_TRADE_SID_SEQUENCE};
pub use recovery::RecoveryTracker;
pub use seams::{CompletionSink, UpdateDistributor};
