//! In-flight order request registry and per-instrument state.
//!
//! The registry is the one structure genuinely shared without a queue
//! between the admission thread and the reconciliation thread. Each
//! entry has a single writer per key: admission inserts, reconciliation
//! removes. Everything else in the gateway crosses threads via
//! channels.

pub mod instrument;
pub mod registry;

pub use instrument::{InstrumentDirectory, InstrumentState};
pub use registry::{OrderRequestRegistry, START_ORDER_SID_SEQUENCE};
