//! Core domain types for the omx venue gateway.
//!
//! This crate provides fundamental types used throughout the order
//! management core:
//! - `OrderSid`, `ClientKey`, `InstrumentSid`: identifiers
//! - `Price`, `Qty`: integer tick/lot numeric types
//! - `OrderRequest`: admitted request variants (new/cancel)
//! - `ExecutionReport`: decoded exchange report kinds
//! - `OrderUpdate`: sequenced outbound update events
//! - `SequencingChannel` / `ChannelSequenceTracker`: per-channel ordering

pub mod channel;
pub mod clock;
pub mod completion;
pub mod error;
pub mod event;
pub mod ids;
pub mod order;
pub mod report;
pub mod request;

pub use channel::{ChannelSequenceTracker, SeqObservation, SequencingChannel, START_CHANNEL_SEQ};
pub use completion::{CompletionType, OrderRequestCompletion, RejectType};
pub use error::{CoreError, Result};
pub use event::{OrderUpdate, OrderUpdateKind};
pub use ids::{ChannelId, ClientKey, InstrumentSid, OrderSid, TradeSid};
pub use order::{notional, Order, OrderStatus, OrderType, Price, Qty, Side, TimeInForce};
pub use report::{
    ExecutionReport, OrderAccepted, OrderAmendRejected, OrderCancelRejected, OrderCancelled,
    OrderExpired, OrderRejected, TradeCancelled, TradeCreated,
};
pub use request::{CancelOrderRequest, NewOrderRequest, OrderRequest, NUM_THROTTLES_PER_ORDER};
