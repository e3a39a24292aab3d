//! Admitted order request types.
//!
//! A request is owned by the registry from admission until completion.
//! Amend is intentionally unsupported; the only variants are new and
//! cancel.

use serde::{Deserialize, Serialize};

use crate::ids::{ClientKey, InstrumentSid, OrderSid};
use crate::order::{notional, OrderType, Price, Qty, Side, TimeInForce};

/// Throttle tokens a plain order consumes when dispatched.
pub const NUM_THROTTLES_PER_ORDER: u32 = 1;

/// Request to submit a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderRequest {
    /// Caller correlation id.
    pub client_key: ClientKey,
    /// Internally assigned order sid.
    pub order_sid: OrderSid,
    pub instrument_sid: InstrumentSid,
    pub side: Side,
    pub order_type: OrderType,
    pub tif: TimeInForce,
    pub limit_price: Price,
    pub quantity: Qty,
    /// Absolute deadline, monotonic nanoseconds. Past this instant the
    /// dispatcher reports a timeout instead of sending.
    pub deadline_ns: u64,
    /// Whether the dispatcher may wait for a throttle token.
    pub retry: bool,
    /// Index of the throttle tracker this request draws from.
    pub throttle_domain: usize,
    /// Tokens required to proceed (more than one for multi-leg flows).
    pub num_throttles_required: u32,
}

impl NewOrderRequest {
    /// Monetary exposure of this request.
    #[must_use]
    pub fn notional(&self) -> i64 {
        notional(self.limit_price, self.quantity)
    }
}

/// Request to cancel a previously admitted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    pub client_key: ClientKey,
    /// Sid of this cancel request itself.
    pub order_sid: OrderSid,
    /// Sid of the order to cancel.
    pub target_order_sid: OrderSid,
    pub instrument_sid: InstrumentSid,
    /// Side of the target order.
    pub side: Side,
    /// Permit cancelling an order whose local context no longer exists.
    pub force: bool,
    pub deadline_ns: u64,
    pub throttle_domain: usize,
    pub num_throttles_required: u32,
}

/// An admitted request, owned by the registry until completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderRequest {
    New(NewOrderRequest),
    Cancel(CancelOrderRequest),
}

impl OrderRequest {
    #[must_use]
    pub fn order_sid(&self) -> OrderSid {
        match self {
            Self::New(r) => r.order_sid,
            Self::Cancel(r) => r.order_sid,
        }
    }

    #[must_use]
    pub fn client_key(&self) -> ClientKey {
        match self {
            Self::New(r) => r.client_key,
            Self::Cancel(r) => r.client_key,
        }
    }

    #[must_use]
    pub fn instrument_sid(&self) -> InstrumentSid {
        match self {
            Self::New(r) => r.instrument_sid,
            Self::Cancel(r) => r.instrument_sid,
        }
    }

    #[must_use]
    pub fn side(&self) -> Side {
        match self {
            Self::New(r) => r.side,
            Self::Cancel(r) => r.side,
        }
    }

    #[must_use]
    pub fn deadline_ns(&self) -> u64 {
        match self {
            Self::New(r) => r.deadline_ns,
            Self::Cancel(r) => r.deadline_ns,
        }
    }

    /// Cancels never wait for a throttle token; new orders do when the
    /// caller allowed it.
    #[must_use]
    pub fn retry(&self) -> bool {
        match self {
            Self::New(r) => r.retry,
            Self::Cancel(_) => false,
        }
    }

    #[must_use]
    pub fn throttle_domain(&self) -> usize {
        match self {
            Self::New(r) => r.throttle_domain,
            Self::Cancel(r) => r.throttle_domain,
        }
    }

    #[must_use]
    pub fn num_throttles_required(&self) -> u32 {
        match self {
            Self::New(r) => r.num_throttles_required,
            Self::Cancel(r) => r.num_throttles_required,
        }
    }

    #[must_use]
    pub fn as_new(&self) -> Option<&NewOrderRequest> {
        match self {
            Self::New(r) => Some(r),
            Self::Cancel(_) => None,
        }
    }

    #[must_use]
    pub fn as_cancel(&self) -> Option<&CancelOrderRequest> {
        match self {
            Self::New(_) => None,
            Self::Cancel(r) => Some(r),
        }
    }
}
