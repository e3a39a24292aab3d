//! Sequenced outbound update events.
//!
//! Normalized updates republished to subscribers after reconciliation.
//! The first update any subscriber could have seen for an order carries
//! the full order snapshot; subsequent updates are deltas.

use serde::{Deserialize, Serialize};

use crate::completion::RejectType;
use crate::ids::{ChannelId, OrderSid, TradeSid};
use crate::order::{Order, OrderStatus, Price, Qty};

/// What happened to the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderUpdateKind {
    Accepted,
    Rejected {
        reject_type: RejectType,
        reason: String,
    },
    Cancelled {
        cumulative_qty: Qty,
    },
    Expired {
        cumulative_qty: Qty,
    },
    CancelRejected {
        reject_type: RejectType,
    },
    Trade {
        trade_sid: TradeSid,
        execution_price: Price,
        execution_qty: Qty,
        status: OrderStatus,
    },
}

impl OrderUpdateKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected { .. } => "rejected",
            Self::Cancelled { .. } => "cancelled",
            Self::Expired { .. } => "expired",
            Self::CancelRejected { .. } => "cancel_rejected",
            Self::Trade { .. } => "trade",
        }
    }
}

/// One sequenced update on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub channel_id: ChannelId,
    pub channel_seq: u64,
    pub order_sid: OrderSid,
    pub kind: OrderUpdateKind,
    /// Full order snapshot; present when this is the first update a
    /// subscriber could have seen for the order.
    pub snapshot: Option<Order>,
}

impl OrderUpdate {
    #[must_use]
    pub fn is_first_update(&self) -> bool {
        self.snapshot.is_some()
    }
}
