//! Order-related types: sides, prices, quantities and the mutable
//! exchange-visible order projection.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{InstrumentSid, OrderSid};

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Returns the opposite side.
    #[must_use]
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Returns 1 for buy, -1 for sell (for position calculations).
    #[must_use]
    pub fn sign(&self) -> i8 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Limit order.
    #[default]
    Limit,
    /// Market order. Admission cannot price-validate these, so they are
    /// rejected at the gateway; the variant exists for report decoding.
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "limit"),
            Self::Market => write!(f, "market"),
        }
    }
}

/// Time-in-force for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good for the trading day.
    #[default]
    #[serde(rename = "Day")]
    Day,
    /// Good-til-cancelled.
    #[serde(rename = "Gtc")]
    GoodTillCancel,
    /// Immediate-or-cancel.
    #[serde(rename = "Ioc")]
    ImmediateOrCancel,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => write!(f, "Day"),
            Self::GoodTillCancel => write!(f, "Gtc"),
            Self::ImmediateOrCancel => write!(f, "Ioc"),
        }
    }
}

/// Limit price in integer ticks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Price(pub i64);

impl Price {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order quantity in integer lots.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Qty(pub i64);

impl Qty {
    pub const ZERO: Qty = Qty(0);

    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monetary exposure of `qty` at `price`.
#[must_use]
pub fn notional(price: Price, qty: Qty) -> i64 {
    price.value() * qty.value()
}

/// Exchange-visible order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// A terminal status receives no further updates.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Rejected | Self::Expired
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Mutable projection of exchange-visible order state.
///
/// Created on the first piece of exchange evidence for an order sid and
/// mutated in place thereafter. Never shared outside its owning context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_sid: OrderSid,
    pub instrument_sid: InstrumentSid,
    pub side: Side,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub tif: TimeInForce,
    /// Limit price in ticks.
    pub limit_price: Price,
    /// Originally submitted quantity.
    pub quantity: Qty,
    /// Remaining unexecuted quantity.
    pub leaves_qty: Qty,
    /// Cumulative executed quantity.
    pub cumulative_qty: Qty,
    /// Creation timestamp (Unix milliseconds).
    pub created_at: u64,
    /// Last update timestamp (Unix milliseconds).
    pub updated_at: u64,
    /// Reject reason text, populated on a rejected order.
    pub reject_reason: Option<String>,
}

impl Order {
    /// Build an order in its initial accepted shape.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_sid: OrderSid,
        instrument_sid: InstrumentSid,
        side: Side,
        order_type: OrderType,
        tif: TimeInForce,
        limit_price: Price,
        quantity: Qty,
        now_ms: u64,
    ) -> Self {
        Self {
            order_sid,
            instrument_sid,
            side,
            status: OrderStatus::New,
            order_type,
            tif,
            limit_price,
            quantity,
            leaves_qty: quantity,
            cumulative_qty: Qty::ZERO,
            created_at: now_ms,
            updated_at: now_ms,
            reject_reason: None,
        }
    }

    /// Apply an execution of `exec_qty`; moves to `Filled` when nothing
    /// is left, `PartiallyFilled` otherwise.
    pub fn apply_execution(&mut self, exec_qty: Qty, now_ms: u64) {
        let executed = exec_qty.value().min(self.leaves_qty.value());
        self.leaves_qty = Qty::new(self.leaves_qty.value() - executed);
        self.cumulative_qty = Qty::new(self.cumulative_qty.value() + executed);
        self.status = if self.leaves_qty.is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = now_ms;
    }

    /// Move to a terminal, non-fill status with the report's cumulative
    /// quantity.
    pub fn terminate(&mut self, status: OrderStatus, cumulative_qty: Qty, now_ms: u64) {
        debug_assert!(status.is_terminal() && status != OrderStatus::Filled);
        self.cumulative_qty = cumulative_qty;
        self.leaves_qty = Qty::ZERO;
        self.status = status;
        self.updated_at = now_ms;
    }

    /// Quantity released back to risk limits on a terminal non-fill
    /// outcome: submitted minus cumulative executed.
    #[must_use]
    pub fn reset_qty(&self) -> Qty {
        Qty::new(self.quantity.value() - self.cumulative_qty.value())
    }
}
