//! Decoded exchange execution reports.
//!
//! The core consumes already-decoded report records; the wire codec
//! lives outside this workspace. Reports may arrive out of submission
//! order, may be the first evidence of an order, and may reference an
//! order whose context has already been archived.

use serde::{Deserialize, Serialize};

use crate::completion::RejectType;
use crate::ids::{InstrumentSid, OrderSid};
use crate::order::{OrderStatus, Price, Qty, Side};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAccepted {
    pub order_sid: OrderSid,
    pub instrument_sid: InstrumentSid,
    pub side: Side,
    pub price: Price,
    pub leaves_qty: Qty,
    pub cumulative_qty: Qty,
    /// Exchange-assigned order id.
    pub exchange_order_id: u64,
    /// Exchange transact time (Unix milliseconds).
    pub transact_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRejected {
    pub order_sid: OrderSid,
    pub instrument_sid: InstrumentSid,
    pub side: Side,
    pub price: Price,
    pub leaves_qty: Qty,
    pub cumulative_qty: Qty,
    pub reject_type: RejectType,
    pub reason: String,
    pub transact_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    /// Sid of the cancel request, when one exists; equals
    /// `orig_order_sid` for unsolicited cancels.
    pub order_sid: OrderSid,
    /// Sid of the cancelled order.
    pub orig_order_sid: OrderSid,
    pub instrument_sid: InstrumentSid,
    pub side: Side,
    pub price: Price,
    pub leaves_qty: Qty,
    pub cumulative_qty: Qty,
    pub transact_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExpired {
    pub order_sid: OrderSid,
    pub instrument_sid: InstrumentSid,
    pub side: Side,
    pub price: Price,
    pub leaves_qty: Qty,
    pub cumulative_qty: Qty,
    pub transact_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelRejected {
    /// Sid of the rejected cancel request.
    pub order_sid: OrderSid,
    pub instrument_sid: InstrumentSid,
    pub reject_type: RejectType,
    pub reason: String,
    pub transact_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAmendRejected {
    /// Sid of the rejected amend request.
    pub order_sid: OrderSid,
    pub instrument_sid: InstrumentSid,
    pub reason: String,
    pub transact_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeCreated {
    pub order_sid: OrderSid,
    pub instrument_sid: InstrumentSid,
    pub side: Side,
    pub execution_price: Price,
    pub execution_qty: Qty,
    /// Order status after this execution (filled or partially filled).
    pub status: OrderStatus,
    /// Exchange-assigned execution id.
    pub exchange_trade_id: u64,
    pub transact_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeCancelled {
    pub order_sid: OrderSid,
    pub instrument_sid: InstrumentSid,
    pub side: Side,
    pub execution_price: Price,
    pub execution_qty: Qty,
    pub transact_ms: u64,
}

/// One decoded execution report from the exchange-facing engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionReport {
    Accepted(OrderAccepted),
    Rejected(OrderRejected),
    Cancelled(OrderCancelled),
    Expired(OrderExpired),
    CancelRejected(OrderCancelRejected),
    AmendRejected(OrderAmendRejected),
    TradeCreated(TradeCreated),
    TradeCancelled(TradeCancelled),
}

impl ExecutionReport {
    /// The order sid the report refers to (the cancelled order's sid for
    /// cancel acknowledgments).
    #[must_use]
    pub fn order_sid(&self) -> OrderSid {
        match self {
            Self::Accepted(r) => r.order_sid,
            Self::Rejected(r) => r.order_sid,
            Self::Cancelled(r) => r.orig_order_sid,
            Self::Expired(r) => r.order_sid,
            Self::CancelRejected(r) => r.order_sid,
            Self::AmendRejected(r) => r.order_sid,
            Self::TradeCreated(r) => r.order_sid,
            Self::TradeCancelled(r) => r.order_sid,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Accepted(_) => "accepted",
            Self::Rejected(_) => "rejected",
            Self::Cancelled(_) => "cancelled",
            Self::Expired(_) => "expired",
            Self::CancelRejected(_) => "cancel_rejected",
            Self::AmendRejected(_) => "amend_rejected",
            Self::TradeCreated(_) => "trade_created",
            Self::TradeCancelled(_) => "trade_cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serde_round_trip() {
        let report = ExecutionReport::TradeCreated(TradeCreated {
            order_sid: OrderSid::new(3),
            instrument_sid: InstrumentSid::new(700),
            side: Side::Sell,
            execution_price: Price::new(101),
            execution_qty: Qty::new(40),
            status: OrderStatus::PartiallyFilled,
            exchange_trade_id: 88,
            transact_ms: 1_700_000_000_000,
        });
        let json = serde_json::to_string(&report).unwrap();
        let decoded: ExecutionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, report);
    }

    #[test]
    fn test_cancelled_report_resolves_to_orig_sid() {
        let report = ExecutionReport::Cancelled(OrderCancelled {
            order_sid: OrderSid::new(9),
            orig_order_sid: OrderSid::new(5),
            instrument_sid: InstrumentSid::new(700),
            side: Side::Buy,
            price: Price::new(100),
            leaves_qty: Qty::ZERO,
            cumulative_qty: Qty::ZERO,
            transact_ms: 0,
        });
        assert_eq!(report.order_sid(), OrderSid::new(5));
        assert_eq!(report.kind_name(), "cancelled");
    }
}
