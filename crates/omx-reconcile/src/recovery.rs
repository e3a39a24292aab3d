//! Recovery-time request reconstruction.
//!
//! Across a restart the original `OrderRequest` objects are lost; the
//! replayed execution reports are the only evidence left. Quantity,
//! side and price are recovered from the report itself, the rest is
//! best-guess. The reconstructions are used only for bookkeeping
//! (exposure and position) and are never resent to the exchange.

use std::collections::HashSet;

use omx_core::{
    ClientKey, InstrumentSid, NewOrderRequest, OrderSid, OrderType, Price, Qty, Side, TimeInForce,
    NUM_THROTTLES_PER_ORDER,
};

/// Tracks which order sids recovery has already reconstructed.
///
/// A duplicate observation is a data-integrity error, rejected rather
/// than silently overwriting state.
#[derive(Debug, Default)]
pub struct RecoveryTracker {
    recovered_sids: HashSet<OrderSid>,
}

impl RecoveryTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sid; false when it was already recovered.
    pub fn record(&mut self, sid: OrderSid) -> bool {
        self.recovered_sids.insert(sid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.recovered_sids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recovered_sids.is_empty()
    }

    pub fn clear(&mut self) {
        self.recovered_sids.clear();
    }
}

/// Build a best-effort request for an order whose original request was
/// lost across restart. Order type and time-in-force are guesses; the
/// deadline is unbounded so nothing downstream times it out.
#[must_use]
pub fn reconstruct_request(
    order_sid: OrderSid,
    instrument_sid: InstrumentSid,
    side: Side,
    price: Price,
    leaves_qty: Qty,
    cumulative_qty: Qty,
) -> NewOrderRequest {
    NewOrderRequest {
        client_key: ClientKey::NULL,
        order_sid,
        instrument_sid,
        side,
        order_type: OrderType::Limit,
        tif: TimeInForce::Day,
        limit_price: price,
        quantity: Qty::new(cumulative_qty.value() + leaves_qty.value()),
        deadline_ns: u64::MAX,
        retry: false,
        throttle_domain: 0,
        num_throttles_required: NUM_THROTTLES_PER_ORDER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_sid_rejected() {
        let mut tracker = RecoveryTracker::new();
        assert!(tracker.record(OrderSid::new(1)));
        assert!(!tracker.record(OrderSid::new(1)));
        assert_eq!(tracker.len(), 1);

        tracker.clear();
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_reconstruction_sums_quantities() {
        let request = reconstruct_request(
            OrderSid::new(9),
            InstrumentSid::new(700),
            Side::Buy,
            Price::new(100),
            Qty::new(600),
            Qty::new(400),
        );
        assert_eq!(request.quantity, Qty::new(1000));
        assert_eq!(request.client_key, ClientKey::NULL);
        assert_eq!(request.notional(), 100_000);
    }
}
