//! The authoritative map from order sid to in-flight request.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use tracing::warn;

use omx_core::{ClientKey, OrderRequest, OrderSid};

/// Default first order sid handed out by a fresh registry.
pub const START_ORDER_SID_SEQUENCE: u32 = 3_000_000;

/// Shared request registry.
///
/// Lookups are frequent, erasure rare; a concurrent hash map fits the
/// access pattern better than a lock around a plain map. Discipline:
/// the admission thread inserts, the reconciliation thread mutates and
/// removes, no compound invariant spans two entries.
#[derive(Debug)]
pub struct OrderRequestRegistry {
    requests: DashMap<OrderSid, OrderRequest>,
    /// Cancel-target sid → the cancel request's own sid. Resolves the
    /// ambiguity of a cancel acknowledgment (explicit cancel vs
    /// unsolicited exchange-side cancel).
    cancel_sid_by_target: DashMap<OrderSid, OrderSid>,
    /// Orders with a cancel currently in flight, to suppress duplicate
    /// cancels for the same target.
    pending_cancel_by_target: DashMap<OrderSid, ClientKey>,
    start_sequence: u32,
    next_order_sid: AtomicU32,
    /// Highest order sid observed in execution reports (recovery).
    latest_seen_sid: AtomicU32,
}

impl OrderRequestRegistry {
    #[must_use]
    pub fn new(start_sequence: u32) -> Self {
        Self {
            requests: DashMap::new(),
            cancel_sid_by_target: DashMap::new(),
            pending_cancel_by_target: DashMap::new(),
            start_sequence,
            next_order_sid: AtomicU32::new(start_sequence),
            latest_seen_sid: AtomicU32::new(0),
        }
    }

    /// Allocate the next order sid.
    pub fn next_order_sid(&self) -> OrderSid {
        OrderSid::new(self.next_order_sid.fetch_add(1, Ordering::AcqRel))
    }

    /// Record an order sid seen in an execution report, so the
    /// generator can resume above it after recovery.
    pub fn observe_order_sid(&self, sid: OrderSid) {
        self.latest_seen_sid.fetch_max(sid.value(), Ordering::AcqRel);
    }

    #[must_use]
    pub fn latest_seen_sid(&self) -> u32 {
        self.latest_seen_sid.load(Ordering::Acquire)
    }

    /// Floor the generator at `max(start_sequence, latest_seen + 1)`;
    /// called on recovery exit.
    pub fn resume_sid_generator(&self) {
        let floor = self
            .start_sequence
            .max(self.latest_seen_sid().saturating_add(1));
        self.next_order_sid.fetch_max(floor, Ordering::AcqRel);
    }

    pub fn put(&self, request: OrderRequest) {
        let sid = request.order_sid();
        if self.requests.insert(sid, request).is_some() {
            warn!(order_sid = %sid, "Replaced an existing order request in registry");
        }
    }

    #[must_use]
    pub fn get(&self, sid: OrderSid) -> Option<OrderRequest> {
        self.requests.get(&sid).map(|r| r.clone())
    }

    #[must_use]
    pub fn contains(&self, sid: OrderSid) -> bool {
        self.requests.contains_key(&sid)
    }

    pub fn remove(&self, sid: OrderSid) -> Option<OrderRequest> {
        self.requests.remove(&sid).map(|(_, r)| r)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    // ------------------------------------------------------------------
    // Cancel side-maps
    // ------------------------------------------------------------------

    pub fn put_cancel_mapping(&self, target: OrderSid, cancel_sid: OrderSid) {
        self.cancel_sid_by_target.insert(target, cancel_sid);
    }

    #[must_use]
    pub fn cancel_sid_for(&self, target: OrderSid) -> Option<OrderSid> {
        self.cancel_sid_by_target.get(&target).map(|v| *v)
    }

    pub fn remove_cancel_mapping(&self, target: OrderSid) -> Option<OrderSid> {
        self.cancel_sid_by_target.remove(&target).map(|(_, v)| v)
    }

    /// Mark `target` as having a cancel in flight. Returns false when
    /// one is already pending.
    pub fn try_mark_pending_cancel(&self, target: OrderSid, client_key: ClientKey) -> bool {
        match self.pending_cancel_by_target.entry(target) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(client_key);
                true
            }
        }
    }

    pub fn clear_pending_cancel(&self, target: OrderSid) {
        self.pending_cancel_by_target.remove(&target);
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    pub fn clear(&self) {
        self.requests.clear();
        self.cancel_sid_by_target.clear();
        self.pending_cancel_by_target.clear();
        self.next_order_sid
            .store(self.start_sequence, Ordering::Release);
        self.latest_seen_sid.store(0, Ordering::Release);
    }

    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.requests.is_empty()
            && self.cancel_sid_by_target.is_empty()
            && self.pending_cancel_by_target.is_empty()
            && self.next_order_sid.load(Ordering::Acquire) == self.start_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omx_core::{
        InstrumentSid, NewOrderRequest, OrderType, Price, Qty, Side, TimeInForce,
        NUM_THROTTLES_PER_ORDER,
    };

    fn sample_request(sid: OrderSid) -> OrderRequest {
        OrderRequest::New(NewOrderRequest {
            client_key: ClientKey::new(1),
            order_sid: sid,
            instrument_sid: InstrumentSid::new(700),
            side: Side::Buy,
            order_type: OrderType::Limit,
            tif: TimeInForce::Day,
            limit_price: Price::new(100),
            quantity: Qty::new(10),
            deadline_ns: u64::MAX,
            retry: false,
            throttle_domain: 0,
            num_throttles_required: NUM_THROTTLES_PER_ORDER,
        })
    }

    #[test]
    fn test_sid_generation_monotonic() {
        let registry = OrderRequestRegistry::new(100);
        assert_eq!(registry.next_order_sid(), OrderSid::new(100));
        assert_eq!(registry.next_order_sid(), OrderSid::new(101));
    }

    #[test]
    fn test_put_get_remove() {
        let registry = OrderRequestRegistry::new(1);
        let sid = registry.next_order_sid();
        registry.put(sample_request(sid));

        assert!(registry.contains(sid));
        assert_eq!(registry.get(sid).unwrap().order_sid(), sid);

        let removed = registry.remove(sid).unwrap();
        assert_eq!(removed.order_sid(), sid);
        assert!(registry.get(sid).is_none());
    }

    #[test]
    fn test_resume_sid_generator_after_recovery() {
        let registry = OrderRequestRegistry::new(100);
        registry.observe_order_sid(OrderSid::new(250));
        registry.observe_order_sid(OrderSid::new(180));
        assert_eq!(registry.latest_seen_sid(), 250);

        registry.resume_sid_generator();
        assert_eq!(registry.next_order_sid(), OrderSid::new(251));
    }

    #[test]
    fn test_resume_keeps_start_floor() {
        let registry = OrderRequestRegistry::new(100);
        registry.observe_order_sid(OrderSid::new(5));
        registry.resume_sid_generator();
        assert_eq!(registry.next_order_sid(), OrderSid::new(100));
    }

    #[test]
    fn test_pending_cancel_marking() {
        let registry = OrderRequestRegistry::new(1);
        let target = OrderSid::new(42);
        assert!(registry.try_mark_pending_cancel(target, ClientKey::new(9)));
        assert!(!registry.try_mark_pending_cancel(target, ClientKey::new(10)));
        registry.clear_pending_cancel(target);
        assert!(registry.try_mark_pending_cancel(target, ClientKey::new(11)));
    }

    #[test]
    fn test_clear_and_is_clear() {
        let registry = OrderRequestRegistry::new(7);
        let sid = registry.next_order_sid();
        registry.put(sample_request(sid));
        registry.put_cancel_mapping(OrderSid::new(1), OrderSid::new(2));
        assert!(!registry.is_clear());

        registry.clear();
        assert!(registry.is_clear());
        assert_eq!(registry.next_order_sid(), OrderSid::new(7));
    }
}
