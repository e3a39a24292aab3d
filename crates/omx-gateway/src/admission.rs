//! Admission control: exposure, crossing and position checks.
//!
//! A request is admitted by reserving eagerly (exposure decremented,
//! resting level counted) and queueing for dispatch. Every rejection
//! path completes the request back to the caller without touching
//! state beyond the check itself. The dispatch-outcome handler reverses
//! reservations for requests that terminate before the exchange ever
//! saw them.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use omx_core::{
    clock, notional, CancelOrderRequest, ClientKey, CompletionType, InstrumentSid,
    NewOrderRequest, OrderRequest, OrderRequestCompletion, OrderSid, OrderType, Price, Qty,
    RejectType, Side, TimeInForce, NUM_THROTTLES_PER_ORDER,
};
use omx_executor::{CompletionHandler, EnqueueResult, RequestQueue};
use omx_registry::{InstrumentDirectory, OrderRequestRegistry};
use omx_reconcile::CompletionSink;
use omx_risk::Exposure;

/// New-order intent from a strategy.
#[derive(Debug, Clone)]
pub struct NewOrderInstruction {
    pub client_key: ClientKey,
    pub instrument_sid: InstrumentSid,
    pub order_type: OrderType,
    pub side: Side,
    pub quantity: Qty,
    pub tif: TimeInForce,
    pub limit_price: Price,
    /// Stop price; carried for the wire but not supported by
    /// admission (stop orders cannot be price-validated).
    pub stop_price: Option<Price>,
    /// Request deadline relative to now, in milliseconds. None uses
    /// the configured default.
    pub timeout_ms: Option<u64>,
    /// Whether the dispatcher may wait for a throttle token.
    pub retry: bool,
    pub throttle_domain: usize,
}

/// Cancel intent from a strategy.
#[derive(Debug, Clone)]
pub struct CancelOrderInstruction {
    pub client_key: ClientKey,
    pub order_sid_to_cancel: OrderSid,
    /// Instrument and side, used when `force` cancels an order whose
    /// local context no longer exists.
    pub instrument_sid: InstrumentSid,
    pub side: Side,
    /// Permit cancelling an order without a local request.
    pub force: bool,
}

/// Admission knobs, a slice of the gateway configuration.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub default_timeout_ms: u64,
    pub avoid_multiple_cancels: bool,
}

/// Performs pre-trade checks and hands admitted requests to the
/// dispatcher queue. Runs on the caller's thread.
pub struct AdmissionController {
    registry: Arc<OrderRequestRegistry>,
    instruments: Arc<InstrumentDirectory>,
    exposure: Arc<Exposure>,
    queue: Arc<RequestQueue>,
    completions: Arc<dyn CompletionSink>,
    config: AdmissionConfig,
}

impl AdmissionController {
    #[must_use]
    pub fn new(
        registry: Arc<OrderRequestRegistry>,
        instruments: Arc<InstrumentDirectory>,
        exposure: Arc<Exposure>,
        queue: Arc<RequestQueue>,
        completions: Arc<dyn CompletionSink>,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            registry,
            instruments,
            exposure,
            queue,
            completions,
            config,
        }
    }

    fn complete(
        &self,
        client_key: ClientKey,
        order_sid: OrderSid,
        completion_type: CompletionType,
        reject_type: Option<RejectType>,
        reason: &str,
    ) {
        self.completions.send(OrderRequestCompletion::of(
            client_key,
            order_sid,
            completion_type,
            reject_type,
            reason,
        ));
    }

    /// Admit a new order: throttle-domain check, exposure, crossing and
    /// position, then queue for dispatch. Returns the assigned sid; the
    /// outcome arrives as a completion.
    pub fn submit_new_order(&self, instruction: NewOrderInstruction) -> OrderSid {
        let order_sid = self.registry.next_order_sid();
        let client_key = instruction.client_key;

        if instruction.order_type != OrderType::Limit {
            self.complete(
                client_key,
                order_sid,
                CompletionType::RejectedInternally,
                Some(RejectType::UnsupportedOperation),
                "only limit orders are supported",
            );
            return order_sid;
        }

        let state = self.instruments.get_or_create(instruction.instrument_sid);

        // Underlying-level throttle, checked before any reservation.
        if instruction.side == Side::Buy {
            if let Some(tracker) = state.underlying_throttle() {
                if !tracker.try_acquire(1) {
                    trace!(
                        instrument_sid = %instruction.instrument_sid,
                        "Order exceeds underlying throttle"
                    );
                    self.complete(
                        client_key,
                        order_sid,
                        CompletionType::RejectedInternally,
                        Some(RejectType::ExceedUnderlyingThrottle),
                        "",
                    );
                    return order_sid;
                }
            }
        }

        let price = instruction.limit_price;
        let quantity = instruction.quantity;
        {
            let mut book = state.book().lock();
            match instruction.side {
                Side::Buy => {
                    let order_notional = notional(price, quantity);
                    if !self.exposure.ok_to_buy(order_notional) {
                        trace!(
                            instrument_sid = %instruction.instrument_sid,
                            %price,
                            %quantity,
                            order_notional,
                            purchasing_power = self.exposure.purchasing_power(),
                            "Order exceeds purchasing power"
                        );
                        self.complete(
                            client_key,
                            order_sid,
                            CompletionType::Rejected,
                            Some(RejectType::OrderExceedPurchasingPower),
                            "",
                        );
                        return order_sid;
                    }
                    if let Err(reject_type) = book.is_new_buy_order_ok(price, quantity) {
                        self.complete(
                            client_key,
                            order_sid,
                            CompletionType::Failed,
                            Some(reject_type),
                            "",
                        );
                        return order_sid;
                    }
                    self.exposure.dec_purchasing_power(order_notional);
                    book.new_buy_order(price);
                }
                Side::Sell => {
                    if let Err(reject_type) = book.is_new_sell_order_ok(price, quantity) {
                        self.complete(
                            client_key,
                            order_sid,
                            CompletionType::Failed,
                            Some(reject_type),
                            "",
                        );
                        return order_sid;
                    }
                    book.new_sell_order(price, quantity);
                }
            }
        }

        let timeout_ms = instruction
            .timeout_ms
            .unwrap_or(self.config.default_timeout_ms);
        let request = NewOrderRequest {
            client_key,
            order_sid,
            instrument_sid: instruction.instrument_sid,
            side: instruction.side,
            order_type: instruction.order_type,
            tif: instruction.tif,
            limit_price: price,
            quantity,
            deadline_ns: clock::monotonic_ns() + timeout_ms.saturating_mul(1_000_000),
            retry: instruction.retry,
            throttle_domain: instruction.throttle_domain,
            num_throttles_required: NUM_THROTTLES_PER_ORDER,
        };
        self.registry.put(OrderRequest::New(request.clone()));

        if self.queue.push(OrderRequest::New(request)) == EnqueueResult::QueueFull {
            self.fail_before_dispatch(order_sid, CompletionType::Failed, "dispatch queue full");
        }
        order_sid
    }

    /// Admit a cancel for `order_sid_to_cancel`.
    pub fn submit_cancel_order(&self, instruction: CancelOrderInstruction) -> OrderSid {
        let order_sid = self.registry.next_order_sid();
        let client_key = instruction.client_key;
        let target = instruction.order_sid_to_cancel;

        if self.config.avoid_multiple_cancels
            && !self.registry.try_mark_pending_cancel(target, client_key)
        {
            self.complete(
                client_key,
                order_sid,
                CompletionType::AlreadyInPendingCancel,
                Some(RejectType::Other),
                "",
            );
            return order_sid;
        }

        let (instrument_sid, side) = match self.registry.get(target) {
            Some(original) => (original.instrument_sid(), original.side()),
            None if instruction.force => (instruction.instrument_sid, instruction.side),
            None => {
                warn!(
                    target_order_sid = %target,
                    "Cannot cancel an order that no longer exists"
                );
                self.registry.clear_pending_cancel(target);
                self.complete(
                    client_key,
                    order_sid,
                    CompletionType::RejectedInternally,
                    Some(RejectType::UnknownOrder),
                    "",
                );
                return order_sid;
            }
        };

        let request = CancelOrderRequest {
            client_key,
            order_sid,
            target_order_sid: target,
            instrument_sid,
            side,
            force: instruction.force,
            deadline_ns: clock::monotonic_ns()
                + self.config.default_timeout_ms.saturating_mul(1_000_000),
            throttle_domain: 0,
            num_throttles_required: NUM_THROTTLES_PER_ORDER,
        };
        self.registry.put(OrderRequest::Cancel(request.clone()));
        self.registry.put_cancel_mapping(target, order_sid);

        if self.queue.push(OrderRequest::Cancel(request)) == EnqueueResult::QueueFull {
            self.fail_before_dispatch(order_sid, CompletionType::Failed, "dispatch queue full");
        }
        order_sid
    }

    /// A request terminated before the exchange ever saw it: undo the
    /// admission reservation and complete.
    fn fail_before_dispatch(&self, order_sid: OrderSid, completion_type: CompletionType, reason: &str) {
        debug_assert!(completion_type.reverses_admission());
        let Some(request) = self.registry.remove(order_sid) else {
            warn!(
                order_sid = %order_sid,
                "Trying to complete an order request that no longer exists"
            );
            return;
        };
        match &request {
            OrderRequest::New(new_request) => {
                let state = self.instruments.get_or_create(new_request.instrument_sid);
                let mut book = state.book().lock();
                // Never sent: the full quantity comes back.
                match new_request.side {
                    Side::Buy => {
                        self.exposure.inc_purchasing_power(new_request.notional());
                        book.buy_order_rejected(new_request.limit_price);
                    }
                    Side::Sell => {
                        book.sell_order_rejected(new_request.limit_price, new_request.quantity);
                    }
                }
            }
            OrderRequest::Cancel(cancel_request) => {
                self.registry
                    .remove_cancel_mapping(cancel_request.target_order_sid);
                self.registry
                    .clear_pending_cancel(cancel_request.target_order_sid);
            }
        }
        self.complete(request.client_key(), order_sid, completion_type, None, reason);
    }
}

/// Receives dispatch outcomes from the executor thread. Timeouts,
/// throttles and send failures never reached the exchange, so the
/// reservation is reversed here; sent requests stay reserved until the
/// exchange answers.
pub struct DispatchCompletions {
    admission: Arc<AdmissionController>,
}

impl DispatchCompletions {
    #[must_use]
    pub fn new(admission: Arc<AdmissionController>) -> Self {
        Self { admission }
    }
}

impl CompletionHandler for DispatchCompletions {
    fn timeout(&self, request: &OrderRequest) {
        self.admission
            .fail_before_dispatch(request.order_sid(), CompletionType::Timeout, "");
    }

    fn throttled(&self, request: &OrderRequest) {
        self.admission
            .fail_before_dispatch(request.order_sid(), CompletionType::Throttled, "");
    }

    fn timeout_after_throttled(&self, request: &OrderRequest) {
        self.admission.fail_before_dispatch(
            request.order_sid(),
            CompletionType::ThrottledThenTimeout,
            "",
        );
    }

    fn sent_to_exchange(&self, request: &OrderRequest, sent_at_ns: u64) {
        debug!(
            order_sid = %request.order_sid(),
            sent_at_ns,
            "Request sent to exchange"
        );
    }

    fn fail(&self, request: &OrderRequest, reason: &str) {
        self.admission
            .fail_before_dispatch(request.order_sid(), CompletionType::Failed, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    const INSTRUMENT: InstrumentSid = InstrumentSid(700);
    const EXPOSURE: i64 = 1_000_000;

    #[derive(Default)]
    struct RecordingSink {
        completions: Mutex<Vec<OrderRequestCompletion>>,
    }

    impl RecordingSink {
        fn completions(&self) -> Vec<OrderRequestCompletion> {
            self.completions.lock().clone()
        }

        fn last(&self) -> OrderRequestCompletion {
            self.completions.lock().last().cloned().unwrap()
        }
    }

    impl CompletionSink for RecordingSink {
        fn send(&self, completion: OrderRequestCompletion) {
            self.completions.lock().push(completion);
        }
    }

    struct Fixture {
        admission: Arc<AdmissionController>,
        registry: Arc<OrderRequestRegistry>,
        instruments: Arc<InstrumentDirectory>,
        exposure: Arc<Exposure>,
        queue: Arc<RequestQueue>,
        sink: Arc<RecordingSink>,
    }

    fn fixture_with(underlying: Option<omx_risk::ThrottleTracker>) -> Fixture {
        let registry = Arc::new(OrderRequestRegistry::new(100));
        let instruments = Arc::new(InstrumentDirectory::new(
            4,
            underlying.map(Arc::new),
        ));
        let exposure = Arc::new(Exposure::new(EXPOSURE));
        let queue = Arc::new(RequestQueue::new(16));
        let sink = Arc::new(RecordingSink::default());
        let admission = Arc::new(AdmissionController::new(
            Arc::clone(&registry),
            Arc::clone(&instruments),
            Arc::clone(&exposure),
            Arc::clone(&queue),
            sink.clone(),
            AdmissionConfig {
                default_timeout_ms: 5_000,
                avoid_multiple_cancels: true,
            },
        ));
        Fixture {
            admission,
            registry,
            instruments,
            exposure,
            queue,
            sink,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(None)
    }

    fn buy(price: i64, qty: i64) -> NewOrderInstruction {
        NewOrderInstruction {
            client_key: ClientKey::new(7),
            instrument_sid: INSTRUMENT,
            order_type: OrderType::Limit,
            side: Side::Buy,
            quantity: Qty::new(qty),
            tif: TimeInForce::Day,
            limit_price: Price::new(price),
            stop_price: None,
            timeout_ms: None,
            retry: false,
            throttle_domain: 0,
        }
    }

    fn sell(price: i64, qty: i64) -> NewOrderInstruction {
        NewOrderInstruction {
            side: Side::Sell,
            ..buy(price, qty)
        }
    }

    #[test]
    fn test_buy_reserves_exposure_and_level() {
        let f = fixture();
        let sid = f.admission.submit_new_order(buy(100, 1000));

        assert_eq!(f.exposure.purchasing_power(), EXPOSURE - 100_000);
        assert_eq!(f.queue.len(), 1);
        assert!(f.registry.contains(sid));
        assert!(f.sink.completions().is_empty());
        let state = f.instruments.get_or_create(INSTRUMENT);
        assert_eq!(state.book().lock().best_bid(), Some(Price::new(100)));
    }

    #[test]
    fn test_buy_exceeding_purchasing_power_rejected() {
        let f = fixture();
        let sid = f.admission.submit_new_order(buy(2_000, 1000));

        assert_eq!(f.exposure.purchasing_power(), EXPOSURE);
        assert!(f.queue.is_empty());
        assert!(!f.registry.contains(sid));
        let completion = f.sink.last();
        assert_eq!(completion.completion_type, CompletionType::Rejected);
        assert_eq!(
            completion.reject_type,
            Some(RejectType::OrderExceedPurchasingPower)
        );
    }

    #[test]
    fn test_buy_crossing_resting_sell_rejected() {
        let f = fixture();
        // Seed a long position so the sell admits.
        f.instruments
            .get_or_create(INSTRUMENT)
            .book()
            .lock()
            .add_existing_position(Qty::new(100));
        f.admission.submit_new_order(sell(100, 100));

        for crossing_price in [100, 101] {
            f.admission.submit_new_order(buy(crossing_price, 10));
            let completion = f.sink.last();
            assert_eq!(completion.completion_type, CompletionType::Failed);
            assert_eq!(completion.reject_type, Some(RejectType::Crossed));
        }
        // Exposure untouched by the rejected buys.
        assert_eq!(f.exposure.purchasing_power(), EXPOSURE);
    }

    #[test]
    fn test_sell_without_position_rejected() {
        let f = fixture();
        f.admission.submit_new_order(sell(100, 10));
        let completion = f.sink.last();
        assert_eq!(completion.completion_type, CompletionType::Failed);
        assert_eq!(
            completion.reject_type,
            Some(RejectType::InsufficientLongPosition)
        );
    }

    #[test]
    fn test_market_order_rejected_internally() {
        let f = fixture();
        f.admission.submit_new_order(NewOrderInstruction {
            order_type: OrderType::Market,
            ..buy(100, 10)
        });
        let completion = f.sink.last();
        assert_eq!(completion.completion_type, CompletionType::RejectedInternally);
        assert_eq!(
            completion.reject_type,
            Some(RejectType::UnsupportedOperation)
        );
    }

    #[test]
    fn test_underlying_throttle_rejects_before_reservation() {
        let f = fixture_with(Some(
            omx_risk::ThrottleTracker::new(1, 60_000_000_000).unwrap(),
        ));
        f.admission.submit_new_order(buy(100, 10));
        assert_eq!(f.exposure.purchasing_power(), EXPOSURE - 1_000);

        // Second buy within the window exceeds the underlying budget.
        f.admission.submit_new_order(buy(100, 10));
        let completion = f.sink.last();
        assert_eq!(
            completion.completion_type,
            CompletionType::RejectedInternally
        );
        assert_eq!(
            completion.reject_type,
            Some(RejectType::ExceedUnderlyingThrottle)
        );
        assert_eq!(f.exposure.purchasing_power(), EXPOSURE - 1_000);
    }

    #[test]
    fn test_cancel_of_known_order_queues() {
        let f = fixture();
        let target = f.admission.submit_new_order(buy(100, 10));
        let cancel_sid = f.admission.submit_cancel_order(CancelOrderInstruction {
            client_key: ClientKey::new(8),
            order_sid_to_cancel: target,
            instrument_sid: INSTRUMENT,
            side: Side::Buy,
            force: false,
        });

        assert_eq!(f.queue.len(), 2);
        assert_eq!(f.registry.cancel_sid_for(target), Some(cancel_sid));
    }

    #[test]
    fn test_duplicate_cancel_suppressed() {
        let f = fixture();
        let target = f.admission.submit_new_order(buy(100, 10));
        f.admission.submit_cancel_order(CancelOrderInstruction {
            client_key: ClientKey::new(8),
            order_sid_to_cancel: target,
            instrument_sid: INSTRUMENT,
            side: Side::Buy,
            force: false,
        });
        f.admission.submit_cancel_order(CancelOrderInstruction {
            client_key: ClientKey::new(9),
            order_sid_to_cancel: target,
            instrument_sid: INSTRUMENT,
            side: Side::Buy,
            force: false,
        });

        let completion = f.sink.last();
        assert_eq!(
            completion.completion_type,
            CompletionType::AlreadyInPendingCancel
        );
    }

    #[test]
    fn test_cancel_of_unknown_order_requires_force() {
        let f = fixture();
        f.admission.submit_cancel_order(CancelOrderInstruction {
            client_key: ClientKey::new(8),
            order_sid_to_cancel: OrderSid::new(424242),
            instrument_sid: INSTRUMENT,
            side: Side::Buy,
            force: false,
        });
        let completion = f.sink.last();
        assert_eq!(
            completion.completion_type,
            CompletionType::RejectedInternally
        );
        assert_eq!(completion.reject_type, Some(RejectType::UnknownOrder));

        // With force the cancel is dispatched anyway.
        f.admission.submit_cancel_order(CancelOrderInstruction {
            client_key: ClientKey::new(8),
            order_sid_to_cancel: OrderSid::new(424242),
            instrument_sid: INSTRUMENT,
            side: Side::Buy,
            force: true,
        });
        assert_eq!(f.queue.len(), 1);
    }

    #[test]
    fn test_dispatch_timeout_reverses_reservation() {
        let f = fixture();
        let sid = f.admission.submit_new_order(buy(100, 1000));
        assert_eq!(f.exposure.purchasing_power(), EXPOSURE - 100_000);

        let handler = DispatchCompletions::new(Arc::clone(&f.admission));
        let request = f.registry.get(sid).unwrap();
        handler.timeout(&request);

        assert_eq!(f.exposure.purchasing_power(), EXPOSURE);
        assert!(!f.registry.contains(sid));
        let state = f.instruments.get_or_create(INSTRUMENT);
        assert!(state.book().lock().is_clear());
        let completion = f.sink.last();
        assert_eq!(completion.completion_type, CompletionType::Timeout);
    }

    #[test]
    fn test_dispatch_throttled_cancel_clears_side_maps() {
        let f = fixture();
        let target = f.admission.submit_new_order(buy(100, 10));
        let cancel_sid = f.admission.submit_cancel_order(CancelOrderInstruction {
            client_key: ClientKey::new(8),
            order_sid_to_cancel: target,
            instrument_sid: INSTRUMENT,
            side: Side::Buy,
            force: false,
        });

        let handler = DispatchCompletions::new(Arc::clone(&f.admission));
        let cancel_request = f.registry.get(cancel_sid).unwrap();
        handler.throttled(&cancel_request);

        assert_eq!(f.registry.cancel_sid_for(target), None);
        // A fresh cancel for the same order is admitted again.
        f.admission.submit_cancel_order(CancelOrderInstruction {
            client_key: ClientKey::new(9),
            order_sid_to_cancel: target,
            instrument_sid: INSTRUMENT,
            side: Side::Buy,
            force: false,
        });
        assert_ne!(
            f.sink.last().completion_type,
            CompletionType::AlreadyInPendingCancel
        );
    }

    #[test]
    fn test_sent_to_exchange_keeps_reservation() {
        let f = fixture();
        let sid = f.admission.submit_new_order(buy(100, 1000));
        let handler = DispatchCompletions::new(Arc::clone(&f.admission));
        let request = f.registry.get(sid).unwrap();
        handler.sent_to_exchange(&request, 1);

        assert_eq!(f.exposure.purchasing_power(), EXPOSURE - 100_000);
        assert!(f.registry.contains(sid));
    }
}
