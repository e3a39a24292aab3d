//! Manager of all order contexts.
//!
//! All updates are driven by execution reports from the exchange-facing
//! engine. Reports may arrive out of submission order, may be the first
//! evidence of an order that was never locally materialized, and may
//! reference an order whose context has already been archived; the
//! handlers tolerate all three. Admission reservations are reversed
//! exactly once per terminal transition using the reset-quantity rule.
//!
//! Thread safety: one consumer thread drives `handle`; the short
//! internal locks cover lifecycle-phase crossings, not concurrent
//! reconciliation.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use omx_core::{
    clock, notional, CompletionType, ExecutionReport, Order, OrderAccepted, OrderAmendRejected,
    OrderCancelRejected, OrderCancelled, OrderExpired, OrderRejected, OrderRequest, OrderSid,
    OrderStatus, OrderUpdate, OrderUpdateKind, Qty, RejectType, Side, TradeCancelled, TradeCreated,
    TradeSid,
};
use omx_core::{NewOrderRequest, OrderRequestCompletion};
use omx_registry::{InstrumentDirectory, OrderRequestRegistry};
use omx_risk::Exposure;

use crate::context::OrderContext;
use crate::recovery::{reconstruct_request, RecoveryTracker};
use crate::seams::{CompletionSink, UpdateDistributor};

/// First trade sid handed out by a fresh manager.
pub const START_TRADE_SID_SEQUENCE: u32 = 6_000_000;

/// Reconciliation operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReconcileMode {
    /// Normal reconciliation: completions flow back to originators.
    Normal = 0,
    /// Recovery: the recovery listener runs before every handler and
    /// request completions are suppressed.
    Recovery = 1,
}

/// Which terminal non-fill transition is reversing a reservation.
#[derive(Debug, Clone, Copy)]
enum TerminalKind {
    Rejected,
    Cancelled,
    Expired,
}

/// Consumes execution reports and reconciles them into per-order state.
pub struct OrderContextManager {
    /// One arena for active and archived contexts, keyed by order sid.
    contexts: Mutex<HashMap<OrderSid, OrderContext>>,
    registry: Arc<OrderRequestRegistry>,
    instruments: Arc<InstrumentDirectory>,
    exposure: Arc<Exposure>,
    distributor: Arc<dyn UpdateDistributor>,
    completions: Arc<dyn CompletionSink>,
    mode: AtomicU8,
    recovery: Mutex<RecoveryTracker>,
    next_trade_sid: AtomicU32,
    /// When recovery last adjusted exposure (Unix milliseconds).
    exposure_recovered_at_ms: AtomicU64,
}

impl OrderContextManager {
    #[must_use]
    pub fn new(
        registry: Arc<OrderRequestRegistry>,
        instruments: Arc<InstrumentDirectory>,
        exposure: Arc<Exposure>,
        distributor: Arc<dyn UpdateDistributor>,
        completions: Arc<dyn CompletionSink>,
    ) -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
            registry,
            instruments,
            exposure,
            distributor,
            completions,
            mode: AtomicU8::new(ReconcileMode::Normal as u8),
            recovery: Mutex::new(RecoveryTracker::new()),
            next_trade_sid: AtomicU32::new(START_TRADE_SID_SEQUENCE),
            exposure_recovered_at_ms: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn mode(&self) -> ReconcileMode {
        if self.mode.load(Ordering::Acquire) == ReconcileMode::Recovery as u8 {
            ReconcileMode::Recovery
        } else {
            ReconcileMode::Normal
        }
    }

    pub fn recover(&self) {
        info!("Change to recovery");
        self.mode
            .store(ReconcileMode::Recovery as u8, Ordering::Release);
    }

    pub fn activate(&self) {
        info!("Change to active");
        self.mode
            .store(ReconcileMode::Normal as u8, Ordering::Release);
    }

    pub fn warmup(&self) {
        info!("Change to warmup");
    }

    #[must_use]
    pub fn exposure_recovered_at_ms(&self) -> u64 {
        self.exposure_recovered_at_ms.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn context_count(&self) -> usize {
        self.contexts.lock().len()
    }

    /// Dispatch one report to its handler.
    pub fn handle(&self, report: ExecutionReport) {
        match report {
            ExecutionReport::Accepted(r) => self.receive_accepted(r),
            ExecutionReport::Rejected(r) => self.receive_rejected(r),
            ExecutionReport::Cancelled(r) => self.receive_cancelled(r),
            ExecutionReport::Expired(r) => self.receive_expired(r),
            ExecutionReport::CancelRejected(r) => self.receive_cancel_rejected(r),
            ExecutionReport::AmendRejected(r) => self.receive_amend_rejected(r),
            ExecutionReport::TradeCreated(r) => self.receive_trade_created(r),
            ExecutionReport::TradeCancelled(r) => self.receive_trade_cancelled(r),
        }
    }

    fn complete(&self, completion: OrderRequestCompletion) {
        // The recovery listener owns the stream while recovering; no
        // originator is waiting on reconstructed requests.
        if self.mode() == ReconcileMode::Normal {
            self.completions.send(completion);
        }
    }

    fn publish(&self, context: &OrderContext, kind: OrderUpdateKind, snapshot: Option<Order>) {
        let channel = context.channel();
        self.distributor.publish(OrderUpdate {
            channel_id: channel.id(),
            channel_seq: channel.next_seq(),
            order_sid: context.order.order_sid,
            kind,
            snapshot,
        });
    }

    /// Reverse the admission reservation of `request` by its reset
    /// quantity, given the terminal report's cumulative quantity.
    fn reverse_reservation(
        &self,
        request: &NewOrderRequest,
        cumulative_qty: Qty,
        kind: TerminalKind,
    ) {
        let reset_qty = Qty::new(request.quantity.value() - cumulative_qty.value());
        let state = self.instruments.get_or_create(request.instrument_sid);
        let mut book = state.book().lock();
        match request.side {
            Side::Buy => {
                self.exposure
                    .inc_purchasing_power(notional(request.limit_price, reset_qty));
                match kind {
                    TerminalKind::Rejected => book.buy_order_rejected(request.limit_price),
                    TerminalKind::Cancelled => book.buy_order_cancelled(request.limit_price),
                    TerminalKind::Expired => book.buy_order_expired(request.limit_price),
                }
            }
            Side::Sell => match kind {
                TerminalKind::Rejected => book.sell_order_rejected(request.limit_price, reset_qty),
                TerminalKind::Cancelled => {
                    book.sell_order_cancelled(request.limit_price, reset_qty)
                }
                TerminalKind::Expired => book.sell_order_expired(request.limit_price, reset_qty),
            },
        }
    }

    fn order_from_request(&self, request: &NewOrderRequest, now_ms: u64) -> Order {
        Order::new(
            request.order_sid,
            request.instrument_sid,
            request.side,
            request.order_type,
            request.tif,
            request.limit_price,
            request.quantity,
            now_ms,
        )
    }

    fn new_context(&self, request: &NewOrderRequest, now_ms: u64) -> OrderContext {
        let state = self.instruments.get_or_create(request.instrument_sid);
        OrderContext::new(
            self.order_from_request(request, now_ms),
            Arc::clone(state.channel()),
        )
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    fn receive_accepted(&self, accepted: OrderAccepted) {
        let order_sid = accepted.order_sid;
        self.registry.observe_order_sid(order_sid);
        if self.mode() == ReconcileMode::Recovery {
            self.recover_accepted(&accepted);
        }

        let mut contexts = self.contexts.lock();
        match contexts.entry(order_sid) {
            Entry::Occupied(mut entry) => {
                let context = entry.get_mut();
                if context.is_archived() {
                    error!(
                        order_sid = %order_sid,
                        "Received order accepted for an archived order"
                    );
                    return;
                }
                // Not the first evidence: mutate in place, delta only.
                context.order.updated_at = accepted.transact_ms;
                self.publish(context, OrderUpdateKind::Accepted, None);
            }
            Entry::Vacant(entry) => {
                let Some(request) = self.registry.get(order_sid) else {
                    error!(
                        order_sid = %order_sid,
                        "Received order accepted for an unknown request"
                    );
                    return;
                };
                let Some(new_request) = request.as_new() else {
                    error!(order_sid = %order_sid, "Order accepted for a cancel request");
                    return;
                };
                self.complete(OrderRequestCompletion::ok(request.client_key(), order_sid));

                let context = self.new_context(new_request, accepted.transact_ms);
                let snapshot = context.order.clone();
                self.publish(&context, OrderUpdateKind::Accepted, Some(snapshot));
                entry.insert(context);
            }
        }
    }

    fn receive_rejected(&self, rejected: OrderRejected) {
        let order_sid = rejected.order_sid;
        self.registry.observe_order_sid(order_sid);
        if self.mode() == ReconcileMode::Recovery && !self.recover_rejected(&rejected) {
            return;
        }

        let request = self.registry.remove(order_sid);
        match &request {
            Some(req) => {
                self.complete(OrderRequestCompletion::of(
                    req.client_key(),
                    order_sid,
                    CompletionType::Rejected,
                    Some(rejected.reject_type),
                    rejected.reason.clone(),
                ));
                if let Some(new_request) = req.as_new() {
                    self.reverse_reservation(
                        new_request,
                        rejected.cumulative_qty,
                        TerminalKind::Rejected,
                    );
                }
            }
            None => {
                error!(
                    order_sid = %order_sid,
                    "Received order rejected for an unknown request"
                );
            }
        }

        let kind = OrderUpdateKind::Rejected {
            reject_type: rejected.reject_type,
            reason: rejected.reason.clone(),
        };
        let mut contexts = self.contexts.lock();
        match contexts.entry(order_sid) {
            Entry::Occupied(mut entry) => {
                let context = entry.get_mut();
                if context.is_archived() {
                    error!(order_sid = %order_sid, "Order rejected for an archived order");
                    return;
                }
                context
                    .order
                    .terminate(OrderStatus::Rejected, rejected.cumulative_qty, rejected.transact_ms);
                context.order.reject_reason = Some(rejected.reason.clone());
                self.publish(context, kind, None);
                context.archive();
            }
            Entry::Vacant(vacant) => {
                let Some(new_request) = request.as_ref().and_then(|r| r.as_new()) else {
                    return;
                };
                let mut context = self.new_context(new_request, rejected.transact_ms);
                context.order.terminate(
                    OrderStatus::Rejected,
                    rejected.cumulative_qty,
                    rejected.transact_ms,
                );
                context.order.reject_reason = Some(rejected.reason.clone());
                let snapshot = context.order.clone();
                self.publish(&context, kind, Some(snapshot));
                context.archive();
                vacant.insert(context);
            }
        }
    }

    fn receive_cancelled(&self, cancelled: OrderCancelled) {
        let orig_sid = cancelled.orig_order_sid;
        self.registry.observe_order_sid(cancelled.order_sid);
        self.registry.observe_order_sid(orig_sid);

        // A cancel ack is ambiguous: explicit cancel request, or an
        // unsolicited exchange-side cancel. The side map decides which
        // completion is emitted.
        let cancel_sid = self.registry.remove_cancel_mapping(orig_sid);
        self.registry.clear_pending_cancel(orig_sid);
        if let Some(cancel_sid) = cancel_sid {
            if let Some(cancel_request) = self.registry.remove(cancel_sid) {
                self.complete(OrderRequestCompletion::ok(
                    cancel_request.client_key(),
                    cancel_sid,
                ));
            }
        }

        let request = self.registry.remove(orig_sid);
        match &request {
            Some(req) => {
                if let Some(new_request) = req.as_new() {
                    self.reverse_reservation(
                        new_request,
                        cancelled.cumulative_qty,
                        TerminalKind::Cancelled,
                    );
                }
            }
            None => {
                error!(
                    orig_order_sid = %orig_sid,
                    "Received cancelled for an order that does not exist"
                );
            }
        }

        let kind = OrderUpdateKind::Cancelled {
            cumulative_qty: cancelled.cumulative_qty,
        };
        let mut contexts = self.contexts.lock();
        match contexts.entry(orig_sid) {
            Entry::Occupied(mut entry) => {
                let context = entry.get_mut();
                if context.is_archived() {
                    error!(orig_order_sid = %orig_sid, "Order cancelled for an archived order");
                    return;
                }
                context.order.terminate(
                    OrderStatus::Cancelled,
                    cancelled.cumulative_qty,
                    cancelled.transact_ms,
                );
                self.publish(context, kind, None);
                context.archive();
            }
            Entry::Vacant(vacant) => {
                let Some(new_request) = request.as_ref().and_then(|r| r.as_new()) else {
                    return;
                };
                let mut context = self.new_context(new_request, cancelled.transact_ms);
                context.order.terminate(
                    OrderStatus::Cancelled,
                    cancelled.cumulative_qty,
                    cancelled.transact_ms,
                );
                let snapshot = context.order.clone();
                self.publish(&context, kind, Some(snapshot));
                context.archive();
                vacant.insert(context);
            }
        }
    }

    fn receive_expired(&self, expired: OrderExpired) {
        let order_sid = expired.order_sid;
        self.registry.observe_order_sid(order_sid);
        if self.mode() == ReconcileMode::Recovery {
            self.recover_expired(&expired);
        }

        let request = self.registry.remove(order_sid);
        if let Some(new_request) = request.as_ref().and_then(|r| r.as_new()) {
            self.reverse_reservation(new_request, expired.cumulative_qty, TerminalKind::Expired);
        }

        let kind = OrderUpdateKind::Expired {
            cumulative_qty: expired.cumulative_qty,
        };
        let mut contexts = self.contexts.lock();
        match contexts.entry(order_sid) {
            Entry::Occupied(mut entry) => {
                let context = entry.get_mut();
                if context.is_archived() {
                    error!(order_sid = %order_sid, "Order expired for an archived order");
                    return;
                }
                context.order.terminate(
                    OrderStatus::Expired,
                    expired.cumulative_qty,
                    expired.transact_ms,
                );
                self.publish(context, kind, None);
                context.archive();
            }
            Entry::Vacant(vacant) => {
                let Some(new_request) = request.as_ref().and_then(|r| r.as_new()) else {
                    error!(
                        order_sid = %order_sid,
                        "Received order expired for an unknown request"
                    );
                    return;
                };
                let mut context = self.new_context(new_request, expired.transact_ms);
                context.order.terminate(
                    OrderStatus::Expired,
                    expired.cumulative_qty,
                    expired.transact_ms,
                );
                let snapshot = context.order.clone();
                self.publish(&context, kind, Some(snapshot));
                context.archive();
                vacant.insert(context);
            }
        }
    }

    fn receive_cancel_rejected(&self, cancel_rejected: OrderCancelRejected) {
        let cancel_sid = cancel_rejected.order_sid;
        self.registry.observe_order_sid(cancel_sid);

        let Some(request) = self.registry.remove(cancel_sid) else {
            warn!(
                order_sid = %cancel_sid,
                "Received cancel rejected for an unknown request"
            );
            return;
        };
        self.complete(OrderRequestCompletion::of(
            request.client_key(),
            cancel_sid,
            CompletionType::Rejected,
            Some(cancel_rejected.reject_type),
            cancel_rejected.reason.clone(),
        ));

        let Some(cancel_request) = request.as_cancel() else {
            error!(order_sid = %cancel_sid, "Cancel rejected for a non-cancel request");
            return;
        };
        let target = cancel_request.target_order_sid;
        self.registry.remove_cancel_mapping(target);
        self.registry.clear_pending_cancel(target);

        // The original cancel did not change the order; only broadcast
        // when the target is still a live local order.
        if cancel_rejected.reject_type != RejectType::UnknownOrder {
            let contexts = self.contexts.lock();
            match contexts.get(&target) {
                Some(context) if !context.is_archived() => {
                    self.publish(
                        context,
                        OrderUpdateKind::CancelRejected {
                            reject_type: cancel_rejected.reject_type,
                        },
                        None,
                    );
                }
                _ => {
                    error!(
                        target_order_sid = %target,
                        "Cancel rejected for an order that does not exist in our map"
                    );
                }
            }
        }
    }

    fn receive_amend_rejected(&self, amend_rejected: OrderAmendRejected) {
        let order_sid = amend_rejected.order_sid;
        self.registry.observe_order_sid(order_sid);
        error!(order_sid = %order_sid, "Order amend is not supported");
        if let Some(request) = self.registry.remove(order_sid) {
            self.complete(OrderRequestCompletion::of(
                request.client_key(),
                order_sid,
                CompletionType::Rejected,
                Some(RejectType::UnsupportedOperation),
                amend_rejected.reason,
            ));
        }
    }

    fn receive_trade_created(&self, trade: TradeCreated) {
        let order_sid = trade.order_sid;
        self.registry.observe_order_sid(order_sid);

        let trade_sid = TradeSid::new(self.next_trade_sid.fetch_add(1, Ordering::AcqRel));
        let kind = OrderUpdateKind::Trade {
            trade_sid,
            execution_price: trade.execution_price,
            execution_qty: trade.execution_qty,
            status: trade.status,
        };

        {
            let mut contexts = self.contexts.lock();
            match contexts.entry(order_sid) {
                Entry::Occupied(mut entry) => {
                    let context = entry.get_mut();
                    if context.is_archived() {
                        error!(order_sid = %order_sid, "Trade for an archived order");
                        return;
                    }
                    context.order.apply_execution(trade.execution_qty, trade.transact_ms);
                    self.publish(context, kind, None);
                }
                Entry::Vacant(vacant) => {
                    // A fill can be the first evidence (immediate-or-
                    // cancel flows skip the accepted report).
                    let Some(request) = self.registry.get(order_sid) else {
                        error!(
                            order_sid = %order_sid,
                            "Received trade for an order that does not exist in our map"
                        );
                        return;
                    };
                    let Some(new_request) = request.as_new() else {
                        error!(order_sid = %order_sid, "Trade for a cancel request");
                        return;
                    };
                    let mut context = self.new_context(new_request, trade.transact_ms);
                    context.order.apply_execution(trade.execution_qty, trade.transact_ms);
                    let snapshot = context.order.clone();
                    self.publish(&context, kind, Some(snapshot));
                    vacant.insert(context);
                }
            }
        }

        if trade.status == OrderStatus::Filled {
            self.handle_filled_trade(&trade);
        } else {
            self.handle_unfilled_trade(&trade);
        }
    }

    /// Fully filled: release the request, settle position/exposure and
    /// drop the context (no further updates, nothing to archive).
    fn handle_filled_trade(&self, trade: &TradeCreated) {
        let order_sid = trade.order_sid;
        match self.registry.remove(order_sid) {
            Some(request) => {
                if let Some(new_request) = request.as_new() {
                    let state = self.instruments.get_or_create(new_request.instrument_sid);
                    let mut book = state.book().lock();
                    match trade.side {
                        Side::Buy => {
                            book.buy_trade(trade.execution_qty);
                            book.buy_order_filled(new_request.limit_price);
                        }
                        Side::Sell => {
                            self.exposure.inc_purchasing_power(notional(
                                trade.execution_price,
                                trade.execution_qty,
                            ));
                            book.sell_trade(trade.execution_qty);
                            book.sell_order_filled(new_request.limit_price);
                        }
                    }
                }
            }
            None => {
                warn!(
                    order_sid = %order_sid,
                    "Filled trade for an unknown request, position settled without level"
                );
                let state = self.instruments.get_or_create(trade.instrument_sid);
                let mut book = state.book().lock();
                match trade.side {
                    Side::Buy => book.buy_trade(trade.execution_qty),
                    Side::Sell => self.exposure.inc_purchasing_power(notional(
                        trade.execution_price,
                        trade.execution_qty,
                    )),
                }
            }
        }
        self.contexts.lock().remove(&order_sid);
    }

    fn handle_unfilled_trade(&self, trade: &TradeCreated) {
        let state = self.instruments.get_or_create(trade.instrument_sid);
        let mut book = state.book().lock();
        match trade.side {
            Side::Buy => book.buy_trade(trade.execution_qty),
            Side::Sell => {
                self.exposure
                    .inc_purchasing_power(notional(trade.execution_price, trade.execution_qty));
                book.sell_trade(trade.execution_qty);
            }
        }
    }

    fn receive_trade_cancelled(&self, trade_cancelled: TradeCancelled) {
        self.registry.observe_order_sid(trade_cancelled.order_sid);
        info!(
            order_sid = %trade_cancelled.order_sid,
            side = %trade_cancelled.side,
            execution_qty = %trade_cancelled.execution_qty,
            "Trade cancelled, reversing execution impact"
        );
        let state = self.instruments.get_or_create(trade_cancelled.instrument_sid);
        let mut book = state.book().lock();
        let amount = notional(
            trade_cancelled.execution_price,
            trade_cancelled.execution_qty,
        );
        match trade_cancelled.side {
            Side::Buy => {
                book.buy_trade_cancelled(trade_cancelled.execution_qty);
                self.exposure.inc_purchasing_power(amount);
            }
            Side::Sell => {
                book.sell_trade_cancelled(trade_cancelled.execution_qty);
                self.exposure.dec_purchasing_power(amount);
            }
        }
    }

    // ------------------------------------------------------------------
    // Recovery listener
    // ------------------------------------------------------------------

    /// Rebuild the lost request behind a replayed accepted report and
    /// charge exposure so purchasing power reflects reality before the
    /// service goes active.
    fn recover_accepted(&self, accepted: &OrderAccepted) {
        let order_sid = accepted.order_sid;
        if !self.recovery.lock().record(order_sid) {
            error!(
                order_sid = %order_sid,
                "Received order accepted for an existing order during recovery, skip"
            );
            return;
        }
        info!(
            order_sid = %order_sid,
            side = %accepted.side,
            instrument_sid = %accepted.instrument_sid,
            price = %accepted.price,
            leaves_qty = %accepted.leaves_qty,
            cumulative_qty = %accepted.cumulative_qty,
            "Processing recovery order accepted"
        );
        self.reconstruct_and_charge(
            order_sid,
            accepted.instrument_sid,
            accepted.side,
            accepted.price,
            accepted.leaves_qty,
            accepted.cumulative_qty,
        );
    }

    fn recover_rejected(&self, rejected: &OrderRejected) -> bool {
        let order_sid = rejected.order_sid;
        if !self.recovery.lock().record(order_sid) {
            warn!(
                order_sid = %order_sid,
                "Skip processing order rejected with an order sid already used in the system"
            );
            return false;
        }
        if rejected.instrument_sid.value() == 0 {
            error!(
                order_sid = %order_sid,
                "Recovered order rejected contains invalid instrument"
            );
            return false;
        }
        info!(
            order_sid = %order_sid,
            side = %rejected.side,
            instrument_sid = %rejected.instrument_sid,
            "Processing recovery order rejected"
        );
        self.reconstruct_and_charge(
            order_sid,
            rejected.instrument_sid,
            rejected.side,
            rejected.price,
            rejected.leaves_qty,
            rejected.cumulative_qty,
        );
        true
    }

    fn recover_expired(&self, expired: &OrderExpired) {
        let order_sid = expired.order_sid;
        if !self.recovery.lock().record(order_sid) {
            warn!(
                order_sid = %order_sid,
                "Skip processing order expired with an order sid already used in the system"
            );
            return;
        }
        info!(
            order_sid = %order_sid,
            side = %expired.side,
            instrument_sid = %expired.instrument_sid,
            "Processing recovery order expired"
        );
        self.reconstruct_and_charge(
            order_sid,
            expired.instrument_sid,
            expired.side,
            expired.price,
            expired.leaves_qty,
            expired.cumulative_qty,
        );
    }

    fn reconstruct_and_charge(
        &self,
        order_sid: OrderSid,
        instrument_sid: omx_core::InstrumentSid,
        side: Side,
        price: omx_core::Price,
        leaves_qty: Qty,
        cumulative_qty: Qty,
    ) {
        let request =
            reconstruct_request(order_sid, instrument_sid, side, price, leaves_qty, cumulative_qty);
        if side == Side::Buy {
            self.exposure
                .dec_purchasing_power(notional(price, request.quantity));
        }
        let state = self.instruments.get_or_create(instrument_sid);
        state.book().lock().restore_resting_order(side, price);
        self.registry.put(OrderRequest::New(request));
        self.exposure_recovered_at_ms
            .store(clock::unix_millis(), Ordering::Release);
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    /// Synchronous, non-blocking clear of every mutable structure.
    pub fn reset(&self) {
        debug!("Resetting order context manager");
        self.contexts.lock().clear();
        self.recovery.lock().clear();
        self.next_trade_sid
            .store(START_TRADE_SID_SEQUENCE, Ordering::Release);
    }

    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.contexts.lock().is_empty()
            && self.recovery.lock().is_empty()
            && self.next_trade_sid.load(Ordering::Acquire) == START_TRADE_SID_SEQUENCE
    }
}
