//! The throttle-gated batching dispatcher.
//!
//! Mirrors the dispatch contract:
//! - expired requests report `Timeout` without touching any throttle
//! - a throttled request flushes the batch immediately (everything
//!   behind it would throttle too), then either reports `Throttled`,
//!   busy-waits for the next token when the deadline allows, or reports
//!   `ThrottledThenTimeout`
//! - secured requests batch up and flush on full batch or drained queue
//! - flushing sends all batched orders before emitting any outcome, and
//!   outcomes go out in original arrival order

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error, info, trace};

use omx_core::{clock, OrderRequest, NUM_THROTTLES_PER_ORDER};
use omx_lifecycle::{LifecycleChild, LifecycleController, LifecycleHooks};
use omx_risk::ThrottleTracker;

use crate::engine::ExchangeEngine;
use crate::queue::RequestQueue;

/// Token count every tracker is inflated to during warm-up, so warm-up
/// traffic is never throttled.
pub const WARMUP_THROTTLE_CAPACITY: usize = 1 << 20;

/// Outcomes the dispatcher reports back to the admission side.
pub trait CompletionHandler: Send + Sync {
    /// Deadline elapsed before the request could be sent.
    fn timeout(&self, request: &OrderRequest);
    /// Throttled and the request did not permit waiting.
    fn throttled(&self, request: &OrderRequest);
    /// Throttled, then the deadline elapsed while waiting for a token.
    fn timeout_after_throttled(&self, request: &OrderRequest);
    /// Handed to the engine at `sent_at_ns`.
    fn sent_to_exchange(&self, request: &OrderRequest, sent_at_ns: u64);
    /// Engine send failure.
    fn fail(&self, request: &OrderRequest, reason: &str);
}

/// What the consume loop does with incoming requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatchMode {
    /// Requests are dropped with an error log (init/reset/stopped).
    Noop = 0,
    /// Requests are throttle-gated and dispatched.
    Active = 1,
}

impl DispatchMode {
    fn from_u8(value: u8) -> Self {
        if value == DispatchMode::Active as u8 {
            Self::Active
        } else {
            Self::Noop
        }
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum orders accumulated before a forced flush.
    pub max_batch_orders: usize,
    /// Requests drained from the queue per cycle.
    pub drain_per_cycle: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_batch_orders: 1,
            drain_per_cycle: 64,
        }
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Timeout,
    Throttled,
    ThrottledThenTimeout,
    Sent { ts_ns: u64 },
    Failed { reason: String },
}

/// Per-cycle batch state, owned by the dispatcher thread.
#[derive(Debug, Default)]
pub struct Batch {
    orders: Vec<OrderRequest>,
    outcomes: Vec<(OrderRequest, Outcome)>,
}

impl Batch {
    fn add_outcome(&mut self, request: OrderRequest, outcome: Outcome) {
        self.outcomes.push((request, outcome));
    }
}

/// Single-threaded, throttle-gated, batching dispatcher.
pub struct OrderExecutor {
    name: String,
    throttle_trackers: Vec<Arc<ThrottleTracker>>,
    engine: Arc<dyn ExchangeEngine>,
    completion: Arc<dyn CompletionHandler>,
    queue: Arc<RequestQueue>,
    mode: AtomicU8,
    running: AtomicBool,
    num_processed: AtomicU64,
    config: ExecutorConfig,
}

impl OrderExecutor {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        throttle_trackers: Vec<Arc<ThrottleTracker>>,
        engine: Arc<dyn ExchangeEngine>,
        completion: Arc<dyn CompletionHandler>,
        queue: Arc<RequestQueue>,
        config: ExecutorConfig,
    ) -> Self {
        debug_assert!(!throttle_trackers.is_empty());
        Self {
            name: name.into(),
            throttle_trackers,
            engine,
            completion,
            queue,
            mode: AtomicU8::new(DispatchMode::Noop as u8),
            running: AtomicBool::new(true),
            num_processed: AtomicU64::new(0),
            config,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    #[must_use]
    pub fn mode(&self) -> DispatchMode {
        DispatchMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn set_mode(&self, mode: DispatchMode) {
        self.mode.store(mode as u8, Ordering::Release);
    }

    #[must_use]
    pub fn num_processed(&self) -> u64 {
        self.num_processed.load(Ordering::Acquire)
    }

    pub fn stop_running(&self) {
        self.running.store(false, Ordering::Release);
        info!(name = %self.name, "Stop dispatcher from running");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The consume loop. Runs until `stop_running`.
    pub fn run(&self) {
        info!(name = %self.name, "Started dispatcher thread");
        let mut batch = Batch::default();
        let mut drained = Vec::with_capacity(self.config.drain_per_cycle);
        while self.running.load(Ordering::Acquire) {
            drained.clear();
            let n = self.queue.drain_into(&mut drained, self.config.drain_per_cycle);
            if n == 0 {
                thread::yield_now();
                continue;
            }
            for request in drained.drain(..) {
                self.process(request, &mut batch);
            }
            self.flush(&mut batch);
        }
        info!(name = %self.name, "Dispatcher thread exited");
    }

    /// Drain and dispatch whatever is queued right now (test and
    /// single-step entry point).
    pub fn consume_available(&self) {
        let mut batch = Batch::default();
        let mut drained = Vec::new();
        if self.queue.drain_into(&mut drained, usize::MAX) > 0 {
            for request in drained.drain(..) {
                self.process(request, &mut batch);
            }
            self.flush(&mut batch);
        }
    }

    fn process(&self, request: OrderRequest, batch: &mut Batch) {
        self.num_processed.fetch_add(1, Ordering::AcqRel);
        match self.mode() {
            DispatchMode::Active => self.process_active(request, batch),
            DispatchMode::Noop => {
                error!(
                    name = %self.name,
                    order_sid = %request.order_sid(),
                    "Got order request with noop handler"
                );
            }
        }
    }

    fn process_active(&self, request: OrderRequest, batch: &mut Batch) {
        let now_ns = clock::monotonic_ns();
        if now_ns > request.deadline_ns() {
            batch.add_outcome(request, Outcome::Timeout);
            return;
        }

        let Some(tracker) = self.throttle_trackers.get(request.throttle_domain()) else {
            error!(
                order_sid = %request.order_sid(),
                throttle_domain = request.throttle_domain(),
                "Unknown throttle domain"
            );
            batch.add_outcome(
                request,
                Outcome::Failed {
                    reason: "unknown throttle domain".to_string(),
                },
            );
            return;
        };

        let needed = request.num_throttles_required();
        if !tracker.try_acquire_at(needed, now_ns) {
            // Everything behind this request would throttle too: stop
            // optimistically batching and get the sends out now.
            self.flush(batch);

            if !request.retry() || needed > NUM_THROTTLES_PER_ORDER {
                debug!(
                    order_sid = %request.order_sid(),
                    instrument_sid = %request.instrument_sid(),
                    throttle_domain = request.throttle_domain(),
                    "Throttled request"
                );
                batch.add_outcome(request, Outcome::Throttled);
                self.flush(batch);
                return;
            }

            let next_avail = tracker.next_avail_ns(needed, now_ns);
            if request.deadline_ns() >= next_avail {
                // The deadline covers the wait: busy-spin for the next
                // token. Sub-window latency matters here, nothing else
                // can run on this thread anyway.
                let mut spins = 0u64;
                while !tracker.try_acquire_at(needed, clock::monotonic_ns()) {
                    spins += 1;
                    std::hint::spin_loop();
                }
                trace!(
                    order_sid = %request.order_sid(),
                    spins,
                    "Waited to get the next throttle"
                );
            } else {
                debug!(
                    order_sid = %request.order_sid(),
                    deadline_ns = request.deadline_ns(),
                    next_avail_ns = next_avail,
                    "Throttled request timed out before a token frees"
                );
                batch.add_outcome(request, Outcome::ThrottledThenTimeout);
                return;
            }
        }

        batch.orders.push(request.clone());
        batch.add_outcome(
            request,
            Outcome::Sent {
                ts_ns: clock::monotonic_ns(),
            },
        );
        if batch.orders.len() >= self.config.max_batch_orders {
            self.flush(batch);
        }
    }

    /// Send all batched orders first, so a queueing failure on one does
    /// not block sibling sends, then emit outcomes in arrival order.
    fn flush(&self, batch: &mut Batch) {
        for order in batch.orders.drain(..) {
            if let Err(e) = self.engine.send_order_request(&order) {
                error!(
                    order_sid = %order.order_sid(),
                    error = %e,
                    "Caught error when sending order to exchange"
                );
                let sid = order.order_sid();
                for (request, outcome) in batch.outcomes.iter_mut() {
                    if request.order_sid() == sid && matches!(outcome, Outcome::Sent { .. }) {
                        *outcome = Outcome::Failed {
                            reason: e.to_string(),
                        };
                        break;
                    }
                }
            }
        }

        for (request, outcome) in batch.outcomes.drain(..) {
            match outcome {
                Outcome::Timeout => {
                    debug!(
                        order_sid = %request.order_sid(),
                        instrument_sid = %request.instrument_sid(),
                        "Timeout order"
                    );
                    self.completion.timeout(&request);
                }
                Outcome::Throttled => self.completion.throttled(&request),
                Outcome::ThrottledThenTimeout => self.completion.timeout_after_throttled(&request),
                Outcome::Sent { ts_ns } => self.completion.sent_to_exchange(&request, ts_ns),
                Outcome::Failed { reason } => self.completion.fail(&request, &reason),
            }
        }
    }

    /// Restore every tracker to its configured token budget.
    fn reset_state(&self) {
        for tracker in &self.throttle_trackers {
            tracker.reset();
        }
        self.queue.clear();
    }

    /// Every tracker back at its configured budget and the queue empty.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.throttle_trackers.iter().all(|t| t.is_clear()) && self.queue.is_empty()
    }
}

// ============================================================================
// Lifecycle integration
// ============================================================================

struct ExecutorHooks {
    executor: Arc<OrderExecutor>,
}

impl LifecycleHooks for ExecutorHooks {
    /// CAUTION: called from the orchestrating thread.
    fn on_pending_warmup(&self) -> Result<(), String> {
        for tracker in &self.executor.throttle_trackers {
            tracker.change_capacity(WARMUP_THROTTLE_CAPACITY);
        }
        Ok(())
    }

    fn on_warmup_enter(&self) {
        self.executor.set_mode(DispatchMode::Active);
    }

    fn on_recovery_enter(&self) {
        self.executor.set_mode(DispatchMode::Active);
    }

    fn on_pending_reset(&self) -> Result<(), String> {
        info!(name = %self.executor.name, "Reset completed");
        self.executor.reset_state();
        Ok(())
    }

    fn on_reset_enter(&self) {
        self.executor.set_mode(DispatchMode::Noop);
    }

    fn on_active_enter(&self) {
        self.executor.set_mode(DispatchMode::Active);
    }

    fn on_stopped(&self) {
        self.executor.set_mode(DispatchMode::Noop);
    }
}

/// The dispatcher as an orchestrated lifecycle child: owns the worker
/// thread handle and exposes the clear/stopped predicates.
pub struct ExecutorChild {
    executor: Arc<OrderExecutor>,
    controller: LifecycleController,
    join: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ExecutorChild {
    #[must_use]
    pub fn executor(&self) -> &Arc<OrderExecutor> {
        &self.executor
    }
}

impl LifecycleChild for ExecutorChild {
    fn name(&self) -> &str {
        self.executor.name()
    }

    fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    fn is_clear(&self) -> bool {
        self.executor.is_clear()
    }

    fn begin_disruptive_stop(&self) {
        self.executor.stop_running();
    }

    fn is_stopped(&self) -> bool {
        self.join
            .lock()
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }
}

/// Spawn the dispatcher thread and wrap it as a lifecycle child.
pub fn spawn_executor(
    executor: Arc<OrderExecutor>,
) -> Result<Arc<ExecutorChild>, crate::ExecutorError> {
    let controller = LifecycleController::new(
        format!("{}-lifecycle", executor.name()),
        Box::new(ExecutorHooks {
            executor: Arc::clone(&executor),
        }),
    );
    let runner = Arc::clone(&executor);
    let handle = thread::Builder::new()
        .name(executor.name().to_string())
        .spawn(move || runner.run())?;
    Ok(Arc::new(ExecutorChild {
        executor,
        controller,
        join: Mutex::new(Some(handle)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockExchangeEngine;
    use crate::error::ExecutorError;
    use omx_core::{
        ClientKey, InstrumentSid, NewOrderRequest, OrderSid, OrderType, Price, Qty, Side,
        TimeInForce,
    };
    use omx_lifecycle::LifecycleTarget;

    const WINDOW_NS: u64 = 20_000_000; // 20ms, short enough to busy-wait in tests

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Recorded {
        Timeout(OrderSid),
        Throttled(OrderSid),
        ThrottledThenTimeout(OrderSid),
        Sent(OrderSid),
        Failed(OrderSid),
    }

    #[derive(Default)]
    struct RecordingCompletion {
        events: Mutex<Vec<Recorded>>,
    }

    impl RecordingCompletion {
        fn events(&self) -> Vec<Recorded> {
            self.events.lock().clone()
        }
    }

    impl CompletionHandler for RecordingCompletion {
        fn timeout(&self, request: &OrderRequest) {
            self.events.lock().push(Recorded::Timeout(request.order_sid()));
        }
        fn throttled(&self, request: &OrderRequest) {
            self.events.lock().push(Recorded::Throttled(request.order_sid()));
        }
        fn timeout_after_throttled(&self, request: &OrderRequest) {
            self.events
                .lock()
                .push(Recorded::ThrottledThenTimeout(request.order_sid()));
        }
        fn sent_to_exchange(&self, request: &OrderRequest, _sent_at_ns: u64) {
            self.events.lock().push(Recorded::Sent(request.order_sid()));
        }
        fn fail(&self, request: &OrderRequest, _reason: &str) {
            self.events.lock().push(Recorded::Failed(request.order_sid()));
        }
    }

    #[derive(Default)]
    struct RecordingEngine {
        sent: Mutex<Vec<OrderSid>>,
        fail_sids: Vec<OrderSid>,
    }

    impl ExchangeEngine for RecordingEngine {
        fn send_order_request(&self, request: &OrderRequest) -> crate::ExecutorResult<()> {
            if self.fail_sids.contains(&request.order_sid()) {
                return Err(ExecutorError::SubmissionFailed("session down".into()));
            }
            self.sent.lock().push(request.order_sid());
            Ok(())
        }
    }

    fn request(sid: u32, retry: bool, deadline_ns: u64) -> OrderRequest {
        OrderRequest::New(NewOrderRequest {
            client_key: ClientKey::new(1),
            order_sid: OrderSid::new(sid),
            instrument_sid: InstrumentSid::new(700),
            side: Side::Buy,
            order_type: OrderType::Limit,
            tif: TimeInForce::Day,
            limit_price: Price::new(100),
            quantity: Qty::new(10),
            deadline_ns,
            retry,
            throttle_domain: 0,
            num_throttles_required: NUM_THROTTLES_PER_ORDER,
        })
    }

    fn far_deadline() -> u64 {
        clock::monotonic_ns() + 10_000_000_000
    }

    fn setup(
        capacity: usize,
        max_batch: usize,
        engine: Arc<dyn ExchangeEngine>,
    ) -> (Arc<OrderExecutor>, Arc<RecordingCompletion>) {
        let tracker = Arc::new(ThrottleTracker::new(capacity, WINDOW_NS).unwrap());
        let completion = Arc::new(RecordingCompletion::default());
        let executor = Arc::new(OrderExecutor::new(
            "test-executor",
            vec![tracker],
            engine,
            completion.clone(),
            Arc::new(RequestQueue::new(64)),
            ExecutorConfig {
                max_batch_orders: max_batch,
                drain_per_cycle: 64,
            },
        ));
        executor.set_mode(DispatchMode::Active);
        (executor, completion)
    }

    #[test]
    fn test_expired_request_times_out_without_consuming_throttle() {
        let engine = Arc::new(RecordingEngine::default());
        let (executor, completion) = setup(1, 1, engine.clone());

        executor.queue().push(request(1, false, 0));
        executor.consume_available();

        assert_eq!(completion.events(), vec![Recorded::Timeout(OrderSid::new(1))]);
        assert!(engine.sent.lock().is_empty());
        // The throttle was untouched: a follow-up send succeeds.
        executor.queue().push(request(2, false, far_deadline()));
        executor.consume_available();
        assert_eq!(engine.sent.lock().as_slice(), &[OrderSid::new(2)]);
    }

    #[test]
    fn test_throttled_without_retry() {
        let engine = Arc::new(RecordingEngine::default());
        let (executor, completion) = setup(1, 4, engine.clone());

        executor.queue().push(request(1, false, far_deadline()));
        executor.queue().push(request(2, false, far_deadline()));
        executor.consume_available();

        assert_eq!(
            completion.events(),
            vec![
                Recorded::Sent(OrderSid::new(1)),
                Recorded::Throttled(OrderSid::new(2)),
            ]
        );
        assert_eq!(engine.sent.lock().as_slice(), &[OrderSid::new(1)]);
    }

    #[test]
    fn test_throttled_retry_busy_waits_for_token() {
        let engine = Arc::new(RecordingEngine::default());
        let (executor, completion) = setup(1, 4, engine.clone());

        executor.queue().push(request(1, false, far_deadline()));
        executor.queue().push(request(2, true, far_deadline()));
        executor.consume_available();

        // The retry request waited for the window to slide and went out.
        assert_eq!(
            completion.events(),
            vec![
                Recorded::Sent(OrderSid::new(1)),
                Recorded::Sent(OrderSid::new(2)),
            ]
        );
        assert_eq!(
            engine.sent.lock().as_slice(),
            &[OrderSid::new(1), OrderSid::new(2)]
        );
    }

    #[test]
    fn test_multi_token_request_never_busy_waits() {
        let engine = Arc::new(RecordingEngine::default());
        let (executor, completion) = setup(1, 4, engine.clone());

        // Needs more tokens than the single-token busy-wait policy
        // allows; retry does not apply.
        let mut multi = request(1, true, far_deadline());
        if let OrderRequest::New(ref mut r) = multi {
            r.num_throttles_required = 2;
        }
        executor.queue().push(multi);
        executor.consume_available();

        assert_eq!(completion.events(), vec![Recorded::Throttled(OrderSid::new(1))]);
        assert!(engine.sent.lock().is_empty());
    }

    #[test]
    fn test_throttled_then_timeout_when_deadline_cannot_cover_wait() {
        let engine = Arc::new(RecordingEngine::default());
        let (executor, completion) = setup(1, 4, engine.clone());

        executor.queue().push(request(1, false, far_deadline()));
        // Deadline well inside the throttle window: waiting is pointless.
        executor
            .queue()
            .push(request(2, true, clock::monotonic_ns() + 1_000));
        executor.consume_available();

        assert_eq!(
            completion.events(),
            vec![
                Recorded::Sent(OrderSid::new(1)),
                Recorded::ThrottledThenTimeout(OrderSid::new(2)),
            ]
        );
    }

    #[test]
    fn test_batch_sends_before_outcomes() {
        let engine = Arc::new(RecordingEngine::default());
        let (executor, completion) = setup(8, 8, engine.clone());

        for sid in 1..=3 {
            executor.queue().push(request(sid, false, far_deadline()));
        }
        executor.consume_available();

        assert_eq!(
            engine.sent.lock().as_slice(),
            &[OrderSid::new(1), OrderSid::new(2), OrderSid::new(3)]
        );
        assert_eq!(
            completion.events(),
            vec![
                Recorded::Sent(OrderSid::new(1)),
                Recorded::Sent(OrderSid::new(2)),
                Recorded::Sent(OrderSid::new(3)),
            ]
        );
    }

    #[test]
    fn test_send_failure_reported_without_stopping_batch() {
        let engine = Arc::new(RecordingEngine {
            fail_sids: vec![OrderSid::new(1)],
            ..Default::default()
        });
        let (executor, completion) = setup(8, 8, engine.clone());

        executor.queue().push(request(1, false, far_deadline()));
        executor.queue().push(request(2, false, far_deadline()));
        executor.consume_available();

        assert_eq!(
            completion.events(),
            vec![
                Recorded::Failed(OrderSid::new(1)),
                Recorded::Sent(OrderSid::new(2)),
            ]
        );
        assert_eq!(engine.sent.lock().as_slice(), &[OrderSid::new(2)]);
    }

    #[test]
    fn test_noop_mode_drops_requests() {
        let engine = Arc::new(RecordingEngine::default());
        let (executor, completion) = setup(1, 1, engine.clone());
        executor.set_mode(DispatchMode::Noop);

        executor.queue().push(request(1, false, far_deadline()));
        executor.consume_available();

        assert!(completion.events().is_empty());
        assert!(engine.sent.lock().is_empty());
        assert_eq!(executor.num_processed(), 1);
    }

    #[test]
    fn test_mock_engine_receives_secured_request() {
        let mut mock = MockExchangeEngine::new();
        mock.expect_send_order_request()
            .times(1)
            .returning(|_| Ok(()));
        let (executor, completion) = setup(1, 1, Arc::new(mock));

        executor.queue().push(request(1, false, far_deadline()));
        executor.consume_available();
        assert_eq!(completion.events(), vec![Recorded::Sent(OrderSid::new(1))]);
    }

    #[test]
    fn test_lifecycle_warmup_inflates_and_reset_restores() {
        let engine = Arc::new(RecordingEngine::default());
        let tracker = Arc::new(ThrottleTracker::new(2, WINDOW_NS).unwrap());
        let completion = Arc::new(RecordingCompletion::default());
        let executor = Arc::new(OrderExecutor::new(
            "lifecycle-executor",
            vec![tracker.clone()],
            engine,
            completion,
            Arc::new(RequestQueue::new(64)),
            ExecutorConfig::default(),
        ));
        let child = spawn_executor(Arc::clone(&executor)).unwrap();

        child.controller().transition(LifecycleTarget::Warmup).unwrap();
        assert_eq!(executor.mode(), DispatchMode::Active);
        assert_eq!(tracker.capacity(), WARMUP_THROTTLE_CAPACITY);
        assert!(!executor.is_clear());

        child.controller().transition(LifecycleTarget::Reset).unwrap();
        assert_eq!(executor.mode(), DispatchMode::Noop);
        assert_eq!(tracker.capacity(), 2);
        assert!(executor.is_clear());

        child.begin_disruptive_stop();
        while !child.is_stopped() {
            thread::yield_now();
        }
        child.controller().transition(LifecycleTarget::Stop).unwrap();
    }

    #[test]
    fn test_run_loop_end_to_end() {
        let engine = Arc::new(RecordingEngine::default());
        let (executor, completion) = setup(8, 1, engine.clone());
        let child = spawn_executor(Arc::clone(&executor)).unwrap();

        executor.queue().push(request(1, false, far_deadline()));
        executor.queue().push(request(2, false, far_deadline()));

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while completion.events().len() < 2 && std::time::Instant::now() < deadline {
            thread::yield_now();
        }
        assert_eq!(
            completion.events(),
            vec![
                Recorded::Sent(OrderSid::new(1)),
                Recorded::Sent(OrderSid::new(2)),
            ]
        );

        child.begin_disruptive_stop();
        while !child.is_stopped() {
            thread::yield_now();
        }
    }
}
