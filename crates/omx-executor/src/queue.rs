//! Bounded admitted-request queue.
//!
//! Single producer (the admission thread), single consumer (the
//! dispatcher thread). A mutex around a pre-sized deque is enough at
//! this contention level; the dispatcher drains in batches so the lock
//! is taken once per cycle, not once per request.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::debug;

use omx_core::OrderRequest;

/// Result of enqueueing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    Queued,
    QueueFull,
}

impl EnqueueResult {
    #[must_use]
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }
}

/// Bounded FIFO of admitted requests.
#[derive(Debug)]
pub struct RequestQueue {
    inner: Mutex<VecDeque<OrderRequest>>,
    capacity: usize,
}

impl RequestQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, request: OrderRequest) -> EnqueueResult {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            debug!(
                order_sid = %request.order_sid(),
                queue_len = queue.len(),
                capacity = self.capacity,
                "Request rejected: queue full"
            );
            return EnqueueResult::QueueFull;
        }
        queue.push_back(request);
        EnqueueResult::Queued
    }

    /// Move up to `max` requests into `out`, preserving order. Returns
    /// the number drained.
    pub fn drain_into(&self, out: &mut Vec<OrderRequest>, max: usize) -> usize {
        let mut queue = self.inner.lock();
        let n = queue.len().min(max);
        out.extend(queue.drain(..n));
        n
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omx_core::{
        CancelOrderRequest, ClientKey, InstrumentSid, OrderSid, Side, NUM_THROTTLES_PER_ORDER,
    };

    fn sample(sid: u32) -> OrderRequest {
        OrderRequest::Cancel(CancelOrderRequest {
            client_key: ClientKey::new(1),
            order_sid: OrderSid::new(sid),
            target_order_sid: OrderSid::new(1),
            instrument_sid: InstrumentSid::new(700),
            side: Side::Buy,
            force: false,
            deadline_ns: u64::MAX,
            throttle_domain: 0,
            num_throttles_required: NUM_THROTTLES_PER_ORDER,
        })
    }

    #[test]
    fn test_fifo_order_preserved() {
        let queue = RequestQueue::new(4);
        queue.push(sample(1));
        queue.push(sample(2));
        queue.push(sample(3));

        let mut out = Vec::new();
        assert_eq!(queue.drain_into(&mut out, 2), 2);
        assert_eq!(out[0].order_sid(), OrderSid::new(1));
        assert_eq!(out[1].order_sid(), OrderSid::new(2));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_capacity_bound() {
        let queue = RequestQueue::new(2);
        assert!(queue.push(sample(1)).is_queued());
        assert!(queue.push(sample(2)).is_queued());
        assert_eq!(queue.push(sample(3)), EnqueueResult::QueueFull);
    }
}
