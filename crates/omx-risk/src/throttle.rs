//! Sliding-window throttle tracking.
//!
//! Always right with respect to a sliding window: a token consumed at
//! time `t` frees at `t + window`, so at most `capacity` consumptions
//! can sit inside any window. Used to bound orders/second to the
//! exchange per throttle domain.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::info;

use omx_core::clock;

use crate::error::{RiskError, RiskResult};

#[derive(Debug)]
struct TrackerState {
    capacity: usize,
    /// Monotonic consume timestamps still inside the window.
    consumed: VecDeque<u64>,
}

/// Fixed token budget replenished on a sliding time window.
#[derive(Debug)]
pub struct ThrottleTracker {
    window_ns: u64,
    configured_capacity: usize,
    state: Mutex<TrackerState>,
}

impl ThrottleTracker {
    pub fn new(capacity: usize, window_ns: u64) -> RiskResult<Self> {
        if capacity == 0 {
            return Err(RiskError::InvalidThrottleCapacity(capacity as i64));
        }
        info!(capacity, window_ns, "Created throttle tracker");
        Ok(Self {
            window_ns,
            configured_capacity: capacity,
            state: Mutex::new(TrackerState {
                capacity,
                consumed: VecDeque::with_capacity(capacity),
            }),
        })
    }

    #[must_use]
    pub fn configured_capacity(&self) -> usize {
        self.configured_capacity
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    // A token consumed at t occupies [t, t + window]; it frees at
    // t + window + 1, consistent with next_avail_ns.
    fn prune(state: &mut TrackerState, window_ns: u64, now_ns: u64) {
        let cutoff = now_ns.saturating_sub(window_ns);
        while state.consumed.front().is_some_and(|&t| t < cutoff) {
            state.consumed.pop_front();
        }
    }

    /// Try to consume `n` tokens at `now_ns`. All-or-nothing.
    pub fn try_acquire_at(&self, n: u32, now_ns: u64) -> bool {
        let mut state = self.state.lock();
        Self::prune(&mut state, self.window_ns, now_ns);
        if state.consumed.len() + n as usize > state.capacity {
            return false;
        }
        for _ in 0..n {
            state.consumed.push_back(now_ns);
        }
        true
    }

    /// Try to consume `n` tokens now.
    pub fn try_acquire(&self, n: u32) -> bool {
        self.try_acquire_at(n, clock::monotonic_ns())
    }

    /// Earliest monotonic instant at which `n` tokens will be free,
    /// assuming no further consumption. Returns `now_ns` when they
    /// already are.
    #[must_use]
    pub fn next_avail_ns(&self, n: u32, now_ns: u64) -> u64 {
        let mut state = self.state.lock();
        Self::prune(&mut state, self.window_ns, now_ns);
        let len = state.consumed.len();
        let needed = n as usize;
        if len + needed <= state.capacity {
            return now_ns;
        }
        if needed > state.capacity {
            // Can never be satisfied at this capacity.
            return u64::MAX;
        }
        // The (len + needed - capacity)-th oldest consumption must age out.
        let index = len + needed - state.capacity - 1;
        state.consumed[index] + self.window_ns + 1
    }

    /// Remaining tokens at `now_ns`.
    #[must_use]
    pub fn available_at(&self, now_ns: u64) -> usize {
        let mut state = self.state.lock();
        Self::prune(&mut state, self.window_ns, now_ns);
        state.capacity - state.consumed.len()
    }

    /// Swap in a different capacity (warm-up inflates it); consumption
    /// history is discarded.
    pub fn change_capacity(&self, capacity: usize) {
        let mut state = self.state.lock();
        state.capacity = capacity;
        state.consumed.clear();
    }

    /// Restore the configured capacity and drop consumption history.
    pub fn reset(&self) {
        self.change_capacity(self.configured_capacity);
    }

    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.state.lock().capacity == self.configured_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: u64 = 1_000_000_000; // 1s

    #[test]
    fn test_budget_exhaustion_within_window() {
        let tracker = ThrottleTracker::new(3, WINDOW).unwrap();

        assert!(tracker.try_acquire_at(1, 0));
        assert!(tracker.try_acquire_at(1, 10));
        assert!(tracker.try_acquire_at(1, 20));
        // 4th within the same window is throttled.
        assert!(!tracker.try_acquire_at(1, 30));
    }

    #[test]
    fn test_tokens_free_after_window() {
        let tracker = ThrottleTracker::new(2, WINDOW).unwrap();
        assert!(tracker.try_acquire_at(2, 0));
        assert!(!tracker.try_acquire_at(1, WINDOW));
        assert!(tracker.try_acquire_at(1, WINDOW + 1));
    }

    #[test]
    fn test_multi_token_all_or_nothing() {
        let tracker = ThrottleTracker::new(3, WINDOW).unwrap();
        assert!(tracker.try_acquire_at(2, 0));
        assert!(!tracker.try_acquire_at(2, 1));
        assert_eq!(tracker.available_at(1), 1);
    }

    #[test]
    fn test_next_avail() {
        let tracker = ThrottleTracker::new(2, WINDOW).unwrap();
        assert_eq!(tracker.next_avail_ns(1, 0), 0);

        assert!(tracker.try_acquire_at(1, 100));
        assert!(tracker.try_acquire_at(1, 200));

        // One token frees when the consumption at t=100 ages out.
        assert_eq!(tracker.next_avail_ns(1, 300), 100 + WINDOW + 1);
        // Two tokens free when the consumption at t=200 ages out.
        assert_eq!(tracker.next_avail_ns(2, 300), 200 + WINDOW + 1);
    }

    #[test]
    fn test_next_avail_unsatisfiable() {
        let tracker = ThrottleTracker::new(2, WINDOW).unwrap();
        assert_eq!(tracker.next_avail_ns(3, 0), u64::MAX);
    }

    #[test]
    fn test_capacity_change_and_reset() {
        let tracker = ThrottleTracker::new(2, WINDOW).unwrap();
        assert!(tracker.try_acquire_at(2, 0));

        tracker.change_capacity(1 << 20);
        assert!(!tracker.is_clear());
        assert!(tracker.try_acquire_at(1000, 1));

        tracker.reset();
        assert!(tracker.is_clear());
        assert_eq!(tracker.capacity(), 2);
        assert!(tracker.try_acquire_at(2, 2));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(ThrottleTracker::new(0, WINDOW).is_err());
    }
}
