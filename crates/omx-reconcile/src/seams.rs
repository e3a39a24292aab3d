//! Outbound seams of the reconciliation stage.

use omx_core::{OrderRequestCompletion, OrderUpdate};

/// Republishes normalized, sequenced updates to downstream subscribers.
///
/// An update carrying a snapshot is the first a subscriber could have
/// seen for that order; deltas follow.
pub trait UpdateDistributor: Send + Sync {
    fn publish(&self, update: OrderUpdate);
}

/// Delivers a request completion back to its originator.
pub trait CompletionSink: Send + Sync {
    fn send(&self, completion: OrderRequestCompletion);
}
