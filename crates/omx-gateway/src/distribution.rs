//! Update and completion fan-out.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{error, warn};

use omx_core::{
    ChannelId, ChannelSequenceTracker, OrderRequestCompletion, OrderUpdate, SeqObservation,
};
use omx_reconcile::{CompletionSink, UpdateDistributor};

/// Fan-out of sequenced order updates to subscribers.
///
/// Subscribers joining mid-stream rely on first-update snapshots to
/// bootstrap; the hub itself keeps no history. Per-channel sequence
/// contiguity is tracked on the way through: a gap is logged and the
/// channel resynchronized, never a stall, since there is no in-band
/// way to request retransmission.
#[derive(Debug, Default)]
pub struct SubscriberHub {
    subscribers: RwLock<Vec<mpsc::UnboundedSender<OrderUpdate>>>,
    seq_trackers: Mutex<HashMap<ChannelId, ChannelSequenceTracker>>,
}

impl SubscriberHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber and return its receiving end.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<OrderUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().push(tx);
        rx
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Forget every tracked channel sequence (reset).
    pub fn reset_sequences(&self) {
        self.seq_trackers.lock().clear();
    }

    fn observe_sequence(&self, update: &OrderUpdate) {
        let mut trackers = self.seq_trackers.lock();
        let tracker = trackers
            .entry(update.channel_id)
            .or_insert_with(|| ChannelSequenceTracker::new(update.channel_id));
        if let SeqObservation::Gap { expected, observed } = tracker.observe(update.channel_seq) {
            error!(
                channel_id = %update.channel_id,
                expected,
                observed,
                "Detected gap in order updates, resynchronizing"
            );
        }
    }
}

impl UpdateDistributor for SubscriberHub {
    fn publish(&self, update: OrderUpdate) {
        self.observe_sequence(&update);

        let mut dropped = false;
        {
            let subscribers = self.subscribers.read();
            for tx in subscribers.iter() {
                if tx.send(update.clone()).is_err() {
                    dropped = true;
                }
            }
        }
        if dropped {
            warn!(
                order_sid = %update.order_sid,
                "Could not deliver update to at least one of the subscribers"
            );
            self.subscribers.write().retain(|tx| !tx.is_closed());
        }
    }
}

/// Single stream of request completions back to originators.
///
/// The embedding process consumes the receiver and routes by client
/// key.
#[derive(Debug)]
pub struct CompletionHub {
    tx: mpsc::UnboundedSender<OrderRequestCompletion>,
}

impl CompletionHub {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OrderRequestCompletion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CompletionSink for CompletionHub {
    fn send(&self, completion: OrderRequestCompletion) {
        if self.tx.send(completion).is_err() {
            warn!("Completion receiver dropped, completion lost");
        }
    }
}
