//! Order contexts: the unit of reconciliation state.

use std::sync::Arc;

use omx_core::{Order, SequencingChannel};

/// Where a context is in its life.
///
/// One arena holds both active and archived contexts; the tag replaces
/// a second map that could drift out of sync with the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Still expecting updates.
    Active,
    /// Terminal, no further updates expected; an update landing here is
    /// a protocol anomaly, not a resurrection.
    Archived,
}

/// Binds one order to its per-instrument sequencing channel.
#[derive(Debug)]
pub struct OrderContext {
    pub order: Order,
    channel: Arc<SequencingChannel>,
    state: ContextState,
}

impl OrderContext {
    #[must_use]
    pub fn new(order: Order, channel: Arc<SequencingChannel>) -> Self {
        Self {
            order,
            channel,
            state: ContextState::Active,
        }
    }

    #[must_use]
    pub fn channel(&self) -> &Arc<SequencingChannel> {
        &self.channel
    }

    #[must_use]
    pub fn state(&self) -> ContextState {
        self.state
    }

    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.state == ContextState::Archived
    }

    pub fn archive(&mut self) {
        self.state = ContextState::Archived;
    }
}
