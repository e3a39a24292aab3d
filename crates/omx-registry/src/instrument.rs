//! Per-instrument state: validation book, sequencing channel and the
//! optional underlying throttle domain.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use omx_core::{ChannelId, InstrumentSid, SequencingChannel};
use omx_risk::{ThrottleTracker, ValidationOrderBook};

/// Everything the gateway tracks for one tradable instrument.
#[derive(Debug)]
pub struct InstrumentState {
    instrument_sid: InstrumentSid,
    channel: Arc<SequencingChannel>,
    book: Mutex<ValidationOrderBook>,
    /// Underlying-level order throttle, shared by all instruments on
    /// the same underlying. None when the domain is not rate limited.
    underlying_throttle: Option<Arc<ThrottleTracker>>,
}

impl InstrumentState {
    #[must_use]
    pub fn new(
        instrument_sid: InstrumentSid,
        channel: Arc<SequencingChannel>,
        underlying_throttle: Option<Arc<ThrottleTracker>>,
    ) -> Self {
        Self {
            instrument_sid,
            channel,
            book: Mutex::new(ValidationOrderBook::new(instrument_sid)),
            underlying_throttle,
        }
    }

    #[must_use]
    pub fn instrument_sid(&self) -> InstrumentSid {
        self.instrument_sid
    }

    #[must_use]
    pub fn channel(&self) -> &Arc<SequencingChannel> {
        &self.channel
    }

    /// The validation book, behind a short critical section. Only one
    /// lifecycle phase writes at a time; the mutex covers the remaining
    /// cross-phase visibility.
    #[must_use]
    pub fn book(&self) -> &Mutex<ValidationOrderBook> {
        &self.book
    }

    #[must_use]
    pub fn underlying_throttle(&self) -> Option<&Arc<ThrottleTracker>> {
        self.underlying_throttle.as_ref()
    }
}

/// Directory of instrument states, creating them lazily on first touch.
///
/// Channel assignment hashes the instrument sid over a power-of-two
/// channel count so all updates for one instrument share a channel.
#[derive(Debug)]
pub struct InstrumentDirectory {
    instruments: DashMap<InstrumentSid, Arc<InstrumentState>>,
    channels: Vec<Arc<SequencingChannel>>,
    underlying_throttle: Option<Arc<ThrottleTracker>>,
}

impl InstrumentDirectory {
    /// `num_channels` must be a power of two.
    #[must_use]
    pub fn new(num_channels: usize, underlying_throttle: Option<Arc<ThrottleTracker>>) -> Self {
        assert!(
            num_channels.is_power_of_two(),
            "number of channels must be a power of two"
        );
        let channels = (0..num_channels)
            .map(|i| Arc::new(SequencingChannel::new(ChannelId::new(i as u16))))
            .collect();
        Self {
            instruments: DashMap::new(),
            channels,
            underlying_throttle,
        }
    }

    #[must_use]
    pub fn channel_for(&self, instrument_sid: InstrumentSid) -> &Arc<SequencingChannel> {
        let index = (instrument_sid.value() as usize) & (self.channels.len() - 1);
        &self.channels[index]
    }

    /// Existing state for `instrument_sid`, created on first touch.
    #[must_use]
    pub fn get_or_create(&self, instrument_sid: InstrumentSid) -> Arc<InstrumentState> {
        self.instruments
            .entry(instrument_sid)
            .or_insert_with(|| {
                Arc::new(InstrumentState::new(
                    instrument_sid,
                    Arc::clone(self.channel_for(instrument_sid)),
                    self.underlying_throttle.clone(),
                ))
            })
            .clone()
    }

    #[must_use]
    pub fn get(&self, instrument_sid: InstrumentSid) -> Option<Arc<InstrumentState>> {
        self.instruments.get(&instrument_sid).map(|e| e.clone())
    }

    pub fn clear(&self) {
        for entry in self.instruments.iter() {
            entry.value().book().lock().clear();
        }
        for channel in &self.channels {
            channel.reset();
        }
        if let Some(tracker) = &self.underlying_throttle {
            tracker.reset();
        }
    }

    #[must_use]
    pub fn is_clear(&self) -> bool {
        let books_clear = self
            .instruments
            .iter()
            .all(|entry| entry.value().book().lock().is_clear());
        let channels_clear = self.channels.iter().all(|c| c.is_clear());
        let throttle_clear = self
            .underlying_throttle
            .as_ref()
            .map_or(true, |t| t.is_clear());
        books_clear && channels_clear && throttle_clear
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omx_core::{Price, Qty};

    #[test]
    fn test_channel_assignment_is_stable() {
        let directory = InstrumentDirectory::new(4, None);
        let a = directory.get_or_create(InstrumentSid::new(700));
        let b = directory.get_or_create(InstrumentSid::new(700));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.channel().id(), directory.channel_for(InstrumentSid::new(700)).id());
    }

    #[test]
    fn test_same_channel_for_same_hash_bucket() {
        let directory = InstrumentDirectory::new(4, None);
        // 1 and 5 land in the same bucket of 4 channels.
        let a = directory.get_or_create(InstrumentSid::new(1));
        let b = directory.get_or_create(InstrumentSid::new(5));
        assert_eq!(a.channel().id(), b.channel().id());
    }

    #[test]
    fn test_clear_resets_books_and_channels() {
        let directory = InstrumentDirectory::new(2, None);
        let state = directory.get_or_create(InstrumentSid::new(3));
        state.book().lock().new_buy_order(Price::new(100));
        state.book().lock().buy_trade(Qty::new(5));
        state.channel().next_seq();
        assert!(!directory.is_clear());

        directory.clear();
        assert!(directory.is_clear());
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_non_power_of_two_channels_panics() {
        let _ = InstrumentDirectory::new(3, None);
    }
}
