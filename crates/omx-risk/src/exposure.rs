//! Purchasing-power ledger.
//!
//! A single mutable ledger of remaining purchasing power, decremented
//! optimistically on every buy admission and incremented back on any
//! outcome that reduces the resting quantity. Reads and writes come from
//! the admission thread while active and from the recovery listener
//! while recovering; the lifecycle machine guarantees only one phase is
//! live at a time, atomics cover the remaining cross-phase visibility.

use std::sync::atomic::{AtomicI64, Ordering};

use tracing::{info, warn};

use crate::error::{RiskError, RiskResult};

/// Remaining purchasing power in integer notional units.
#[derive(Debug)]
pub struct Exposure {
    initial: AtomicI64,
    current: AtomicI64,
}

impl Exposure {
    #[must_use]
    pub fn new(initial: i64) -> Self {
        Self {
            initial: AtomicI64::new(initial),
            current: AtomicI64::new(initial),
        }
    }

    #[must_use]
    pub fn purchasing_power(&self) -> i64 {
        self.current.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn initial_purchasing_power(&self) -> i64 {
        self.initial.load(Ordering::Acquire)
    }

    /// Whether a buy of `notional` fits within remaining power.
    #[must_use]
    pub fn ok_to_buy(&self, notional: i64) -> bool {
        notional <= self.purchasing_power()
    }

    /// Reserve `notional` on buy admission.
    pub fn dec_purchasing_power(&self, notional: i64) {
        self.current.fetch_sub(notional, Ordering::AcqRel);
    }

    /// Release `notional` back on a reservation-reversing outcome.
    ///
    /// Saturates at the initial value: over-crediting would let exposure
    /// exceed the configured limit, so the excess is dropped and logged.
    pub fn inc_purchasing_power(&self, notional: i64) {
        let initial = self.initial.load(Ordering::Acquire);
        let after = self.current.fetch_add(notional, Ordering::AcqRel) + notional;
        if after > initial {
            warn!(
                after,
                initial, "Purchasing power release exceeded initial, clamping"
            );
            self.current.store(initial, Ordering::Release);
        }
    }

    /// Replace the initial purchasing power, preserving the currently
    /// outstanding reservation.
    pub fn update_initial(&self, new_initial: i64) -> RiskResult<()> {
        if new_initial < 0 {
            return Err(RiskError::InvalidPurchasingPower(new_initial));
        }
        let old_initial = self.initial.swap(new_initial, Ordering::AcqRel);
        let old_current = self.current.load(Ordering::Acquire);
        let reserved = old_initial - old_current;
        self.current.store(new_initial - reserved, Ordering::Release);
        info!(
            old_initial,
            new_initial, reserved, "Updated purchasing power"
        );
        Ok(())
    }

    pub fn clear(&self) {
        let initial = self.initial.load(Ordering::Acquire);
        self.current.store(initial, Ordering::Release);
    }

    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.purchasing_power() == self.initial_purchasing_power()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_release() {
        let exposure = Exposure::new(1_000_000);
        assert!(exposure.ok_to_buy(100_000));

        exposure.dec_purchasing_power(100_000);
        assert_eq!(exposure.purchasing_power(), 900_000);
        assert!(!exposure.is_clear());

        exposure.inc_purchasing_power(100_000);
        assert_eq!(exposure.purchasing_power(), 1_000_000);
        assert!(exposure.is_clear());
    }

    #[test]
    fn test_ok_to_buy_boundary() {
        let exposure = Exposure::new(100);
        assert!(exposure.ok_to_buy(100));
        assert!(!exposure.ok_to_buy(101));
    }

    #[test]
    fn test_release_clamps_at_initial() {
        let exposure = Exposure::new(1_000);
        exposure.dec_purchasing_power(500);
        exposure.inc_purchasing_power(800);
        assert_eq!(exposure.purchasing_power(), 1_000);
    }

    #[test]
    fn test_update_initial_preserves_reservation() {
        let exposure = Exposure::new(1_000_000);
        exposure.dec_purchasing_power(250_000);

        exposure.update_initial(2_000_000).unwrap();
        assert_eq!(exposure.initial_purchasing_power(), 2_000_000);
        assert_eq!(exposure.purchasing_power(), 1_750_000);
    }

    #[test]
    fn test_update_initial_rejects_negative() {
        let exposure = Exposure::new(1_000);
        assert!(exposure.update_initial(-1).is_err());
    }

    #[test]
    fn test_clear_restores_initial() {
        let exposure = Exposure::new(5_000);
        exposure.dec_purchasing_power(4_000);
        exposure.clear();
        assert!(exposure.is_clear());
        assert_eq!(exposure.purchasing_power(), 5_000);
    }
}
