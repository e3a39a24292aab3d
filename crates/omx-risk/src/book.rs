//! Validation order book.
//!
//! An order book built purely for pre-trade validation: it keeps no
//! references to individual orders, only a per-price order count per
//! side plus a long-position counter. Enough to answer "would this
//! order cross my own resting orders?" and "do I hold enough to sell
//! this?" and nothing more.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use tracing::{error, warn};

use omx_core::{InstrumentSid, Price, Qty, RejectType, Side};

/// Long position counter, written by the reconciliation side and read
/// during admission.
#[derive(Debug, Default)]
pub struct Position {
    qty: AtomicI64,
}

impl Position {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn qty(&self) -> i64 {
        self.qty.load(Ordering::Acquire)
    }

    /// Whether the sellable position covers `qty`.
    #[must_use]
    pub fn ok_to_sell(&self, qty: Qty) -> bool {
        self.qty() >= qty.value()
    }

    pub fn inc(&self, qty: Qty) {
        self.qty.fetch_add(qty.value(), Ordering::AcqRel);
    }

    pub fn dec(&self, qty: Qty) {
        self.qty.fetch_sub(qty.value(), Ordering::AcqRel);
    }

    pub fn clear(&self) {
        self.qty.store(0, Ordering::Release);
    }

    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.qty() == 0
    }
}

/// Per-instrument validation book: price → resting order count per
/// side, empties removed, plus the position counter.
#[derive(Debug)]
pub struct ValidationOrderBook {
    instrument_sid: InstrumentSid,
    bid_levels: BTreeMap<i64, u32>,
    ask_levels: BTreeMap<i64, u32>,
    position: Position,
}

impl ValidationOrderBook {
    #[must_use]
    pub fn new(instrument_sid: InstrumentSid) -> Self {
        Self {
            instrument_sid,
            bid_levels: BTreeMap::new(),
            ask_levels: BTreeMap::new(),
            position: Position::new(),
        }
    }

    #[must_use]
    pub fn instrument_sid(&self) -> InstrumentSid {
        self.instrument_sid
    }

    #[must_use]
    pub fn position(&self) -> &Position {
        &self.position
    }

    #[must_use]
    pub fn best_bid(&self) -> Option<Price> {
        self.bid_levels.keys().next_back().copied().map(Price::new)
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<Price> {
        self.ask_levels.keys().next().copied().map(Price::new)
    }

    /// Crossing check for a new buy.
    pub fn is_new_buy_order_ok(&self, price: Price, _qty: Qty) -> Result<(), RejectType> {
        if let Some(best_ask) = self.best_ask() {
            if price >= best_ask {
                error!(
                    instrument_sid = %self.instrument_sid,
                    buy_price = %price,
                    best_resting_sell = %best_ask,
                    "Detected crossed"
                );
                return Err(RejectType::Crossed);
            }
        }
        Ok(())
    }

    /// Crossing and position check for a new sell.
    pub fn is_new_sell_order_ok(&self, price: Price, qty: Qty) -> Result<(), RejectType> {
        if let Some(best_bid) = self.best_bid() {
            if price <= best_bid {
                error!(
                    instrument_sid = %self.instrument_sid,
                    sell_price = %price,
                    best_resting_buy = %best_bid,
                    "Detected crossed"
                );
                return Err(RejectType::Crossed);
            }
        }
        if !self.position.ok_to_sell(qty) {
            return Err(RejectType::InsufficientLongPosition);
        }
        Ok(())
    }

    /// Register an admitted buy at `price`.
    pub fn new_buy_order(&mut self, price: Price) {
        *self.bid_levels.entry(price.value()).or_insert(0) += 1;
    }

    /// Register an admitted sell at `price`, reserving `qty` from the
    /// sellable position.
    pub fn new_sell_order(&mut self, price: Price, qty: Qty) {
        self.position.dec(qty);
        *self.ask_levels.entry(price.value()).or_insert(0) += 1;
    }

    fn dec_level(levels: &mut BTreeMap<i64, u32>, price: Price, instrument_sid: InstrumentSid) {
        match levels.get_mut(&price.value()) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    levels.remove(&price.value());
                }
            }
            None => {
                // Terminal evidence for a level we never registered.
                warn!(
                    instrument_sid = %instrument_sid,
                    price = %price,
                    "Order completion for an untracked price level"
                );
            }
        }
    }

    pub fn buy_order_filled(&mut self, price: Price) {
        Self::dec_level(&mut self.bid_levels, price, self.instrument_sid);
    }

    pub fn sell_order_filled(&mut self, price: Price) {
        Self::dec_level(&mut self.ask_levels, price, self.instrument_sid);
    }

    pub fn buy_order_cancelled(&mut self, price: Price) {
        Self::dec_level(&mut self.bid_levels, price, self.instrument_sid);
    }

    /// Sell terminal non-fill: the reset quantity goes back to the
    /// sellable position.
    pub fn sell_order_cancelled(&mut self, price: Price, reset_qty: Qty) {
        self.position.inc(reset_qty);
        Self::dec_level(&mut self.ask_levels, price, self.instrument_sid);
    }

    pub fn buy_order_expired(&mut self, price: Price) {
        Self::dec_level(&mut self.bid_levels, price, self.instrument_sid);
    }

    pub fn sell_order_expired(&mut self, price: Price, reset_qty: Qty) {
        self.position.inc(reset_qty);
        Self::dec_level(&mut self.ask_levels, price, self.instrument_sid);
    }

    pub fn buy_order_rejected(&mut self, price: Price) {
        Self::dec_level(&mut self.bid_levels, price, self.instrument_sid);
    }

    pub fn sell_order_rejected(&mut self, price: Price, reset_qty: Qty) {
        self.position.inc(reset_qty);
        Self::dec_level(&mut self.ask_levels, price, self.instrument_sid);
    }

    /// A buy execution increases the long position.
    pub fn buy_trade(&mut self, exec_qty: Qty) {
        self.position.inc(exec_qty);
    }

    /// A sell execution already reserved its quantity at admission.
    pub fn sell_trade(&mut self, _exec_qty: Qty) {}

    pub fn buy_trade_cancelled(&mut self, exec_qty: Qty) {
        self.position.dec(exec_qty);
    }

    pub fn sell_trade_cancelled(&mut self, exec_qty: Qty) {
        self.position.inc(exec_qty);
    }

    /// Seed an externally held position (recovery epilogue).
    pub fn add_existing_position(&mut self, qty: Qty) {
        self.position.inc(qty);
    }

    /// Re-register a resting level recovered from an execution report.
    /// The position is not touched; holdings are loaded separately at
    /// recovery exit.
    pub fn restore_resting_order(&mut self, side: Side, price: Price) {
        let levels = match side {
            Side::Buy => &mut self.bid_levels,
            Side::Sell => &mut self.ask_levels,
        };
        *levels.entry(price.value()).or_insert(0) += 1;
    }

    pub fn clear(&mut self) {
        self.position.clear();
        self.bid_levels.clear();
        self.ask_levels.clear();
    }

    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.position.is_clear() && self.bid_levels.is_empty() && self.ask_levels.is_empty()
    }
}
