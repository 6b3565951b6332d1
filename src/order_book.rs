//! Order book — flat-array price levels with O(1) best bid/ask.
//!
//! Both sides are dense arrays indexed by price tick
//! (`(price - min_price) / tick_size`), so any level is one index computation
//! away and the best level is a cached index. The trade-off is memory
//! proportional to the tick count, which is bounded for a configured
//! instrument; a pathological range is a deployment error, not a correctness
//! concern.
//!
//! The order index and the per-level FIFOs are two views onto the same
//! arena-owned orders. Keeping them in lockstep is this module's job — see
//! [`OrderBook::validate`] for the audit used by the stress tests.

use crate::arena::OrderArena;
use crate::error::{BookAuditError, ConfigError};
use crate::order_index::OrderIndex;
use crate::price_level::PriceLevel;
use crate::types::{ArenaIndex, OrderId, OrderStatus, Price, Quantity, Side, NULL_INDEX};

/// "No level" sentinel for the cached best indices.
const INVALID_LEVEL: usize = usize::MAX;

/// Snapshot of one price level for depth queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DepthEntry {
    pub price: Price,
    pub quantity: Quantity,
    pub order_count: u32,
}

/// An order pulled off the book by a modify, ready for re-submission.
#[derive(Clone, Copy, Debug)]
pub struct DetachedOrder {
    pub index: ArenaIndex,
    pub old_price: Price,
    pub old_quantity: Quantity,
}

/// Why a modify could not detach its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModifyReject {
    NotFound,
    InvalidPrice,
    QuantityBelowFilled,
}

/// Per-instrument limit order book.
pub struct OrderBook {
    bid_levels: Vec<PriceLevel>,
    ask_levels: Vec<PriceLevel>,
    num_levels: usize,

    min_price: Price,
    max_price: Price,
    tick_size: Price,

    best_bid_idx: usize,
    best_ask_idx: usize,

    index: OrderIndex,
    order_count: usize,
}

impl OrderBook {
    /// Build a book covering `[min_price, max_price]` in `tick_size` steps,
    /// sized for `max_orders` live orders.
    pub fn new(
        min_price: Price,
        max_price: Price,
        tick_size: Price,
        max_orders: usize,
    ) -> Result<Self, ConfigError> {
        if tick_size <= 0 {
            return Err(ConfigError::InvalidTickSize(tick_size));
        }
        if min_price >= max_price {
            return Err(ConfigError::InvalidPriceRange {
                min: min_price,
                max: max_price,
            });
        }
        if (max_price - min_price) % tick_size != 0 {
            return Err(ConfigError::RangeNotTickAligned {
                min: min_price,
                max: max_price,
                tick: tick_size,
            });
        }
        if max_orders == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        let num_levels = ((max_price - min_price) / tick_size) as usize + 1;
        Ok(Self {
            bid_levels: vec![PriceLevel::EMPTY; num_levels],
            ask_levels: vec![PriceLevel::EMPTY; num_levels],
            num_levels,
            min_price,
            max_price,
            tick_size,
            best_bid_idx: INVALID_LEVEL,
            best_ask_idx: INVALID_LEVEL,
            index: OrderIndex::with_capacity(max_orders),
            order_count: 0,
        })
    }

    // ========================================================================
    // Price indexing
    // ========================================================================

    #[inline]
    fn price_to_index(&self, price: Price) -> usize {
        ((price - self.min_price) / self.tick_size) as usize
    }

    #[inline]
    fn index_to_price(&self, index: usize) -> Price {
        self.min_price + index as Price * self.tick_size
    }

    /// True when `price` is in range and on the tick grid.
    #[inline]
    pub fn is_valid_price(&self, price: Price) -> bool {
        price >= self.min_price
            && price <= self.max_price
            && (price - self.min_price) % self.tick_size == 0
    }

    // ========================================================================
    // Structural mutations
    // ========================================================================

    /// Place an order on the book. No matching happens here — the engine has
    /// already decided the order should rest.
    ///
    /// Fails on out-of-range or off-tick prices and on duplicate (or zero)
    /// order ids, leaving the book untouched.
    pub fn add(&mut self, arena: &mut OrderArena, order_idx: ArenaIndex) -> bool {
        let (order_id, side, price) = {
            let order = arena.get(order_idx);
            (order.order_id, order.side, order.price)
        };

        if !self.is_valid_price(price) {
            return false;
        }
        if !self.index.insert(order_id, order_idx) {
            return false; // duplicate id or id == 0
        }

        let idx = self.price_to_index(price);
        let levels = match side {
            Side::Buy => &mut self.bid_levels,
            Side::Sell => &mut self.ask_levels,
        };
        levels[idx].price = price;
        levels[idx].append(arena, order_idx);
        self.order_count += 1;

        match side {
            Side::Buy => {
                if self.best_bid_idx == INVALID_LEVEL || idx > self.best_bid_idx {
                    self.best_bid_idx = idx;
                }
            }
            Side::Sell => {
                if self.best_ask_idx == INVALID_LEVEL || idx < self.best_ask_idx {
                    self.best_ask_idx = idx;
                }
            }
        }

        arena.get_mut(order_idx).status = OrderStatus::Accepted;
        true
    }

    /// Cancel by id. Unlinks, drops the index entry, marks the order
    /// cancelled, and hands the arena slot back to the caller for disposal.
    pub fn cancel(&mut self, arena: &mut OrderArena, id: OrderId) -> Option<ArenaIndex> {
        let order_idx = self.index.find(id)?;
        self.remove(arena, order_idx);
        arena.get_mut(order_idx).status = OrderStatus::Cancelled;
        Some(order_idx)
    }

    /// Remove an order the engine has finished with (fill or STP). Identical
    /// structural effect to cancel; the caller owns disposal.
    pub fn remove(&mut self, arena: &mut OrderArena, order_idx: ArenaIndex) {
        let (order_id, side, price) = {
            let order = arena.get(order_idx);
            (order.order_id, order.side, order.price)
        };

        let idx = self.price_to_index(price);
        let levels = match side {
            Side::Buy => &mut self.bid_levels,
            Side::Sell => &mut self.ask_levels,
        };
        levels[idx].unlink(arena, order_idx);
        let emptied = levels[idx].is_empty();

        self.index.erase(order_id);
        self.order_count -= 1;

        if emptied {
            match side {
                Side::Buy if idx == self.best_bid_idx => self.rescan_best_bid(idx),
                Side::Sell if idx == self.best_ask_idx => self.rescan_best_ask(idx),
                _ => {}
            }
        }
    }

    /// Detach an order for modification: validate the new terms, unlink it,
    /// and drop it from the index. The engine re-submits the detached order
    /// under its new terms, so a modify always surrenders time priority —
    /// even when the price is unchanged.
    pub fn detach_for_modify(
        &mut self,
        arena: &mut OrderArena,
        id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
    ) -> Result<DetachedOrder, ModifyReject> {
        if !self.is_valid_price(new_price) {
            return Err(ModifyReject::InvalidPrice);
        }
        let order_idx = self.index.find(id).ok_or(ModifyReject::NotFound)?;

        let (old_price, old_quantity, filled) = {
            let order = arena.get(order_idx);
            (order.price, order.quantity, order.filled_quantity)
        };
        if new_quantity <= filled {
            return Err(ModifyReject::QuantityBelowFilled);
        }

        self.remove(arena, order_idx);
        Ok(DetachedOrder {
            index: order_idx,
            old_price,
            old_quantity,
        })
    }

    // ========================================================================
    // Lookup and best-price access
    // ========================================================================

    #[inline]
    pub fn find(&self, id: OrderId) -> Option<ArenaIndex> {
        self.index.find(id)
    }

    #[inline]
    pub fn contains(&self, id: OrderId) -> bool {
        self.index.contains(id)
    }

    /// Best bid level (highest bid with resting orders).
    #[inline]
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        (self.best_bid_idx != INVALID_LEVEL).then(|| &self.bid_levels[self.best_bid_idx])
    }

    /// Best ask level (lowest ask with resting orders).
    #[inline]
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        (self.best_ask_idx != INVALID_LEVEL).then(|| &self.ask_levels[self.best_ask_idx])
    }

    /// Cached best-level index for a side (engine use).
    #[inline]
    pub fn best_index(&self, side: Side) -> Option<usize> {
        let idx = match side {
            Side::Buy => self.best_bid_idx,
            Side::Sell => self.best_ask_idx,
        };
        (idx != INVALID_LEVEL).then_some(idx)
    }

    /// Borrow a level by side and array index (engine use).
    #[inline]
    pub fn level(&self, side: Side, idx: usize) -> &PriceLevel {
        match side {
            Side::Buy => &self.bid_levels[idx],
            Side::Sell => &self.ask_levels[idx],
        }
    }

    #[inline]
    pub(crate) fn level_mut(&mut self, side: Side, idx: usize) -> &mut PriceLevel {
        match side {
            Side::Buy => &mut self.bid_levels[idx],
            Side::Sell => &mut self.ask_levels[idx],
        }
    }

    /// `best_ask - best_bid`, when both sides have liquidity.
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Midpoint of the touch, when both sides have liquidity.
    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / 2),
            _ => None,
        }
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.order_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    #[inline]
    pub fn min_price(&self) -> Price {
        self.min_price
    }

    #[inline]
    pub fn max_price(&self) -> Price {
        self.max_price
    }

    #[inline]
    pub fn tick_size(&self) -> Price {
        self.tick_size
    }

    #[inline]
    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    // ========================================================================
    // Aggregate queries
    // ========================================================================

    /// Total resting quantity on `side` at prices that would cross
    /// `limit_price` — the FOK feasibility input.
    ///
    /// The limit is clamped to the book's range on the far side. If the limit
    /// does not reach the side's best level, there is nothing crossable and
    /// the result is zero.
    pub fn available_quantity(&self, side: Side, limit_price: Price) -> Quantity {
        let mut total = 0;

        match side {
            Side::Sell => {
                // Aggressor buys: sum asks from the best upward to the limit.
                let Some(best) = self.best_index(Side::Sell) else {
                    return 0;
                };
                let clamped = limit_price.min(self.max_price);
                if clamped < self.index_to_price(best) {
                    return 0;
                }
                let max_idx = self.price_to_index(clamped);
                for level in &self.ask_levels[best..=max_idx] {
                    total += level.total_quantity;
                }
            }
            Side::Buy => {
                // Aggressor sells: sum bids from the best downward to the limit.
                let Some(best) = self.best_index(Side::Buy) else {
                    return 0;
                };
                let clamped = limit_price.max(self.min_price);
                if clamped > self.index_to_price(best) {
                    return 0;
                }
                let min_idx = self.price_to_index(clamped);
                for level in &self.bid_levels[min_idx..=best] {
                    total += level.total_quantity;
                }
            }
        }

        total
    }

    /// Fill `out` with non-empty levels walking outward from the best.
    /// Returns the number of entries written. Bids come back highest-first,
    /// asks lowest-first.
    pub fn depth(&self, side: Side, out: &mut [DepthEntry]) -> usize {
        if out.is_empty() {
            return 0;
        }
        let Some(best) = self.best_index(side) else {
            return 0;
        };

        let mut count = 0;
        match side {
            Side::Buy => {
                for i in (0..=best).rev() {
                    if !self.bid_levels[i].is_empty() {
                        out[count] = DepthEntry {
                            price: self.bid_levels[i].price,
                            quantity: self.bid_levels[i].total_quantity,
                            order_count: self.bid_levels[i].order_count,
                        };
                        count += 1;
                        if count == out.len() {
                            break;
                        }
                    }
                }
            }
            Side::Sell => {
                for i in best..self.num_levels {
                    if !self.ask_levels[i].is_empty() {
                        out[count] = DepthEntry {
                            price: self.ask_levels[i].price,
                            quantity: self.ask_levels[i].total_quantity,
                            order_count: self.ask_levels[i].order_count,
                        };
                        count += 1;
                        if count == out.len() {
                            break;
                        }
                    }
                }
            }
        }
        count
    }

    // ========================================================================
    // Best-index maintenance
    // ========================================================================

    /// After the best bid level empties, scan downward for the next one.
    fn rescan_best_bid(&mut self, emptied_idx: usize) {
        for i in (0..emptied_idx).rev() {
            if !self.bid_levels[i].is_empty() {
                self.best_bid_idx = i;
                return;
            }
        }
        self.best_bid_idx = INVALID_LEVEL;
    }

    /// After the best ask level empties, scan upward for the next one.
    fn rescan_best_ask(&mut self, emptied_idx: usize) {
        for i in emptied_idx + 1..self.num_levels {
            if !self.ask_levels[i].is_empty() {
                self.best_ask_idx = i;
                return;
            }
        }
        self.best_ask_idx = INVALID_LEVEL;
    }

    // ========================================================================
    // Self-audit
    // ========================================================================

    /// Verify the book's structural invariants: well-formed FIFOs, level
    /// aggregates matching their lists, best indices matching a full scan,
    /// and the order index in lockstep with the levels. O(levels + orders) —
    /// for tests and debugging, never the hot path.
    pub fn validate(&self, arena: &OrderArena) -> Result<(), BookAuditError> {
        let mut reachable = 0usize;

        for levels in [&self.bid_levels, &self.ask_levels] {
            for level in levels.iter().filter(|l| !l.is_empty()) {
                let mut forward = Vec::new();
                let mut qty_sum: Quantity = 0;
                let mut cursor = level.head;
                while cursor != NULL_INDEX {
                    forward.push(cursor);
                    let order = arena.get(cursor);
                    qty_sum += order.remaining_quantity();
                    if self.index.find(order.order_id) != Some(cursor) {
                        return Err(BookAuditError::OrphanedOrder(order.order_id));
                    }
                    cursor = order.next;
                }

                let mut backward = Vec::new();
                let mut cursor = level.tail;
                while cursor != NULL_INDEX {
                    backward.push(cursor);
                    cursor = arena.get(cursor).prev;
                }
                backward.reverse();
                if forward != backward {
                    return Err(BookAuditError::BrokenLinks { price: level.price });
                }

                if qty_sum != level.total_quantity {
                    return Err(BookAuditError::LevelQuantityMismatch {
                        price: level.price,
                        recorded: level.total_quantity,
                        actual: qty_sum,
                    });
                }
                if forward.len() as u32 != level.order_count {
                    return Err(BookAuditError::LevelCountMismatch {
                        price: level.price,
                        recorded: level.order_count,
                        actual: forward.len() as u32,
                    });
                }
                reachable += forward.len();
            }
        }

        let scanned_bid = self.bid_levels.iter().rposition(|l| !l.is_empty());
        let cached_bid = (self.best_bid_idx != INVALID_LEVEL).then_some(self.best_bid_idx);
        if scanned_bid != cached_bid {
            return Err(BookAuditError::StaleBestBid {
                cached: cached_bid,
                actual: scanned_bid,
            });
        }

        let scanned_ask = self.ask_levels.iter().position(|l| !l.is_empty());
        let cached_ask = (self.best_ask_idx != INVALID_LEVEL).then_some(self.best_ask_idx);
        if scanned_ask != cached_ask {
            return Err(BookAuditError::StaleBestAsk {
                cached: cached_ask,
                actual: scanned_ask,
            });
        }

        if reachable != self.index.len() || reachable != self.order_count {
            return Err(BookAuditError::IndexDesync {
                index_size: self.index.len(),
                reachable,
            });
        }

        Ok(())
    }

    /// Flat digest of the book state, used by rejected-command tests to prove
    /// a command made zero structural mutations.
    pub fn snapshot_digest(&self, arena: &OrderArena) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        for levels in [&self.bid_levels, &self.ask_levels] {
            for level in levels.iter().filter(|l| !l.is_empty()) {
                level.price.hash(&mut hasher);
                level.total_quantity.hash(&mut hasher);
                level.order_count.hash(&mut hasher);
                let mut cursor = level.head;
                while cursor != NULL_INDEX {
                    let order = arena.get(cursor);
                    order.order_id.hash(&mut hasher);
                    order.remaining_quantity().hash(&mut hasher);
                    cursor = order.next;
                }
            }
        }
        self.order_count.hash(&mut hasher);
        hasher.finish()
    }
}
