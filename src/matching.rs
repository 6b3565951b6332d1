//! Matching engine — price-time-priority crossing for one instrument.
//!
//! The engine owns the book and the order arena and is the only code that
//! mutates either. An incoming order walks the opposite side best-level-first
//! and each level head-first, generating one [`Trade`] per fill. Order-type
//! semantics (Limit, Market, IOC, FOK, GTC, Iceberg) and self-trade
//! prevention live in the loop; the book stays a pure data structure.
//!
//! Zero heap allocation per submission: trades are returned in a fixed-size
//! [`MatchResult`] on the caller's stack.

use crate::arena::OrderArena;
use crate::message::Trade;
use crate::order_book::OrderBook;
use crate::types::{ArenaIndex, OrderId, OrderStatus, OrderType, Price, Quantity, Side, Timestamp};

/// Upper bound on fills per submission. A submission that would exceed it
/// stops early with a partial fill; books deep enough to hit this need a
/// longer buffer, which is a deployment knob rather than a correctness issue.
pub const MAX_TRADES_PER_MATCH: usize = 64;

/// Terminal disposition of one submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchStatus {
    /// Fully filled; the order is gone.
    Filled,
    /// Some fills; the remainder rests on the book.
    PartialFill,
    /// No fills; the order rests on the book.
    Resting,
    /// Market/IOC remainder cancelled, or STP cancelled the aggressor.
    Cancelled,
    /// Validation or feasibility failure; the book was not touched.
    Rejected,
    /// Self-trade prevention cancelled the aggressive order.
    SelfTradePrevented,
    /// Modify that neither crossed nor failed — resting at its new terms.
    Modified,
}

/// Self-trade prevention policy, fixed at engine construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StpMode {
    /// Allow self-trades (no prevention).
    #[default]
    None,
    /// Cancel the incoming order; resting liquidity is untouched.
    CancelNewest,
    /// Cancel the resting order and keep matching.
    CancelOldest,
    /// Cancel both sides.
    CancelBoth,
}

/// Outcome of one submission — stack-resident, no heap.
#[derive(Clone, Copy, Debug)]
pub struct MatchResult {
    pub status: MatchStatus,
    trades: [Trade; MAX_TRADES_PER_MATCH],
    trade_count: u32,
    pub filled_quantity: Quantity,
    pub remaining_quantity: Quantity,
}

impl MatchResult {
    fn new() -> Self {
        Self {
            status: MatchStatus::Rejected,
            trades: [Trade::zeroed(); MAX_TRADES_PER_MATCH],
            trade_count: 0,
            filled_quantity: 0,
            remaining_quantity: 0,
        }
    }

    fn rejected() -> Self {
        Self::new()
    }

    /// Trades generated by this submission, in execution order.
    #[inline]
    pub fn trades(&self) -> &[Trade] {
        &self.trades[..self.trade_count as usize]
    }

    #[inline]
    pub fn trade_count(&self) -> u32 {
        self.trade_count
    }

    #[inline]
    fn push_trade(&mut self, trade: Trade) {
        debug_assert!((self.trade_count as usize) < MAX_TRADES_PER_MATCH);
        self.trades[self.trade_count as usize] = trade;
        self.trade_count += 1;
    }
}

/// Price-time-priority matcher for a single instrument.
pub struct MatchingEngine {
    book: OrderBook,
    arena: OrderArena,
    stp_mode: StpMode,
    trade_counter: u64,
}

impl MatchingEngine {
    /// Assemble an engine from its book and arena.
    pub fn new(book: OrderBook, arena: OrderArena, stp_mode: StpMode) -> Self {
        Self {
            book,
            arena,
            stp_mode,
            trade_counter: 0,
        }
    }

    #[inline]
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    #[inline]
    pub fn arena(&self) -> &OrderArena {
        &self.arena
    }

    /// Mutable arena access for the gateway's acquire/populate step.
    #[inline]
    pub fn arena_mut(&mut self) -> &mut OrderArena {
        &mut self.arena
    }

    #[inline]
    pub fn stp_mode(&self) -> StpMode {
        self.stp_mode
    }

    /// Total trades executed since construction (also the last trade id).
    #[inline]
    pub fn total_trade_count(&self) -> u64 {
        self.trade_counter
    }

    /// Fault in the arena pages before the hot path starts.
    pub fn warm_up(&mut self) {
        self.arena.warm_up();
    }

    // ========================================================================
    // Submit
    // ========================================================================

    /// Match an order against the book and dispose of it by type.
    ///
    /// The order must have been acquired from this engine's arena. Fully
    /// filled, cancelled, and rejected orders are released here; resting
    /// remainders are added to the book. After this call the index must not
    /// be used by the caller.
    pub fn submit(&mut self, order_idx: ArenaIndex) -> MatchResult {
        let mut result = MatchResult::new();

        let (order_id, order_type, side, price, quantity) = {
            let o = self.arena.get(order_idx);
            (o.order_id, o.order_type, o.side, o.price, o.quantity)
        };
        result.remaining_quantity = self.arena.get(order_idx).remaining_quantity();

        // Engine-level validation: tick-aligned in-range price (market orders
        // carry no price), non-zero id, no duplicate of a resting id.
        if order_type != OrderType::Market && !self.book.is_valid_price(price) {
            return self.reject(order_idx, result);
        }
        if order_id == 0 || self.book.contains(order_id) {
            return self.reject(order_idx, result);
        }

        // FOK feasibility: reject before touching the book.
        if order_type == OrderType::Fok {
            let available = self.book.available_quantity(side.opposite(), price);
            if available < quantity {
                return self.reject(order_idx, result);
            }
        }

        let stp_cancelled = self.match_order(order_idx, &mut result);
        result.remaining_quantity = self.arena.get(order_idx).remaining_quantity();

        if stp_cancelled {
            self.arena.release(order_idx);
            return result;
        }

        if result.remaining_quantity == 0 {
            result.status = MatchStatus::Filled;
            self.arena.get_mut(order_idx).status = OrderStatus::Filled;
            self.arena.release(order_idx);
        } else if matches!(order_type, OrderType::Market | OrderType::Ioc) {
            result.status = MatchStatus::Cancelled;
            self.arena.get_mut(order_idx).status = OrderStatus::Cancelled;
            self.arena.release(order_idx);
        } else if order_type == OrderType::Fok {
            // Feasibility guaranteed a full fill; only the trade-count bound
            // can land here. Reject rather than rest a fill-or-kill.
            result.status = MatchStatus::Rejected;
            self.arena.get_mut(order_idx).status = OrderStatus::Rejected;
            self.arena.release(order_idx);
        } else {
            result.status = if result.filled_quantity > 0 {
                MatchStatus::PartialFill
            } else {
                MatchStatus::Resting
            };
            let added = self.book.add(&mut self.arena, order_idx);
            debug_assert!(added, "rest after validation cannot fail");
            if result.status == MatchStatus::PartialFill {
                self.arena.get_mut(order_idx).status = OrderStatus::PartialFill;
            }
        }

        result
    }

    /// Cancel a resting order. Releases the arena slot on success.
    pub fn cancel(&mut self, id: OrderId) -> bool {
        match self.book.cancel(&mut self.arena, id) {
            Some(order_idx) => {
                self.arena.release(order_idx);
                true
            }
            None => false,
        }
    }

    /// Modify a resting order: detach, rewrite terms, re-submit.
    ///
    /// The order loses time priority even when the price is unchanged. If the
    /// new price crosses, fills execute immediately; `Modified` is returned
    /// only when no fills occurred.
    pub fn modify(
        &mut self,
        id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
        new_timestamp: Timestamp,
    ) -> MatchResult {
        let detached =
            match self
                .book
                .detach_for_modify(&mut self.arena, id, new_price, new_quantity)
            {
                Ok(d) => d,
                Err(_) => return MatchResult::rejected(),
            };

        {
            let order = self.arena.get_mut(detached.index);
            order.price = new_price;
            order.quantity = new_quantity;
            order.timestamp = new_timestamp;
            order.visible_quantity = if order.order_type == OrderType::Iceberg {
                let remaining = new_quantity - order.filled_quantity;
                order.filled_quantity + order.iceberg_slice_qty.min(remaining)
            } else {
                new_quantity
            };
        }

        let mut result = self.submit(detached.index);
        if result.status == MatchStatus::Resting && result.filled_quantity == 0 {
            result.status = MatchStatus::Modified;
        }
        result
    }

    // ========================================================================
    // Core matching loop
    // ========================================================================

    /// Walk opposite-side levels best-first, filling against each FIFO.
    /// Returns true when STP cancelled the aggressive order.
    fn match_order(&mut self, order_idx: ArenaIndex, result: &mut MatchResult) -> bool {
        loop {
            let (remaining, side, order_type, price, participant) = {
                let o = self.arena.get(order_idx);
                (
                    o.remaining_quantity(),
                    o.side,
                    o.order_type,
                    o.price,
                    o.participant_id,
                )
            };
            if remaining == 0 || result.trade_count as usize >= MAX_TRADES_PER_MATCH {
                return false;
            }

            let opposite = side.opposite();
            let Some(level_idx) = self.book.best_index(opposite) else {
                return false;
            };
            let level_price = self.book.level(opposite, level_idx).price;
            let crosses = order_type == OrderType::Market
                || match side {
                    Side::Buy => price >= level_price,
                    Side::Sell => price <= level_price,
                };
            if !crosses {
                return false;
            }

            // Walk this level head-first until it empties, the aggressor is
            // done, or the trade bound is hit.
            loop {
                let agg_remaining = self.arena.get(order_idx).remaining_quantity();
                if agg_remaining == 0 || result.trade_count as usize >= MAX_TRADES_PER_MATCH {
                    return false;
                }

                let level = self.book.level(opposite, level_idx);
                if level.is_empty() {
                    break; // outer loop re-fetches the next best level
                }
                let resting_idx = level.front();

                if self.stp_mode != StpMode::None
                    && participant == self.arena.get(resting_idx).participant_id
                {
                    match self.stp_mode {
                        StpMode::CancelNewest => {
                            self.arena.get_mut(order_idx).status = OrderStatus::Cancelled;
                            result.status = MatchStatus::SelfTradePrevented;
                            return true;
                        }
                        StpMode::CancelOldest => {
                            self.book.remove(&mut self.arena, resting_idx);
                            self.arena.get_mut(resting_idx).status = OrderStatus::Cancelled;
                            self.arena.release(resting_idx);
                            continue;
                        }
                        StpMode::CancelBoth => {
                            self.book.remove(&mut self.arena, resting_idx);
                            self.arena.get_mut(resting_idx).status = OrderStatus::Cancelled;
                            self.arena.release(resting_idx);
                            self.arena.get_mut(order_idx).status = OrderStatus::Cancelled;
                            result.status = MatchStatus::SelfTradePrevented;
                            return true;
                        }
                        StpMode::None => unreachable!(),
                    }
                }

                let fill = agg_remaining.min(self.arena.get(resting_idx).remaining_visible());
                debug_assert!(fill > 0, "resting order with no visible quantity");
                self.execute_fill(order_idx, resting_idx, fill, opposite, level_idx, result);

                let (resting_remaining, resting_visible, resting_type) = {
                    let r = self.arena.get(resting_idx);
                    (
                        r.remaining_quantity(),
                        r.remaining_visible(),
                        r.order_type,
                    )
                };

                if resting_remaining == 0 {
                    self.book.remove(&mut self.arena, resting_idx);
                    self.arena.release(resting_idx);
                } else if resting_type == OrderType::Iceberg && resting_visible == 0 {
                    // Slice exhausted: replenish and re-queue at the back —
                    // the iceberg yields time priority at its own price.
                    self.book.remove(&mut self.arena, resting_idx);
                    self.replenish_iceberg(resting_idx);
                    let re_added = self.book.add(&mut self.arena, resting_idx);
                    debug_assert!(re_added);
                }
            }
        }
    }

    /// Execute one fill: adjust level depth, fill counters, statuses, and
    /// record the trade at the resting order's price.
    fn execute_fill(
        &mut self,
        agg_idx: ArenaIndex,
        resting_idx: ArenaIndex,
        fill: Quantity,
        resting_side: Side,
        level_idx: usize,
        result: &mut MatchResult,
    ) {
        // Level depth first, so the book view is consistent mid-walk.
        self.book
            .level_mut(resting_side, level_idx)
            .subtract_quantity(fill);

        let (agg_side, agg_id, timestamp) = {
            let agg = self.arena.get_mut(agg_idx);
            agg.filled_quantity += fill;
            agg.status = if agg.remaining_quantity() == 0 {
                OrderStatus::Filled
            } else {
                OrderStatus::PartialFill
            };
            (agg.side, agg.order_id, agg.timestamp)
        };

        let (resting_id, resting_price) = {
            let resting = self.arena.get_mut(resting_idx);
            resting.filled_quantity += fill;
            resting.status = if resting.remaining_quantity() == 0 {
                OrderStatus::Filled
            } else {
                OrderStatus::PartialFill
            };
            (resting.order_id, resting.price)
        };

        self.trade_counter += 1;
        let (buy_order_id, sell_order_id) = match agg_side {
            Side::Buy => (agg_id, resting_id),
            Side::Sell => (resting_id, agg_id),
        };
        result.push_trade(Trade {
            trade_id: self.trade_counter,
            buy_order_id,
            sell_order_id,
            price: resting_price,
            quantity: fill,
            timestamp,
        });
        result.filled_quantity += fill;
    }

    /// Slide the iceberg's visible window forward over its hidden inventory.
    /// `visible_quantity` is cumulative (filled + live slice), so
    /// `remaining_visible` lands exactly on the new slice.
    fn replenish_iceberg(&mut self, order_idx: ArenaIndex) {
        let order = self.arena.get_mut(order_idx);
        let new_visible = order.iceberg_slice_qty.min(order.remaining_quantity());
        order.visible_quantity = order.filled_quantity + new_visible;
    }

    fn reject(&mut self, order_idx: ArenaIndex, mut result: MatchResult) -> MatchResult {
        self.arena.get_mut(order_idx).status = OrderStatus::Rejected;
        self.arena.release(order_idx);
        result.status = MatchStatus::Rejected;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Order, TimeInForce, PRICE_SCALE};

    const MIN: Price = 40_000 * PRICE_SCALE;
    const MAX: Price = 60_000 * PRICE_SCALE;
    const TICK: Price = PRICE_SCALE;
    const PX: Price = 50_000 * PRICE_SCALE;

    fn engine(stp: StpMode) -> MatchingEngine {
        let book = OrderBook::new(MIN, MAX, TICK, 4096).unwrap();
        let arena = OrderArena::new(4096);
        MatchingEngine::new(book, arena, stp)
    }

    fn push(
        engine: &mut MatchingEngine,
        id: OrderId,
        participant: u32,
        side: Side,
        order_type: OrderType,
        price: Price,
        qty: Quantity,
    ) -> MatchResult {
        let idx = engine.arena_mut().acquire().unwrap();
        let o = engine.arena_mut().get_mut(idx);
        *o = Order::empty();
        o.order_id = id;
        o.participant_id = participant;
        o.side = side;
        o.order_type = order_type;
        o.time_in_force = TimeInForce::Gtc;
        o.price = price;
        o.quantity = qty;
        o.visible_quantity = qty;
        engine.submit(idx)
    }

    fn push_iceberg(
        engine: &mut MatchingEngine,
        id: OrderId,
        side: Side,
        price: Price,
        qty: Quantity,
        slice: Quantity,
    ) -> MatchResult {
        let idx = engine.arena_mut().acquire().unwrap();
        let o = engine.arena_mut().get_mut(idx);
        *o = Order::empty();
        o.order_id = id;
        o.participant_id = 1;
        o.side = side;
        o.order_type = OrderType::Iceberg;
        o.price = price;
        o.quantity = qty;
        o.visible_quantity = slice.min(qty);
        o.iceberg_slice_qty = slice;
        engine.submit(idx)
    }

    #[test]
    fn limit_order_rests_when_no_cross() {
        let mut e = engine(StpMode::None);
        let r = push(&mut e, 1, 1, Side::Buy, OrderType::Limit, PX, 100);
        assert_eq!(r.status, MatchStatus::Resting);
        assert_eq!(r.trade_count(), 0);
        assert_eq!(e.book().best_bid().unwrap().price, PX);
        e.book().validate(e.arena()).unwrap();
    }

    #[test]
    fn full_match_at_passive_price() {
        let mut e = engine(StpMode::None);
        push(&mut e, 1, 1, Side::Sell, OrderType::Limit, PX, 100);

        let r = push(&mut e, 2, 2, Side::Buy, OrderType::Limit, PX + 2 * TICK, 100);
        assert_eq!(r.status, MatchStatus::Filled);
        assert_eq!(r.trades().len(), 1);
        let t = r.trades()[0];
        assert_eq!(t.price, PX, "trade prices at the resting order's price");
        assert_eq!(t.buy_order_id, 2);
        assert_eq!(t.sell_order_id, 1);
        assert_eq!(t.quantity, 100);
        assert_eq!(t.trade_id, 1);

        assert!(e.book().is_empty());
        assert!(e.arena().is_empty(), "both slots released after full fill");
    }

    #[test]
    fn partial_fill_rests_remainder() {
        let mut e = engine(StpMode::None);
        push(&mut e, 1, 1, Side::Sell, OrderType::Limit, PX, 40);

        let r = push(&mut e, 2, 2, Side::Buy, OrderType::Limit, PX, 100);
        assert_eq!(r.status, MatchStatus::PartialFill);
        assert_eq!(r.filled_quantity, 40);
        assert_eq!(r.remaining_quantity, 60);
        assert_eq!(e.book().best_bid().unwrap().total_quantity, 60);
        assert!(e.book().best_ask().is_none());
        e.book().validate(e.arena()).unwrap();
    }

    #[test]
    fn fifo_priority_within_level() {
        let mut e = engine(StpMode::None);
        push(&mut e, 1, 1, Side::Sell, OrderType::Limit, PX, 100);
        push(&mut e, 2, 1, Side::Sell, OrderType::Limit, PX, 100);
        push(&mut e, 3, 1, Side::Sell, OrderType::Limit, PX, 100);

        let r = push(&mut e, 10, 2, Side::Buy, OrderType::Limit, PX, 150);
        assert_eq!(r.status, MatchStatus::Filled);
        assert_eq!(r.trades().len(), 2);
        assert_eq!(r.trades()[0].sell_order_id, 1);
        assert_eq!(r.trades()[0].quantity, 100);
        assert_eq!(r.trades()[1].sell_order_id, 2);
        assert_eq!(r.trades()[1].quantity, 50);

        // Order 2 keeps 50 resting, order 3 untouched.
        assert_eq!(e.book().best_ask().unwrap().total_quantity, 150);
        assert_eq!(e.book().order_count(), 2);
        e.book().validate(e.arena()).unwrap();
    }

    #[test]
    fn sweep_multiple_levels_passive_pricing() {
        let mut e = engine(StpMode::None);
        push(&mut e, 1, 1, Side::Sell, OrderType::Limit, PX, 100);
        push(&mut e, 2, 1, Side::Sell, OrderType::Limit, PX + TICK, 100);
        push(&mut e, 3, 1, Side::Sell, OrderType::Limit, PX + 2 * TICK, 100);

        let r = push(&mut e, 10, 2, Side::Buy, OrderType::Limit, PX + 2 * TICK, 250);
        assert_eq!(r.status, MatchStatus::Filled);
        let prices: Vec<Price> = r.trades().iter().map(|t| t.price).collect();
        let quantities: Vec<Quantity> = r.trades().iter().map(|t| t.quantity).collect();
        assert_eq!(prices, vec![PX, PX + TICK, PX + 2 * TICK]);
        assert_eq!(quantities, vec![100, 100, 50]);

        assert_eq!(e.book().best_ask().unwrap().price, PX + 2 * TICK);
        assert_eq!(e.book().best_ask().unwrap().total_quantity, 50);
    }

    #[test]
    fn market_order_sweeps_and_cancels_remainder() {
        let mut e = engine(StpMode::None);
        push(&mut e, 1, 1, Side::Sell, OrderType::Limit, PX, 60);

        let r = push(&mut e, 2, 2, Side::Buy, OrderType::Market, 0, 100);
        assert_eq!(r.status, MatchStatus::Cancelled);
        assert_eq!(r.filled_quantity, 60);
        assert_eq!(r.remaining_quantity, 40);
        assert!(e.book().is_empty());
        assert!(e.arena().is_empty());
    }

    #[test]
    fn market_order_against_empty_book_cancels() {
        let mut e = engine(StpMode::None);
        let r = push(&mut e, 1, 1, Side::Buy, OrderType::Market, 0, 100);
        assert_eq!(r.status, MatchStatus::Cancelled);
        assert_eq!(r.trade_count(), 0);
        assert!(e.arena().is_empty());
    }

    #[test]
    fn ioc_cancels_unfilled_remainder() {
        let mut e = engine(StpMode::None);
        push(&mut e, 1, 1, Side::Sell, OrderType::Limit, PX, 50);

        let r = push(&mut e, 2, 2, Side::Buy, OrderType::Ioc, PX, 80);
        assert_eq!(r.status, MatchStatus::Cancelled);
        assert_eq!(r.filled_quantity, 50);
        assert!(e.book().is_empty(), "IOC remainder must not rest");
    }

    #[test]
    fn fok_rejects_when_infeasible_without_mutation() {
        let mut e = engine(StpMode::None);
        push(&mut e, 1, 1, Side::Sell, OrderType::Limit, PX, 50);
        let digest = e.book().snapshot_digest(e.arena());

        let r = push(&mut e, 10, 2, Side::Buy, OrderType::Fok, PX, 100);
        assert_eq!(r.status, MatchStatus::Rejected);
        assert_eq!(r.trade_count(), 0);
        assert_eq!(e.book().snapshot_digest(e.arena()), digest);
        assert_eq!(e.book().best_ask().unwrap().total_quantity, 50);
    }

    #[test]
    fn fok_fills_when_feasible() {
        let mut e = engine(StpMode::None);
        push(&mut e, 1, 1, Side::Sell, OrderType::Limit, PX, 60);
        push(&mut e, 2, 1, Side::Sell, OrderType::Limit, PX + TICK, 60);

        let r = push(&mut e, 10, 2, Side::Buy, OrderType::Fok, PX + TICK, 100);
        assert_eq!(r.status, MatchStatus::Filled);
        assert_eq!(r.filled_quantity, 100);
        assert_eq!(r.trades().len(), 2);
    }

    #[test]
    fn invalid_price_rejected_and_slot_released() {
        let mut e = engine(StpMode::None);
        let r = push(&mut e, 1, 1, Side::Buy, OrderType::Limit, PX + 1, 100);
        assert_eq!(r.status, MatchStatus::Rejected);
        assert!(e.arena().is_empty());

        let r = push(&mut e, 2, 1, Side::Buy, OrderType::Limit, MIN - TICK, 100);
        assert_eq!(r.status, MatchStatus::Rejected);
        let r = push(&mut e, 3, 1, Side::Buy, OrderType::Limit, MAX + TICK, 100);
        assert_eq!(r.status, MatchStatus::Rejected);
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut e = engine(StpMode::None);
        push(&mut e, 7, 1, Side::Buy, OrderType::Limit, PX, 100);
        let r = push(&mut e, 7, 1, Side::Buy, OrderType::Limit, PX - TICK, 100);
        assert_eq!(r.status, MatchStatus::Rejected);
        assert_eq!(e.book().order_count(), 1);
    }

    #[test]
    fn zero_order_id_rejected() {
        let mut e = engine(StpMode::None);
        let r = push(&mut e, 0, 1, Side::Buy, OrderType::Limit, PX, 100);
        assert_eq!(r.status, MatchStatus::Rejected);
    }

    #[test]
    fn cancel_releases_slot() {
        let mut e = engine(StpMode::None);
        push(&mut e, 1, 1, Side::Buy, OrderType::Limit, PX, 100);
        assert_eq!(e.arena().in_use(), 1);

        assert!(e.cancel(1));
        assert!(e.book().is_empty());
        assert!(e.arena().is_empty());
        assert!(!e.cancel(1));
    }

    #[test]
    fn iceberg_fills_slice_then_requeues_behind() {
        let mut e = engine(StpMode::None);
        push_iceberg(&mut e, 1, Side::Sell, PX, 300, 100);
        push(&mut e, 2, 2, Side::Sell, OrderType::Limit, PX, 100);

        // First buy hits the iceberg (time priority).
        let r = push(&mut e, 10, 3, Side::Buy, OrderType::Limit, PX, 100);
        assert_eq!(r.trades().len(), 1);
        assert_eq!(r.trades()[0].sell_order_id, 1);
        assert_eq!(r.trades()[0].quantity, 100);

        // Replenished iceberg is now behind order 2.
        let r = push(&mut e, 11, 3, Side::Buy, OrderType::Limit, PX, 100);
        assert_eq!(r.trades().len(), 1);
        assert_eq!(r.trades()[0].sell_order_id, 2);

        // Level still advertises the iceberg's full remaining inventory.
        assert_eq!(e.book().best_ask().unwrap().total_quantity, 200);
        e.book().validate(e.arena()).unwrap();
    }

    #[test]
    fn iceberg_slice_limits_single_walk() {
        let mut e = engine(StpMode::None);
        push_iceberg(&mut e, 1, Side::Sell, PX, 300, 100);

        // A 250 buy consumes slice after slice within one submission: the
        // iceberg is alone at the level, so each replenishment re-fronts it.
        let r = push(&mut e, 10, 2, Side::Buy, OrderType::Limit, PX, 250);
        assert_eq!(r.status, MatchStatus::Filled);
        assert_eq!(r.filled_quantity, 250);
        assert_eq!(r.trades().len(), 3);
        assert_eq!(
            r.trades().iter().map(|t| t.quantity).collect::<Vec<_>>(),
            vec![100, 100, 50]
        );

        let resting = e.book().find(1).unwrap();
        assert_eq!(e.arena().get(resting).remaining_quantity(), 50);
        assert_eq!(e.arena().get(resting).remaining_visible(), 50);
    }

    #[test]
    fn stp_cancel_newest_stops_matching() {
        let mut e = engine(StpMode::CancelNewest);
        push(&mut e, 1, 7, Side::Sell, OrderType::Limit, PX, 100);

        let r = push(&mut e, 2, 7, Side::Buy, OrderType::Limit, PX, 100);
        assert_eq!(r.status, MatchStatus::SelfTradePrevented);
        assert_eq!(r.trade_count(), 0);
        assert_eq!(e.book().order_count(), 1, "resting order untouched");
        assert_eq!(e.arena().in_use(), 1);
    }

    #[test]
    fn stp_cancel_oldest_continues_matching() {
        let mut e = engine(StpMode::CancelOldest);
        push(&mut e, 1, 7, Side::Sell, OrderType::Limit, PX, 100);
        push(&mut e, 2, 8, Side::Sell, OrderType::Limit, PX, 100);

        let r = push(&mut e, 3, 7, Side::Buy, OrderType::Limit, PX, 100);
        assert_eq!(r.status, MatchStatus::Filled);
        assert_eq!(r.trades().len(), 1);
        assert_eq!(r.trades()[0].sell_order_id, 2);
        assert!(e.book().is_empty(), "order 1 cancelled, order 2 filled");
        assert!(e.arena().is_empty());
    }

    #[test]
    fn stp_cancel_both_drops_both_sides() {
        let mut e = engine(StpMode::CancelBoth);
        push(&mut e, 1, 7, Side::Sell, OrderType::Limit, PX, 100);

        let r = push(&mut e, 2, 7, Side::Buy, OrderType::Limit, PX, 100);
        assert_eq!(r.status, MatchStatus::SelfTradePrevented);
        assert_eq!(r.trade_count(), 0);
        assert!(e.book().is_empty());
        assert!(e.arena().is_empty());
    }

    #[test]
    fn modify_requeues_at_back_even_at_same_price() {
        let mut e = engine(StpMode::None);
        push(&mut e, 1, 1, Side::Buy, OrderType::Limit, PX, 100);
        push(&mut e, 2, 2, Side::Buy, OrderType::Limit, PX, 100);

        let r = e.modify(1, PX, 100, 5);
        assert_eq!(r.status, MatchStatus::Modified);

        // Order 1 is now behind order 2: a crossing sell hits 2 first.
        let r = push(&mut e, 3, 3, Side::Sell, OrderType::Limit, PX, 100);
        assert_eq!(r.trades()[0].buy_order_id, 2);
        e.book().validate(e.arena()).unwrap();
    }

    #[test]
    fn modify_crossing_price_fills() {
        let mut e = engine(StpMode::None);
        push(&mut e, 1, 1, Side::Sell, OrderType::Limit, PX, 100);
        push(&mut e, 2, 2, Side::Buy, OrderType::Limit, PX - TICK, 100);

        let r = e.modify(2, PX, 100, 9);
        assert_eq!(r.status, MatchStatus::Filled);
        assert_eq!(r.trades().len(), 1);
        assert_eq!(r.trades()[0].buy_order_id, 2);
        assert_eq!(r.trades()[0].sell_order_id, 1);
        assert_eq!(r.trades()[0].price, PX);
        assert!(e.book().is_empty());
    }

    #[test]
    fn modify_rejections_leave_book_unchanged() {
        let mut e = engine(StpMode::None);
        push(&mut e, 1, 1, Side::Buy, OrderType::Limit, PX, 100);
        let digest = e.book().snapshot_digest(e.arena());

        assert_eq!(e.modify(9, PX, 100, 0).status, MatchStatus::Rejected);
        assert_eq!(e.modify(1, PX + 1, 100, 0).status, MatchStatus::Rejected);
        assert_eq!(e.book().snapshot_digest(e.arena()), digest);
    }

    #[test]
    fn modify_preserves_filled_quantity() {
        let mut e = engine(StpMode::None);
        push(&mut e, 1, 1, Side::Sell, OrderType::Limit, PX, 100);
        push(&mut e, 2, 2, Side::Buy, OrderType::Limit, PX, 40); // fills 40

        let r = e.modify(1, PX + TICK, 100, 3);
        assert_eq!(r.status, MatchStatus::Modified);
        let idx = e.book().find(1).unwrap();
        assert_eq!(e.arena().get(idx).filled_quantity, 40);
        assert_eq!(e.arena().get(idx).remaining_quantity(), 60);
        assert_eq!(e.book().best_ask().unwrap().total_quantity, 60);
    }

    #[test]
    fn trade_bound_stops_at_sixty_four_fills() {
        let mut e = engine(StpMode::None);
        for id in 1..=70u64 {
            push(&mut e, id, 1, Side::Sell, OrderType::Limit, PX, 1);
        }

        let r = push(&mut e, 100, 2, Side::Buy, OrderType::Limit, PX, 70);
        assert_eq!(r.trade_count() as usize, MAX_TRADES_PER_MATCH);
        assert_eq!(r.status, MatchStatus::PartialFill);
        assert_eq!(r.filled_quantity, 64);
        assert_eq!(r.remaining_quantity, 6);
        // Remainder rests on the bid side alongside the 6 surviving asks...
        // which it would cross. The bound is a hard stop for this submission.
        assert_eq!(e.book().order_count(), 7);
    }

    #[test]
    fn trade_ids_are_monotonic_across_submissions() {
        let mut e = engine(StpMode::None);
        push(&mut e, 1, 1, Side::Sell, OrderType::Limit, PX, 50);
        push(&mut e, 2, 1, Side::Sell, OrderType::Limit, PX, 50);
        let r1 = push(&mut e, 10, 2, Side::Buy, OrderType::Limit, PX, 50);
        let r2 = push(&mut e, 11, 2, Side::Buy, OrderType::Limit, PX, 50);
        assert_eq!(r1.trades()[0].trade_id, 1);
        assert_eq!(r2.trades()[0].trade_id, 2);
        assert_eq!(e.total_trade_count(), 2);
    }
}
