//! Price level — intrusive FIFO of orders resting at a single price.
//!
//! The orders themselves are the list nodes: `Order::prev`/`Order::next`
//! carry arena indices, so append and unlink are O(1) from any position with
//! no allocation. Time priority is the list order — head matches first.

use crate::arena::OrderArena;
use crate::types::{ArenaIndex, Price, Quantity, NULL_INDEX};

/// One price point's FIFO queue plus its aggregate quantities.
///
/// `total_quantity` is the sum of resting orders' *remaining* quantities
/// (including hidden iceberg inventory). Partial fills subtract from it at
/// fill time via [`PriceLevel::subtract_quantity`], so the advertised depth
/// stays consistent mid-walk; `unlink` subtracts whatever remains.
#[derive(Clone, Copy, Debug)]
pub struct PriceLevel {
    pub price: Price,
    pub total_quantity: Quantity,
    pub order_count: u32,
    pub head: ArenaIndex,
    pub tail: ArenaIndex,
}

impl PriceLevel {
    pub const EMPTY: Self = Self {
        price: 0,
        total_quantity: 0,
        order_count: 0,
        head: NULL_INDEX,
        tail: NULL_INDEX,
    };

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    /// Oldest resting order (next to match), or `NULL_INDEX` when empty.
    #[inline]
    pub const fn front(&self) -> ArenaIndex {
        self.head
    }

    /// Append an order at the tail — newest, last to match.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn append(&mut self, arena: &mut OrderArena, index: ArenaIndex) {
        let remaining = arena.get(index).remaining_quantity();

        if self.tail == NULL_INDEX {
            debug_assert!(self.head == NULL_INDEX);
            self.head = index;
            self.tail = index;
            let order = arena.get_mut(index);
            order.prev = NULL_INDEX;
            order.next = NULL_INDEX;
        } else {
            let old_tail = self.tail;
            arena.get_mut(old_tail).next = index;
            let order = arena.get_mut(index);
            order.prev = old_tail;
            order.next = NULL_INDEX;
            self.tail = index;
        }

        self.order_count += 1;
        self.total_quantity += remaining;
    }

    /// Unlink an order from any position. The slot is NOT released — the
    /// caller decides whether the order is being cancelled, filled, or
    /// re-queued.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn unlink(&mut self, arena: &mut OrderArena, index: ArenaIndex) {
        let (prev, next, remaining) = {
            let order = arena.get(index);
            (order.prev, order.next, order.remaining_quantity())
        };

        if prev != NULL_INDEX {
            arena.get_mut(prev).next = next;
        } else {
            debug_assert!(self.head == index);
            self.head = next;
        }

        if next != NULL_INDEX {
            arena.get_mut(next).prev = prev;
        } else {
            debug_assert!(self.tail == index);
            self.tail = prev;
        }

        let order = arena.get_mut(index);
        order.prev = NULL_INDEX;
        order.next = NULL_INDEX;

        self.order_count -= 1;
        self.total_quantity -= remaining;
    }

    /// Account for a partial fill against a still-resting order.
    #[inline]
    pub fn subtract_quantity(&mut self, quantity: Quantity) {
        debug_assert!(self.total_quantity >= quantity);
        self.total_quantity -= quantity;
    }
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::EMPTY
    }
}
