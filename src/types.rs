//! Core types for the matching hot path.
//!
//! Everything here is trivially copyable and fixed-size. Price is a signed
//! fixed-point integer (`actual_price * PRICE_SCALE`) so that price comparison
//! in the matching loop never touches floating point.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Fixed-point price: `actual_price * PRICE_SCALE`.
pub type Price = i64;

/// Order / fill quantity.
pub type Quantity = u64;

/// Client-assigned order identifier. Zero is reserved (empty-slot sentinel
/// in the order index) and is never a valid order id.
pub type OrderId = u64;

/// Trading participant identifier (for self-trade prevention).
pub type ParticipantId = u32;

/// Instrument identifier (routing key in multi-instrument deployments).
pub type InstrumentId = u32;

/// Nanoseconds since epoch. The hot path never reads a clock — timestamps
/// arrive on inbound commands.
pub type Timestamp = u64;

/// 10^8 — eight decimal places of price precision.
pub const PRICE_SCALE: i64 = 100_000_000;

/// Index into the order arena — a 32-bit "compressed pointer".
/// Halves link metadata versus native pointers, doubling cache efficiency.
pub type ArenaIndex = u32;

/// Sentinel for "no order" in intrusive links and cached indices.
pub const NULL_INDEX: ArenaIndex = u32::MAX;

/// Parse a human-readable decimal price (e.g. `"50000.25"`) into fixed point.
///
/// Returns `None` on malformed input or overflow. Conversion goes through
/// `rust_decimal` so `"0.1"`-style inputs round-trip exactly.
pub fn price_from_str(s: &str) -> Option<Price> {
    let d = Decimal::from_str(s).ok()?;
    d.checked_mul(Decimal::from(PRICE_SCALE))?.trunc().to_i64()
}

/// Render a fixed-point price as an `f64` (display/reporting only — never
/// used in matching comparisons).
#[inline]
pub fn price_to_f64(price: Price) -> f64 {
    price as f64 / PRICE_SCALE as f64
}

// ============================================================================
// Enums
// ============================================================================

/// Order side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    /// Returns the opposite side.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type — a closed set, dispatched by `match` in the matching loop.
/// No trait objects on the hot path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OrderType {
    /// Rests in the book if not fully matched.
    #[default]
    Limit = 0,
    /// Crosses whatever it can at any price; never rests. Price is unused.
    Market = 1,
    /// Immediate-or-cancel: fill what crosses now, cancel the rest.
    Ioc = 2,
    /// Fill-or-kill: fill entirely at entry or reject without book mutation.
    Fok = 3,
    /// Good-till-cancelled: rests until explicitly cancelled.
    Gtc = 4,
    /// Displays only a slice of its quantity; replenishes from hidden
    /// inventory, yielding time priority on each replenishment.
    Iceberg = 5,
}

/// Time in force.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TimeInForce {
    #[default]
    Gtc = 0,
    Ioc = 1,
    Fok = 2,
    Day = 3,
}

/// Order lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OrderStatus {
    #[default]
    New = 0,
    Accepted = 1,
    PartialFill = 2,
    Filled = 3,
    Cancelled = 4,
    Rejected = 5,
}

// ============================================================================
// Order
// ============================================================================

/// A single order record — the arena node.
///
/// Doubles as an intrusive doubly-linked list node (`prev`/`next` arena
/// indices) for O(1) unlink from a price level's FIFO. Field order keeps the
/// identity/side bytes on the first cache line and packs the two link indices
/// into the alignment gap before `price`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct Order {
    pub order_id: OrderId,
    pub participant_id: ParticipantId,
    pub instrument_id: InstrumentId,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub status: OrderStatus,
    /// Intrusive list: next order at the same price level.
    pub next: ArenaIndex,
    /// Intrusive list: previous order (enables O(1) cancel from anywhere).
    pub prev: ArenaIndex,
    pub price: Price,
    pub quantity: Quantity,
    /// Iceberg: cumulative displayed quantity (see `remaining_visible`).
    /// Equals `quantity` for non-iceberg orders.
    pub visible_quantity: Quantity,
    /// Iceberg: display slice size used on replenishment. Zero otherwise.
    pub iceberg_slice_qty: Quantity,
    pub filled_quantity: Quantity,
    pub timestamp: Timestamp,
}

// Hot-path contract: the record must fit in two cache lines.
const _: () = assert!(std::mem::size_of::<Order>() <= 128);
const _: () = assert!(std::mem::align_of::<Order>() <= 64);

impl Order {
    /// A zeroed, unlinked record — the arena's free-slot state.
    pub const fn empty() -> Self {
        Self {
            order_id: 0,
            participant_id: 0,
            instrument_id: 0,
            side: Side::Buy,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            status: OrderStatus::New,
            next: NULL_INDEX,
            prev: NULL_INDEX,
            price: 0,
            quantity: 0,
            visible_quantity: 0,
            iceberg_slice_qty: 0,
            filled_quantity: 0,
            timestamp: 0,
        }
    }

    /// Remaining unfilled quantity.
    #[inline]
    pub fn remaining_quantity(&self) -> Quantity {
        self.quantity - self.filled_quantity
    }

    /// Remaining *visible* quantity — the live iceberg slice. Equals
    /// `remaining_quantity` for non-iceberg orders.
    #[inline]
    pub fn remaining_visible(&self) -> Quantity {
        self.visible_quantity - self.filled_quantity
    }

    /// True once the order can no longer trade.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// Reset to the free-slot state (called when a slot returns to the arena).
    #[inline]
    pub fn reset(&mut self) {
        *self = Order::empty();
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_fits_two_cache_lines() {
        assert!(std::mem::size_of::<Order>() <= 128);
    }

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn remaining_quantities() {
        let mut o = Order::empty();
        o.quantity = 300;
        o.visible_quantity = 100;
        o.filled_quantity = 40;
        assert_eq!(o.remaining_quantity(), 260);
        assert_eq!(o.remaining_visible(), 60);
    }

    #[test]
    fn price_parsing_round_trips() {
        assert_eq!(price_from_str("50000"), Some(50_000 * PRICE_SCALE));
        assert_eq!(price_from_str("0.00000001"), Some(1));
        assert_eq!(price_from_str("100.5"), Some(10_050_000_000));
        assert_eq!(price_from_str("-1.25"), Some(-125_000_000));
        assert_eq!(price_from_str("not a price"), None);
    }

    #[test]
    fn price_display_conversion() {
        let p = price_from_str("123.456").unwrap();
        assert!((price_to_f64(p) - 123.456).abs() < 1e-9);
    }

    #[test]
    fn empty_order_is_unlinked() {
        let o = Order::empty();
        assert_eq!(o.next, NULL_INDEX);
        assert_eq!(o.prev, NULL_INDEX);
        assert_eq!(o.remaining_quantity(), 0);
    }
}
