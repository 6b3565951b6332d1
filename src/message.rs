//! Fixed-size message types for inter-thread transport.
//!
//! Both message types are trivially copyable and cache-line aligned so they
//! move through the SPSC ring with a single memcpy and never straddle a line
//! they don't own:
//!
//! - [`OrderMessage`] (128 bytes, two cache lines): inbound commands, carrying
//!   a full [`Order`] record so the matching thread needs no extra lookups.
//! - [`EventMessage`] (64 bytes, one cache line): outbound events, a tagged
//!   48-byte payload that is either a [`Trade`] or an [`OrderEvent`].
//!
//! The payload is a `#[repr(C)]` union rather than a Rust enum to hit the
//! exact 64-byte layout; the tag-checked accessors keep the unsafety behind a
//! safe API.

use crate::types::{
    InstrumentId, Order, OrderId, OrderStatus, OrderType, Price, Quantity, Side, TimeInForce,
    Timestamp,
};

// ============================================================================
// Trade
// ============================================================================

/// One fill between an aggressive and a resting order.
///
/// `trade_id` increases monotonically per matching engine. Price is the
/// resting order's price (passive price improvement).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trade {
    pub trade_id: u64,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub price: Price,
    pub quantity: Quantity,
    pub timestamp: Timestamp,
}

const _: () = assert!(std::mem::size_of::<Trade>() == 48);

impl Trade {
    pub const fn zeroed() -> Self {
        Self {
            trade_id: 0,
            buy_order_id: 0,
            sell_order_id: 0,
            price: 0,
            quantity: 0,
            timestamp: 0,
        }
    }
}

// ============================================================================
// Order events
// ============================================================================

/// Status update for one order — the non-trade half of the event payload.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub filled_quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub price: Price,
    pub timestamp: Timestamp,
    pub status: OrderStatus,
    _pad: [u8; 7],
}

const _: () = assert!(std::mem::size_of::<OrderEvent>() == 48);

impl OrderEvent {
    pub const fn new(
        order_id: OrderId,
        status: OrderStatus,
        filled_quantity: Quantity,
        remaining_quantity: Quantity,
        price: Price,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            order_id,
            filled_quantity,
            remaining_quantity,
            price,
            timestamp,
            status,
            _pad: [0; 7],
        }
    }
}

/// Event discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EventKind {
    Trade = 0,
    OrderAccepted = 1,
    OrderCancelled = 2,
    OrderRejected = 3,
    OrderFilled = 4,
    OrderPartialFill = 5,
    OrderModified = 6,
}

/// 48-byte payload union. Which half is live is recorded by
/// [`EventMessage::kind`]; use the accessors, not the fields.
#[repr(C)]
#[derive(Clone, Copy)]
pub union EventPayload {
    pub trade: Trade,
    pub order: OrderEvent,
}

const _: () = assert!(std::mem::size_of::<EventPayload>() == 48);

/// One cache line of outbound event.
#[repr(C, align(64))]
#[derive(Clone, Copy)]
pub struct EventMessage {
    pub kind: EventKind,
    _pad: [u8; 3],
    pub instrument_id: InstrumentId,
    /// Strictly increasing per gateway, no gaps.
    pub sequence: u64,
    payload: EventPayload,
}

const _: () = assert!(std::mem::size_of::<EventMessage>() == 64);
const _: () = assert!(std::mem::align_of::<EventMessage>() == 64);

impl EventMessage {
    /// Build a trade event.
    pub fn trade(sequence: u64, instrument_id: InstrumentId, trade: Trade) -> Self {
        Self {
            kind: EventKind::Trade,
            _pad: [0; 3],
            instrument_id,
            sequence,
            payload: EventPayload { trade },
        }
    }

    /// Build an order-status event with the given tag.
    pub fn order(
        kind: EventKind,
        sequence: u64,
        instrument_id: InstrumentId,
        event: OrderEvent,
    ) -> Self {
        debug_assert!(kind != EventKind::Trade);
        Self {
            kind,
            _pad: [0; 3],
            instrument_id,
            sequence,
            payload: EventPayload { order: event },
        }
    }

    /// The trade payload, if this is a trade event.
    #[inline]
    pub fn as_trade(&self) -> Option<&Trade> {
        if self.kind == EventKind::Trade {
            // Tag says the trade half is live.
            Some(unsafe { &self.payload.trade })
        } else {
            None
        }
    }

    /// The order-event payload, if this is a status event.
    #[inline]
    pub fn as_order_event(&self) -> Option<&OrderEvent> {
        if self.kind == EventKind::Trade {
            None
        } else {
            Some(unsafe { &self.payload.order })
        }
    }
}

impl std::fmt::Debug for EventMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("EventMessage");
        s.field("kind", &self.kind)
            .field("instrument_id", &self.instrument_id)
            .field("sequence", &self.sequence);
        if let Some(t) = self.as_trade() {
            s.field("trade", t);
        } else if let Some(o) = self.as_order_event() {
            s.field("order", o);
        }
        s.finish()
    }
}

// ============================================================================
// Inbound commands
// ============================================================================

/// Inbound command discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandKind {
    Add = 0,
    Cancel = 1,
    Modify = 2,
}

/// Two cache lines of inbound command. The embedded [`Order`] carries the
/// command parameters; for cancels only `order.order_id` matters.
#[repr(C, align(64))]
#[derive(Clone, Copy, Debug)]
pub struct OrderMessage {
    pub kind: CommandKind,
    _pad: [u8; 3],
    pub instrument_id: InstrumentId,
    pub order: Order,
}

const _: () = assert!(std::mem::size_of::<OrderMessage>() == 128);
const _: () = assert!(std::mem::align_of::<OrderMessage>() == 64);

impl OrderMessage {
    fn command(kind: CommandKind, instrument_id: InstrumentId, order: Order) -> Self {
        Self {
            kind,
            _pad: [0; 3],
            instrument_id,
            order,
        }
    }

    /// A limit add command.
    #[allow(clippy::too_many_arguments)]
    pub fn limit(
        instrument_id: InstrumentId,
        order_id: OrderId,
        participant_id: u32,
        side: Side,
        price: Price,
        quantity: Quantity,
        timestamp: Timestamp,
    ) -> Self {
        let mut order = Order::empty();
        order.order_id = order_id;
        order.participant_id = participant_id;
        order.instrument_id = instrument_id;
        order.side = side;
        order.order_type = OrderType::Limit;
        order.time_in_force = TimeInForce::Gtc;
        order.price = price;
        order.quantity = quantity;
        order.visible_quantity = quantity;
        order.timestamp = timestamp;
        Self::command(CommandKind::Add, instrument_id, order)
    }

    /// A market add command. Price is unused and left at zero.
    pub fn market(
        instrument_id: InstrumentId,
        order_id: OrderId,
        participant_id: u32,
        side: Side,
        quantity: Quantity,
        timestamp: Timestamp,
    ) -> Self {
        let mut msg = Self::limit(
            instrument_id,
            order_id,
            participant_id,
            side,
            0,
            quantity,
            timestamp,
        );
        msg.order.order_type = OrderType::Market;
        msg.order.time_in_force = TimeInForce::Ioc;
        msg
    }

    /// An immediate-or-cancel add command.
    #[allow(clippy::too_many_arguments)]
    pub fn ioc(
        instrument_id: InstrumentId,
        order_id: OrderId,
        participant_id: u32,
        side: Side,
        price: Price,
        quantity: Quantity,
        timestamp: Timestamp,
    ) -> Self {
        let mut msg = Self::limit(
            instrument_id,
            order_id,
            participant_id,
            side,
            price,
            quantity,
            timestamp,
        );
        msg.order.order_type = OrderType::Ioc;
        msg.order.time_in_force = TimeInForce::Ioc;
        msg
    }

    /// A fill-or-kill add command.
    #[allow(clippy::too_many_arguments)]
    pub fn fok(
        instrument_id: InstrumentId,
        order_id: OrderId,
        participant_id: u32,
        side: Side,
        price: Price,
        quantity: Quantity,
        timestamp: Timestamp,
    ) -> Self {
        let mut msg = Self::limit(
            instrument_id,
            order_id,
            participant_id,
            side,
            price,
            quantity,
            timestamp,
        );
        msg.order.order_type = OrderType::Fok;
        msg.order.time_in_force = TimeInForce::Fok;
        msg
    }

    /// An iceberg add command: `quantity` total, `slice` displayed at a time.
    #[allow(clippy::too_many_arguments)]
    pub fn iceberg(
        instrument_id: InstrumentId,
        order_id: OrderId,
        participant_id: u32,
        side: Side,
        price: Price,
        quantity: Quantity,
        slice: Quantity,
        timestamp: Timestamp,
    ) -> Self {
        let mut msg = Self::limit(
            instrument_id,
            order_id,
            participant_id,
            side,
            price,
            quantity,
            timestamp,
        );
        msg.order.order_type = OrderType::Iceberg;
        msg.order.visible_quantity = slice.min(quantity);
        msg.order.iceberg_slice_qty = slice;
        msg
    }

    /// A cancel command.
    pub fn cancel(instrument_id: InstrumentId, order_id: OrderId) -> Self {
        let mut order = Order::empty();
        order.order_id = order_id;
        order.instrument_id = instrument_id;
        Self::command(CommandKind::Cancel, instrument_id, order)
    }

    /// A modify command: new price, quantity, and timestamp for `order_id`.
    pub fn modify(
        instrument_id: InstrumentId,
        order_id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
        timestamp: Timestamp,
    ) -> Self {
        let mut order = Order::empty();
        order.order_id = order_id;
        order.instrument_id = instrument_id;
        order.price = new_price;
        order.quantity = new_quantity;
        order.visible_quantity = new_quantity;
        order.timestamp = timestamp;
        Self::command(CommandKind::Modify, instrument_id, order)
    }
}
