//! Order gateway — validating ingress for one instrument's matching pipeline.
//!
//! Lives on the matching thread. Validates inbound commands, stages order
//! records in the arena, submits to the engine, then decomposes each
//! [`MatchResult`] into a sequenced stream of [`EventMessage`]s: all trade
//! events first, then exactly one terminal status event. Consumers replaying
//! the stream therefore see every fill before the outcome that explains it.
//!
//! The event channel is optional so the pipeline can be embedded or tested
//! without a publisher thread. Multiple gateways on the same matching thread
//! share one channel through `Rc` — the `!Send` handle doubles as a guard
//! that all producers stay on a single thread, preserving the ring's SPSC
//! contract.

use std::cell::RefCell;
use std::rc::Rc;

use crate::matching::{MatchResult, MatchStatus, MatchingEngine};
use crate::message::{EventKind, EventMessage, OrderEvent, OrderMessage};
use crate::ring::Producer;
use crate::types::{InstrumentId, Order, OrderId, OrderStatus, OrderType};

/// Reference deployment event-ring size: 65 536 slots × 64 bytes = 4 MiB.
pub const EVENT_RING_CAPACITY: usize = 65_536;

/// Shared handle to the event ring's producer side. `Rc` keeps every
/// gateway that publishes into it on one thread.
pub type EventChannel = Rc<RefCell<Producer<EventMessage>>>;

/// Wrap a ring producer for sharing among the gateways of one matching thread.
pub fn shared_channel(producer: Producer<EventMessage>) -> EventChannel {
    Rc::new(RefCell::new(producer))
}

/// Why the gateway refused a command before (or instead of) matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GatewayRejectReason {
    #[default]
    None,
    InvalidQuantity,
    InvalidPrice,
    ArenaExhausted,
    OrderNotFound,
    UnknownInstrument,
}

/// Lightweight synchronous result. The detailed audit trail (per-trade
/// events) goes out on the event channel.
#[derive(Clone, Copy, Debug)]
pub struct GatewayResult {
    pub accepted: bool,
    pub reject_reason: GatewayRejectReason,
    pub match_status: MatchStatus,
    pub trade_count: u32,
    pub filled_quantity: u64,
    pub remaining_quantity: u64,
}

impl GatewayResult {
    pub(crate) fn rejected(reason: GatewayRejectReason) -> Self {
        Self {
            accepted: false,
            reject_reason: reason,
            match_status: MatchStatus::Rejected,
            trade_count: 0,
            filled_quantity: 0,
            remaining_quantity: 0,
        }
    }
}

/// Single-threaded ingress bound to one instrument.
pub struct OrderGateway {
    engine: MatchingEngine,
    channel: Option<EventChannel>,
    instrument_id: InstrumentId,
    sequence: u64,
    orders_processed: u64,
    orders_rejected: u64,
    backpressure: u64,
}

impl OrderGateway {
    /// Gateway without an event channel (testing / embedding mode —
    /// publishing is a no-op).
    pub fn new(engine: MatchingEngine, instrument_id: InstrumentId) -> Self {
        Self {
            engine,
            channel: None,
            instrument_id,
            sequence: 0,
            orders_processed: 0,
            orders_rejected: 0,
            backpressure: 0,
        }
    }

    /// Gateway publishing into a (possibly shared) event channel.
    pub fn with_channel(
        engine: MatchingEngine,
        instrument_id: InstrumentId,
        channel: EventChannel,
    ) -> Self {
        let mut gw = Self::new(engine, instrument_id);
        gw.channel = Some(channel);
        gw
    }

    // ========================================================================
    // Command processing
    // ========================================================================

    /// Validate and submit an add command.
    pub fn process_order(&mut self, msg: &OrderMessage) -> GatewayResult {
        let src = &msg.order;

        if let Some(reason) = validate_add(src) {
            return self.refuse(src, reason);
        }

        let Some(order_idx) = self.engine.arena_mut().acquire() else {
            return self.refuse(src, GatewayRejectReason::ArenaExhausted);
        };

        // Stage the record: copy command terms, normalize the bookkeeping
        // fields the client has no business setting.
        {
            let order = self.engine.arena_mut().get_mut(order_idx);
            *order = *src;
            order.status = OrderStatus::New;
            order.filled_quantity = 0;
            order.next = crate::types::NULL_INDEX;
            order.prev = crate::types::NULL_INDEX;
            if order.order_type == OrderType::Iceberg {
                order.visible_quantity = order.iceberg_slice_qty.min(order.quantity);
            } else {
                order.visible_quantity = order.quantity;
                order.iceberg_slice_qty = 0;
            }
        }

        // The engine may release the slot; keep a copy for event payloads.
        let order_copy = *self.engine.arena().get(order_idx);

        let match_result = self.engine.submit(order_idx);
        self.decompose_and_publish(&match_result, &order_copy);

        self.orders_processed += 1;
        GatewayResult {
            accepted: true,
            reject_reason: GatewayRejectReason::None,
            match_status: match_result.status,
            trade_count: match_result.trade_count(),
            filled_quantity: match_result.filled_quantity,
            remaining_quantity: match_result.remaining_quantity,
        }
    }

    /// Cancel by id. Publishes `OrderCancelled` on success.
    pub fn process_cancel(&mut self, order_id: OrderId) -> bool {
        let success = self.engine.cancel(order_id);

        if success {
            let seq = self.next_sequence();
            let event = EventMessage::order(
                EventKind::OrderCancelled,
                seq,
                self.instrument_id,
                OrderEvent::new(order_id, OrderStatus::Cancelled, 0, 0, 0, 0),
            );
            self.publish_event(event);
        }

        success
    }

    /// Validate and apply a modify command.
    pub fn process_modify(&mut self, msg: &OrderMessage) -> GatewayResult {
        let src = &msg.order;

        if src.quantity == 0 {
            return self.refuse(src, GatewayRejectReason::InvalidQuantity);
        }
        if src.price <= 0 {
            return self.refuse(src, GatewayRejectReason::InvalidPrice);
        }

        let match_result =
            self.engine
                .modify(src.order_id, src.price, src.quantity, src.timestamp);

        if match_result.status == MatchStatus::Rejected {
            return self.refuse(src, GatewayRejectReason::OrderNotFound);
        }

        let mut order_copy = Order::empty();
        order_copy.order_id = src.order_id;
        order_copy.price = src.price;
        order_copy.timestamp = src.timestamp;
        self.decompose_and_publish(&match_result, &order_copy);

        self.orders_processed += 1;
        GatewayResult {
            accepted: true,
            reject_reason: GatewayRejectReason::None,
            match_status: match_result.status,
            trade_count: match_result.trade_count(),
            filled_quantity: match_result.filled_quantity,
            remaining_quantity: match_result.remaining_quantity,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    #[inline]
    pub fn engine_mut(&mut self) -> &mut MatchingEngine {
        &mut self.engine
    }

    #[inline]
    pub fn instrument_id(&self) -> InstrumentId {
        self.instrument_id
    }

    /// Last sequence number issued.
    #[inline]
    pub fn sequence_number(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn orders_processed(&self) -> u64 {
        self.orders_processed
    }

    #[inline]
    pub fn orders_rejected(&self) -> u64 {
        self.orders_rejected
    }

    /// Failed pushes observed while spinning on a full event ring.
    #[inline]
    pub fn backpressure_count(&self) -> u64 {
        self.backpressure
    }

    // ========================================================================
    // Event publication
    // ========================================================================

    /// Decompose a match result: trade events first, then the one terminal
    /// status event selected by the match status.
    fn decompose_and_publish(&mut self, result: &MatchResult, order_copy: &Order) {
        if self.channel.is_none() {
            return;
        }

        for i in 0..result.trade_count() as usize {
            let trade = result.trades()[i];
            let seq = self.next_sequence();
            self.publish_event(EventMessage::trade(seq, self.instrument_id, trade));
        }

        let (kind, status) = match result.status {
            MatchStatus::Filled => (EventKind::OrderFilled, OrderStatus::Filled),
            MatchStatus::PartialFill => (EventKind::OrderPartialFill, OrderStatus::PartialFill),
            MatchStatus::Resting => (EventKind::OrderAccepted, OrderStatus::Accepted),
            MatchStatus::Cancelled => (EventKind::OrderCancelled, OrderStatus::Cancelled),
            MatchStatus::Rejected => (EventKind::OrderRejected, OrderStatus::Rejected),
            MatchStatus::SelfTradePrevented => (EventKind::OrderCancelled, OrderStatus::Cancelled),
            MatchStatus::Modified => (EventKind::OrderModified, OrderStatus::Accepted),
        };

        let seq = self.next_sequence();
        let event = EventMessage::order(
            kind,
            seq,
            self.instrument_id,
            OrderEvent::new(
                order_copy.order_id,
                status,
                result.filled_quantity,
                result.remaining_quantity,
                order_copy.price,
                order_copy.timestamp,
            ),
        );
        self.publish_event(event);
    }

    /// Reject a command before it reaches the engine: count it, publish the
    /// rejection, and return the synchronous result.
    fn refuse(&mut self, src: &Order, reason: GatewayRejectReason) -> GatewayResult {
        self.orders_rejected += 1;

        if self.channel.is_some() {
            let seq = self.next_sequence();
            let event = EventMessage::order(
                EventKind::OrderRejected,
                seq,
                self.instrument_id,
                OrderEvent::new(
                    src.order_id,
                    OrderStatus::Rejected,
                    0,
                    src.quantity,
                    src.price,
                    src.timestamp,
                ),
            );
            self.publish_event(event);
        }

        GatewayResult::rejected(reason)
    }

    /// Spin until the event lands. Back-pressure caps the matching thread at
    /// the consumer's drain rate; events are never dropped or reordered.
    fn publish_event(&mut self, event: EventMessage) {
        if let Some(channel) = &self.channel {
            let mut producer = channel.borrow_mut();
            while !producer.try_push(event) {
                self.backpressure += 1;
                std::hint::spin_loop();
            }
        }
    }

    #[inline]
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

/// Gateway-level command shape checks. Engine-level checks (tick alignment,
/// duplicate id, FOK feasibility) come later and produce engine rejections.
fn validate_add(order: &Order) -> Option<GatewayRejectReason> {
    if order.quantity == 0 {
        return Some(GatewayRejectReason::InvalidQuantity);
    }
    if order.order_type != OrderType::Market && order.price <= 0 {
        return Some(GatewayRejectReason::InvalidPrice);
    }
    if order.order_type == OrderType::Iceberg && order.iceberg_slice_qty == 0 {
        return Some(GatewayRejectReason::InvalidQuantity);
    }
    None
}
