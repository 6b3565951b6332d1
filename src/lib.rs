//! # Tickmatch
//!
//! A price-time-priority limit order book matching engine with a lock-free
//! event plane.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: one thread owns each instrument's book, arena,
//!   engine, and gateway exclusively (no locks)
//! - **O(1) Operations**: best-price access, order lookup, level membership
//!   changes, and arena acquire/release all run in constant time
//! - **Zero Allocation on the Hot Path**: every structure touched by
//!   submit/cancel/modify/publish is pre-allocated, stack-resident, or
//!   arena-owned
//! - **Fixed-Point Prices**: `i64` at 10⁻⁸ precision — no floating point in
//!   matching comparisons
//!
//! ## Architecture
//!
//! ```text
//! [Feed Thread] --> [SPSC Ring] --> [Matching Thread (pinned)]
//!                                      router -> gateway -> engine -> book
//!                                           |
//!                                    [SPSC Event Ring]
//!                                           |
//!                                   [Publisher Thread] --> subscribers
//! ```
//!
//! The two rings are the only synchronization between threads. The gateway
//! decomposes each match outcome into a sequenced event stream: trades first,
//! then exactly one terminal status event per submission.

pub mod arena;
pub mod clock;
pub mod error;
pub mod gateway;
pub mod instrument;
pub mod matching;
pub mod message;
pub mod order_book;
pub mod order_index;
pub mod price_level;
pub mod publisher;
pub mod ring;
pub mod router;
pub mod types;

// Re-exports for convenience
pub use arena::OrderArena;
pub use error::{BookAuditError, ConfigError};
pub use gateway::{
    shared_channel, EventChannel, GatewayRejectReason, GatewayResult, OrderGateway,
    EVENT_RING_CAPACITY,
};
pub use instrument::{InstrumentConfig, InstrumentRegistry};
pub use matching::{MatchResult, MatchStatus, MatchingEngine, StpMode, MAX_TRADES_PER_MATCH};
pub use message::{
    CommandKind, EventKind, EventMessage, OrderEvent, OrderMessage, Trade,
};
pub use order_book::{DepthEntry, OrderBook};
pub use order_index::OrderIndex;
pub use price_level::PriceLevel;
pub use publisher::{MarketDataPublisher, StopHandle};
pub use ring::{channel, Consumer, Producer};
pub use router::{InstrumentPipeline, InstrumentRouter};
pub use types::{
    price_from_str, price_to_f64, ArenaIndex, InstrumentId, Order, OrderId, OrderStatus,
    OrderType, ParticipantId, Price, Quantity, Side, TimeInForce, Timestamp, NULL_INDEX,
    PRICE_SCALE,
};
