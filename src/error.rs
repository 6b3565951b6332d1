//! Cold-path error types.
//!
//! Hot-path outcomes (rejections, match statuses) are plain enums carried in
//! results — they are business events, not errors. The types here cover
//! construction and configuration, where failing loudly at startup is the
//! correct behavior.

use thiserror::Error;

use crate::types::{InstrumentId, Price};

/// Errors raised while building books, rings, registries, or routers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid price range: min {min} must be < max {max}")]
    InvalidPriceRange { min: Price, max: Price },

    #[error("tick size must be positive, got {0}")]
    InvalidTickSize(Price),

    #[error("price range is not a whole number of ticks (min {min}, max {max}, tick {tick})")]
    RangeNotTickAligned { min: Price, max: Price, tick: Price },

    #[error("capacity must be non-zero")]
    ZeroCapacity,

    #[error("instrument id {0} is already registered")]
    DuplicateInstrument(InstrumentId),

    #[error("instrument symbol {0:?} is already registered")]
    DuplicateSymbol(String),

    #[error("registry JSON: {0}")]
    Json(String),
}

/// Violations reported by [`crate::order_book::OrderBook::validate`] — the
/// book's self-audit used by stress tests and debugging sessions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookAuditError {
    #[error("level {price}: total_quantity {recorded} != sum of resting quantities {actual}")]
    LevelQuantityMismatch {
        price: Price,
        recorded: u64,
        actual: u64,
    },

    #[error("level {price}: order_count {recorded} != list length {actual}")]
    LevelCountMismatch {
        price: Price,
        recorded: u32,
        actual: u32,
    },

    #[error("level {price}: forward/backward traversals disagree")]
    BrokenLinks { price: Price },

    #[error("cached best bid index {cached:?} != scanned best {actual:?}")]
    StaleBestBid {
        cached: Option<usize>,
        actual: Option<usize>,
    },

    #[error("cached best ask index {cached:?} != scanned best {actual:?}")]
    StaleBestAsk {
        cached: Option<usize>,
        actual: Option<usize>,
    },

    #[error("order index size {index_size} != orders reachable from levels {reachable}")]
    IndexDesync { index_size: usize, reachable: usize },

    #[error("order {0} is in the index but not reachable from any level")]
    OrphanedOrder(u64),
}
