//! Stress tests — push the engine toward its limits and audit the book's
//! structural invariants after every phase.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use tickmatch::{
    MatchStatus, MatchingEngine, OrderArena, OrderBook, OrderGateway, OrderMessage, Price, Side,
    StpMode, PRICE_SCALE,
};

const MIN: Price = 40_000 * PRICE_SCALE;
const MAX: Price = 60_000 * PRICE_SCALE;
const TICK: Price = PRICE_SCALE;
const INSTRUMENT: u32 = 1;

fn gateway(capacity: u32) -> OrderGateway {
    let book = OrderBook::new(MIN, MAX, TICK, capacity as usize).unwrap();
    let arena = OrderArena::new(capacity);
    OrderGateway::new(MatchingEngine::new(book, arena, StpMode::None), INSTRUMENT)
}

fn audit(gw: &OrderGateway) {
    gw.engine().book().validate(gw.engine().arena()).unwrap();
}

#[test]
fn near_capacity_operation() {
    const CAPACITY: u32 = 10_000;
    let mut gw = gateway(CAPACITY);

    // Fill to 95% capacity with non-crossing orders: bids well below asks.
    let target = (CAPACITY as f64 * 0.95) as u64;
    for i in 0..target {
        let (side, price) = if i % 2 == 0 {
            (Side::Buy, MIN + (i % 100 + 1) as Price * TICK)
        } else {
            (Side::Sell, MAX - (i % 100) as Price * TICK)
        };
        let r = gw.process_order(&OrderMessage::limit(
            INSTRUMENT,
            i + 1,
            1,
            side,
            price,
            100,
            i,
        ));
        assert_eq!(r.match_status, MatchStatus::Resting, "order {i} must rest");
    }

    assert_eq!(gw.engine().book().order_count() as u64, target);
    assert_eq!(gw.engine().arena().in_use() as u64, target);
    audit(&gw);

    // Cancel everything; the book must come back empty.
    for i in 0..target {
        assert!(gw.process_cancel(i + 1));
    }
    assert!(gw.engine().book().is_empty());
    assert!(gw.engine().arena().is_empty());
    audit(&gw);
}

#[test]
fn arena_exhaustion_then_recovery() {
    let mut gw = gateway(64);

    for i in 1..=64u64 {
        let r = gw.process_order(&OrderMessage::limit(INSTRUMENT, i, 1, Side::Buy, MIN, 1, 0));
        assert!(r.accepted);
    }
    // 65th acquire must fail cleanly.
    let r = gw.process_order(&OrderMessage::limit(INSTRUMENT, 65, 1, Side::Buy, MIN, 1, 0));
    assert!(!r.accepted);
    audit(&gw);

    // Freeing one slot makes room for exactly one more.
    assert!(gw.process_cancel(1));
    let r = gw.process_order(&OrderMessage::limit(INSTRUMENT, 66, 1, Side::Buy, MIN, 1, 0));
    assert!(r.accepted);
    assert_eq!(gw.engine().arena().high_water_mark(), 64);
    audit(&gw);
}

#[test]
fn single_level_contention() {
    let mut gw = gateway(4096);
    let px = 50_000 * PRICE_SCALE;

    // 1000 sells queue at one price; one giant buy consumes them in 16
    // submissions (64-trade cap per submission).
    for i in 1..=1000u64 {
        gw.process_order(&OrderMessage::limit(INSTRUMENT, i, 1, Side::Sell, px, 10, i));
    }
    audit(&gw);

    let mut filled = 0u64;
    let mut buy_id = 10_000;
    while filled < 10_000 {
        buy_id += 1;
        let r = gw.process_order(&OrderMessage::ioc(
            INSTRUMENT,
            buy_id,
            2,
            Side::Buy,
            px,
            10_000 - filled,
            0,
        ));
        assert!(r.trade_count > 0, "liquidity remains, fills must continue");
        filled += r.filled_quantity;
        audit(&gw);
    }

    assert!(gw.engine().book().is_empty());
    assert_eq!(gw.engine().total_trade_count(), 1000);
}

#[test]
fn random_churn_keeps_invariants() {
    let mut gw = gateway(8192);
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut live: Vec<u64> = Vec::new();
    let mut next_id = 1u64;

    for step in 0..20_000 {
        let roll: f64 = rng.gen();
        if roll < 0.6 || live.is_empty() {
            let id = next_id;
            next_id += 1;
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            let price = (45_000 + rng.gen_range(0..10_000)) as Price * PRICE_SCALE;
            let qty = rng.gen_range(1..500);
            let r = gw.process_order(&OrderMessage::limit(
                INSTRUMENT, id, rng.gen_range(1..50), side, price, qty, id,
            ));
            if matches!(r.match_status, MatchStatus::Resting | MatchStatus::PartialFill) {
                live.push(id);
            }
        } else if roll < 0.85 {
            let i = rng.gen_range(0..live.len());
            let id = live.swap_remove(i);
            // May already have been consumed by matching.
            let _ = gw.process_cancel(id);
        } else {
            let i = rng.gen_range(0..live.len());
            let id = live[i];
            let price = (45_000 + rng.gen_range(0..10_000)) as Price * PRICE_SCALE;
            let qty = rng.gen_range(1..500);
            let r = gw.process_modify(&OrderMessage::modify(INSTRUMENT, id, price, qty, id));
            if !r.accepted || !matches!(
                r.match_status,
                MatchStatus::Resting | MatchStatus::PartialFill | MatchStatus::Modified
            ) {
                live.swap_remove(i);
            }
        }

        if step % 1000 == 0 {
            audit(&gw);
        }
    }
    audit(&gw);

    // Drain the book completely; every remaining id must cancel cleanly.
    let book_orders = gw.engine().book().order_count();
    let mut cancelled = 0;
    for id in 1..next_id {
        if gw.process_cancel(id) {
            cancelled += 1;
        }
    }
    assert_eq!(cancelled, book_orders);
    assert!(gw.engine().book().is_empty());
    assert!(gw.engine().arena().is_empty());
    audit(&gw);
}

#[test]
fn extreme_quantities_and_prices() {
    let mut gw = gateway(64);

    // Max-range prices with large quantities.
    let r = gw.process_order(&OrderMessage::limit(
        INSTRUMENT,
        1,
        1,
        Side::Buy,
        MIN,
        u32::MAX as u64,
        0,
    ));
    assert_eq!(r.match_status, MatchStatus::Resting);
    let r = gw.process_order(&OrderMessage::limit(
        INSTRUMENT,
        2,
        2,
        Side::Sell,
        MAX,
        u32::MAX as u64,
        0,
    ));
    assert_eq!(r.match_status, MatchStatus::Resting);
    audit(&gw);

    // A sell down at MIN crosses the whole bid.
    let r = gw.process_order(&OrderMessage::limit(
        INSTRUMENT,
        3,
        3,
        Side::Sell,
        MIN,
        u32::MAX as u64,
        0,
    ));
    assert_eq!(r.match_status, MatchStatus::Filled);
    assert_eq!(r.filled_quantity, u32::MAX as u64);
    audit(&gw);
}
