//! Hot-path allocation audit.
//!
//! Installs a counting global allocator, builds and warms a full pipeline,
//! then asserts that a submit/cancel/modify/publish workload performs zero
//! heap allocations between warmup and shutdown. This is a correctness
//! invariant of the matching thread, not a perf nicety.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

use tickmatch::{
    channel, shared_channel, MatchingEngine, OrderArena, OrderBook, OrderGateway, OrderMessage,
    Price, Side, StpMode, PRICE_SCALE,
};

struct CountingAllocator;

static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        System.alloc(layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        System.alloc_zeroed(layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        System.realloc(ptr, layout, new_size)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator;

const MIN: Price = 40_000 * PRICE_SCALE;
const MAX: Price = 60_000 * PRICE_SCALE;
const TICK: Price = PRICE_SCALE;
const PX: Price = 50_000 * PRICE_SCALE;
const INSTRUMENT: u32 = 1;

#[test]
fn hot_path_performs_no_heap_allocation() {
    // --- Startup: everything is allowed to allocate here. ---
    let book = OrderBook::new(MIN, MAX, TICK, 8192).unwrap();
    let arena = OrderArena::new(8192);
    let mut engine = MatchingEngine::new(book, arena, StpMode::CancelOldest);
    engine.warm_up();

    let (tx, mut rx) = channel(1 << 14);
    let mut gw = OrderGateway::with_channel(engine, INSTRUMENT, shared_channel(tx));

    // Pre-seed some resting liquidity so the workload crosses.
    for id in 1..=64u64 {
        gw.process_order(&OrderMessage::limit(
            INSTRUMENT,
            id,
            1,
            Side::Sell,
            PX + (id as Price % 8) * TICK,
            50,
            id,
        ));
    }

    // --- Region of interest. ---
    let before = ALLOCATIONS.load(Ordering::SeqCst);

    let mut events_seen = 0u64;
    let mut next_id = 1_000u64;
    for round in 0..200u64 {
        // Crossing buy (iceberg every 4th round for the replenish path).
        next_id += 1;
        if round % 4 == 0 {
            gw.process_order(&OrderMessage::iceberg(
                INSTRUMENT,
                next_id,
                2,
                Side::Buy,
                PX,
                120,
                40,
                round,
            ));
        } else {
            gw.process_order(&OrderMessage::ioc(
                INSTRUMENT,
                next_id,
                2,
                Side::Buy,
                PX + TICK,
                30,
                round,
            ));
        }

        // Resting sell to keep liquidity topped up.
        next_id += 1;
        gw.process_order(&OrderMessage::limit(
            INSTRUMENT,
            next_id,
            1,
            Side::Sell,
            PX + (round as Price % 8) * TICK,
            50,
            round,
        ));

        // Modify it, cancel it.
        gw.process_modify(&OrderMessage::modify(
            INSTRUMENT,
            next_id,
            PX + 2 * TICK,
            60,
            round,
        ));
        gw.process_cancel(next_id);

        // Drain the ring inline (single-threaded consumer for the audit).
        while let Some(_e) = rx.try_pop() {
            events_seen += 1;
        }
    }

    let after = ALLOCATIONS.load(Ordering::SeqCst);

    // --- Shutdown checks. ---
    assert_eq!(
        after - before,
        0,
        "hot path allocated {} time(s)",
        after - before
    );
    assert!(events_seen > 400, "workload must have published events");
    gw.engine().book().validate(gw.engine().arena()).unwrap();
}
