//! Firehose — end-to-end pipeline demo and soak driver.
//!
//! Three threads, two SPSC rings:
//!
//! ```text
//! [feed] --OrderMessage ring--> [matching, pinned] --EventMessage ring--> [publisher]
//! ```
//!
//! The feed thread generates a seeded random command mix (adds, cancels,
//! modifies across two instruments), the matching thread routes and matches,
//! the publisher counts what comes out the far end. Prints throughput,
//! per-command latency percentiles, and pipeline statistics.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use hdrhistogram::Histogram;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use tickmatch::{
    clock, ring, CommandKind, EventKind, InstrumentConfig, InstrumentRegistry, InstrumentRouter,
    MarketDataPublisher, OrderMessage, Side, StpMode, EVENT_RING_CAPACITY, PRICE_SCALE,
};

const COMMAND_COUNT: usize = 1_000_000;
const COMMAND_RING_CAPACITY: usize = 65_536;
const SEED: u64 = 0xF1DE;

fn registry() -> InstrumentRegistry {
    let mut reg = InstrumentRegistry::new();
    reg.register(InstrumentConfig {
        instrument_id: 1,
        symbol: "BTCUSDT".into(),
        min_price: 40_000 * PRICE_SCALE,
        max_price: 60_000 * PRICE_SCALE,
        tick_size: PRICE_SCALE,
        max_orders: 1 << 20,
    })
    .expect("btc config");
    reg.register(InstrumentConfig {
        instrument_id: 2,
        symbol: "ETHUSDT".into(),
        min_price: 1_000 * PRICE_SCALE,
        max_price: 5_000 * PRICE_SCALE,
        tick_size: PRICE_SCALE / 10,
        max_orders: 1 << 20,
    })
    .expect("eth config");
    reg
}

struct Feed {
    rng: ChaCha8Rng,
    next_order_id: u64,
    /// Live order ids per instrument, for cancels and modifies.
    live: [Vec<u64>; 2],
}

impl Feed {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_order_id: 1,
            live: [Vec::new(), Vec::new()],
        }
    }

    fn price_for(&mut self, instrument: u32) -> i64 {
        match instrument {
            1 => self.rng.gen_range(49_000..51_000) * PRICE_SCALE,
            _ => self.rng.gen_range(19_000..21_000) * (PRICE_SCALE / 10),
        }
    }

    fn next(&mut self) -> OrderMessage {
        let instrument = if self.rng.gen_bool(0.7) { 1u32 } else { 2u32 };
        let slot = instrument as usize - 1;
        let roll: f64 = self.rng.gen();

        if roll < 0.78 || self.live[slot].is_empty() {
            let order_id = self.next_order_id;
            self.next_order_id += 1;
            let participant = self.rng.gen_range(1..100);
            let side = if self.rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            let price = self.price_for(instrument);
            let qty = self.rng.gen_range(1..500);
            let ts = clock::now_nanos();

            let type_roll: f64 = self.rng.gen();
            let msg = if type_roll < 0.85 {
                self.live[slot].push(order_id);
                OrderMessage::limit(instrument, order_id, participant, side, price, qty, ts)
            } else if type_roll < 0.93 {
                OrderMessage::ioc(instrument, order_id, participant, side, price, qty, ts)
            } else if type_roll < 0.97 {
                OrderMessage::market(instrument, order_id, participant, side, qty, ts)
            } else {
                self.live[slot].push(order_id);
                let total = qty * 4;
                OrderMessage::iceberg(
                    instrument, order_id, participant, side, price, total, qty, ts,
                )
            };
            msg
        } else if roll < 0.94 {
            let i = self.rng.gen_range(0..self.live[slot].len());
            let order_id = self.live[slot].swap_remove(i);
            OrderMessage::cancel(instrument, order_id)
        } else {
            let i = self.rng.gen_range(0..self.live[slot].len());
            let order_id = self.live[slot][i];
            let price = self.price_for(instrument);
            let qty = self.rng.gen_range(1..500);
            OrderMessage::modify(instrument, order_id, price, qty, clock::now_nanos())
        }
    }
}

fn pin_to_last_core() {
    if let Some(core_ids) = core_affinity::get_core_ids() {
        if let Some(last) = core_ids.last() {
            core_affinity::set_for_current(*last);
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let (mut cmd_tx, mut cmd_rx) = ring::channel::<OrderMessage>(COMMAND_RING_CAPACITY);
    let (event_tx, event_rx) = ring::channel(EVENT_RING_CAPACITY);

    // Publisher thread: count events by kind.
    let trades = Arc::new(AtomicU64::new(0));
    let terminals = Arc::new(AtomicU64::new(0));
    let mut publisher = MarketDataPublisher::new(event_rx);
    {
        let trades = Arc::clone(&trades);
        let terminals = Arc::clone(&terminals);
        publisher.register_callback(move |event| {
            if event.kind == EventKind::Trade {
                trades.fetch_add(1, Ordering::Relaxed);
            } else {
                terminals.fetch_add(1, Ordering::Relaxed);
            }
        });
    }
    let stop = publisher.stop_handle();
    let publisher_thread = thread::spawn(move || {
        publisher.run();
        publisher.events_processed()
    });

    // Matching thread: pinned, drains the command ring through the router.
    let feed_done = Arc::new(AtomicBool::new(false));
    let matching_done = Arc::clone(&feed_done);
    let matching_thread = thread::spawn(move || {
        pin_to_last_core();

        let reg = registry();
        let mut router =
            InstrumentRouter::new(&reg, Some(event_tx), StpMode::None).expect("router");
        router.warm_up();

        let mut histogram = Histogram::<u64>::new_with_bounds(1, 10_000_000, 3).expect("histogram");
        let mut processed = 0usize;
        loop {
            match cmd_rx.try_pop() {
                Some(msg) => {
                    let start = Instant::now();
                    match msg.kind {
                        CommandKind::Add => {
                            router.process_order(&msg);
                        }
                        CommandKind::Cancel => {
                            router.process_cancel(msg.instrument_id, msg.order.order_id);
                        }
                        CommandKind::Modify => {
                            router.process_modify(&msg);
                        }
                    }
                    histogram.record(start.elapsed().as_nanos() as u64).unwrap_or(());
                    processed += 1;
                }
                None => {
                    if matching_done.load(Ordering::Acquire) {
                        break;
                    }
                    std::hint::spin_loop();
                }
            }
        }

        let stats: Vec<(u32, u64, u64, u64, u64)> = [1u32, 2]
            .iter()
            .map(|&id| {
                let gw = &router.pipeline(id).unwrap().gateway;
                (
                    id,
                    gw.orders_processed(),
                    gw.orders_rejected(),
                    gw.engine().total_trade_count(),
                    gw.backpressure_count(),
                )
            })
            .collect();
        (processed, histogram, stats)
    });

    // Feed thread is this one.
    let start = Instant::now();
    let mut feed = Feed::new(SEED);
    for _ in 0..COMMAND_COUNT {
        let msg = feed.next();
        while !cmd_tx.try_push(msg) {
            std::hint::spin_loop();
        }
    }
    feed_done.store(true, Ordering::Release);

    let (processed, histogram, stats) = matching_thread.join().expect("matching thread");
    let elapsed = start.elapsed();

    stop.stop();
    let events = publisher_thread.join().expect("publisher thread");

    let throughput = processed as f64 / elapsed.as_secs_f64();

    println!("== firehose ==");
    println!("commands        {processed}");
    println!("elapsed         {:.3}s", elapsed.as_secs_f64());
    println!("throughput      {:.0} cmd/s", throughput);
    println!("--- latency (ns) ---");
    println!("min     {:6}", histogram.min());
    println!("p50     {:6}", histogram.value_at_quantile(0.50));
    println!("p90     {:6}", histogram.value_at_quantile(0.90));
    println!("p99     {:6}", histogram.value_at_quantile(0.99));
    println!("p99.9   {:6}", histogram.value_at_quantile(0.999));
    println!("p99.99  {:6}", histogram.value_at_quantile(0.9999));
    println!("max     {:6}", histogram.max());
    println!("events          {events}");
    println!(
        "  trades        {}",
        trades.load(Ordering::Relaxed)
    );
    println!(
        "  terminals     {}",
        terminals.load(Ordering::Relaxed)
    );
    for (id, ok, rejected, trade_count, backpressure) in stats {
        println!(
            "instrument {id}    processed={ok} rejected={rejected} trades={trade_count} backpressure={backpressure}"
        );
    }
}
