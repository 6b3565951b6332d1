//! Market-data publisher — the cold-path consumer of the event ring.
//!
//! Runs on its own thread, drains the ring, and fans each event out to the
//! registered callbacks in registration order. Callbacks may block; that is
//! the subscriber's latency budget, not the matching thread's.
//!
//! Shutdown is cooperative: a [`StopHandle`] flips an atomic flag, `run`
//! notices, drains whatever is left in the ring, and returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::message::EventMessage;
use crate::ring::Consumer;

/// Subscriber callback. Boxed and registered once at startup — never on the
/// hot path.
pub type EventCallback = Box<dyn FnMut(&EventMessage) + Send>;

/// Thread-safe signal to exit a running publisher loop.
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Single-threaded consumer that dispatches events to subscribers.
pub struct MarketDataPublisher {
    consumer: Consumer<EventMessage>,
    callbacks: Vec<EventCallback>,
    running: Arc<AtomicBool>,
    events_processed: u64,
    last_sequence: u64,
}

impl MarketDataPublisher {
    pub fn new(consumer: Consumer<EventMessage>) -> Self {
        Self {
            consumer,
            callbacks: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
            events_processed: 0,
            last_sequence: 0,
        }
    }

    /// Register a subscriber. Call before `run`/`poll` — registration is not
    /// synchronized with dispatch.
    pub fn register_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&EventMessage) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Handle for stopping a `run` loop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Drain the ring until empty. Returns the number of events dispatched.
    pub fn poll(&mut self) -> usize {
        let mut count = 0;
        while let Some(event) = self.consumer.try_pop() {
            for callback in &mut self.callbacks {
                callback(&event);
            }
            self.last_sequence = event.sequence;
            self.events_processed += 1;
            count += 1;
        }
        count
    }

    /// Poll in a loop, yielding to the OS when the ring is empty. Returns
    /// after [`StopHandle::stop`] is observed and the ring is drained.
    pub fn run(&mut self) {
        self.running.store(true, Ordering::Release);
        debug!("publisher loop started");

        while self.running.load(Ordering::Acquire) {
            if self.poll() == 0 {
                std::thread::yield_now();
            }
        }

        // Final drain so no event published before stop() is lost.
        let drained = self.poll();
        debug!(drained, "publisher loop stopped");
    }

    /// Events dispatched since construction.
    #[inline]
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Sequence number of the most recent event dispatched.
    #[inline]
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }
}
