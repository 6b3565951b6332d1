//! Lock-free single-producer single-consumer ring buffer.
//!
//! The only synchronization primitive between the matching thread and the
//! publisher thread. Zero allocation after construction; no locks, no
//! condition variables, no seq-cst fences.
//!
//! Head and tail are monotonically increasing 64-bit counters masked into the
//! slot array, so wrap-around arithmetic stays correct over the full index
//! space. Each counter lives on its own cache line — producer and consumer
//! never false-share.
//!
//! Memory ordering: the producer release-stores `head` after writing the
//! slot; the consumer's acquire-load of `head` therefore observes the slot
//! contents. Symmetrically for `tail`, which hands slots back to the
//! producer.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Pads a value out to its own 64-byte cache line.
#[repr(align(64))]
struct CachePadded<T>(T);

struct Shared<T> {
    head: CachePadded<AtomicU64>,
    tail: CachePadded<AtomicU64>,
    mask: u64,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// The SPSC contract (one pusher, one popper, enforced by the unique handle
// types below) is what makes the raw slot accesses sound.
unsafe impl<T: Copy + Send> Send for Shared<T> {}
unsafe impl<T: Copy + Send> Sync for Shared<T> {}

/// Create a ring with `capacity` slots (must be a power of two).
///
/// Returns the two endpoint handles. Each is `Send` but not `Clone`: exactly
/// one thread may push and exactly one (possibly different) thread may pop.
///
/// # Panics
/// Panics if `capacity` is zero or not a power of two — a construction-time
/// configuration error.
pub fn channel<T: Copy>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(capacity > 0, "ring capacity must be non-zero");
    assert!(
        capacity.is_power_of_two(),
        "ring capacity must be a power of two, got {capacity}"
    );

    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let shared = Arc::new(Shared {
        head: CachePadded(AtomicU64::new(0)),
        tail: CachePadded(AtomicU64::new(0)),
        mask: capacity as u64 - 1,
        slots,
    });

    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

/// Writing endpoint. Exactly one thread may hold and use this.
pub struct Producer<T: Copy> {
    shared: Arc<Shared<T>>,
}

/// Reading endpoint. Exactly one thread may hold and use this.
pub struct Consumer<T: Copy> {
    shared: Arc<Shared<T>>,
}

impl<T: Copy> Producer<T> {
    /// Copy `value` into the ring. Returns false when the ring is full —
    /// the caller decides whether to spin, count, or drop.
    #[inline]
    pub fn try_push(&mut self, value: T) -> bool {
        let shared = &*self.shared;
        let head = shared.head.0.load(Ordering::Relaxed);
        let tail = shared.tail.0.load(Ordering::Acquire);

        if head.wrapping_sub(tail) >= shared.mask + 1 {
            return false; // full
        }

        let slot = &shared.slots[(head & shared.mask) as usize];
        // Sole producer: this slot is outside the consumer's visible range
        // until the release store below.
        unsafe { (*slot.get()).write(value) };
        shared.head.0.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    /// Items currently queued (racy snapshot).
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.shared.head.0.load(Ordering::Acquire);
        let tail = self.shared.tail.0.load(Ordering::Acquire);
        head.wrapping_sub(tail) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        (self.shared.mask + 1) as usize
    }
}

impl<T: Copy> Consumer<T> {
    /// Pop the oldest item, or `None` when the ring is empty.
    #[inline]
    pub fn try_pop(&mut self) -> Option<T> {
        let shared = &*self.shared;
        let tail = shared.tail.0.load(Ordering::Relaxed);
        let head = shared.head.0.load(Ordering::Acquire);

        if tail == head {
            return None; // empty
        }

        let slot = &shared.slots[(tail & shared.mask) as usize];
        // The acquire load of head ordered this slot's contents before us.
        let value = unsafe { (*slot.get()).assume_init() };
        shared.tail.0.store(tail.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Items currently queued (racy snapshot).
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.shared.head.0.load(Ordering::Acquire);
        let tail = self.shared.tail.0.load(Ordering::Acquire);
        head.wrapping_sub(tail) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        (self.shared.mask + 1) as usize
    }
}
