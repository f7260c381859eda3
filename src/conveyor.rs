//! Fixed-capacity conveyor of slot handles.
//!
//! # Overview
//! - `N` handle entries (`N` a power of two, at most 256) circulate `N - 1` slots.
//! - Four 8-bit cursors split the handle array into four contiguous regions.
//! - Every operation moves exactly one cursor by one step; no locks, no CAS,
//!   no allocation, no waiting.
//!
//! # Regions
//! Walking the handle array forward from `recycle_at` the cursors always come
//! in this order, each one delimiting the region it opens:
//!
//! ```text
//! recycle_at  ..  dequeue_at   lent to the consumer
//! dequeue_at  ..  enqueue_at   queued, FIFO
//! enqueue_at  ..  fetch_at     lent to the producer, plus one reserved entry
//! fetch_at    ..  recycle_at   free
//! ```
//!
//! The reserved entry keeps `fetch_at == recycle_at` meaning "nothing to
//! fetch" and `dequeue_at == enqueue_at` meaning "nothing queued" without a
//! separate count. It is why a conveyor of `N` entries offers `N - 1` slots.
//!
//! # Memory ordering
//! Each cursor is stored only by the operation that owns it. The producer
//! writes the slot value and the slot id, then publishes `enqueue_at` with
//! `Release`; the consumer `Acquire`-loads it before reading either. The same
//! pairing on `recycle_at` hands recycled slots back to the producer.

use core::mem::MaybeUninit;
use core::ptr;

#[cfg(loom)]
use loom::sync::atomic::{AtomicU8, Ordering};
#[cfg(all(not(loom), not(feature = "portable-atomic")))]
use core::sync::atomic::{AtomicU8, Ordering};
#[cfg(all(not(loom), feature = "portable-atomic"))]
use portable_atomic::{AtomicU8, Ordering};

use crate::handle::{DrainHandle, FillHandle, Handle, SlotCell, SlotId};
use crate::role::{Consumer, Producer};

/// Snapshot of how many slots sit in each state.
///
/// The four counts always add up to [`Conveyor::SLOTS`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Regions {
    /// Available to `fetch`.
    pub free: usize,
    /// Fetched and not yet enqueued.
    pub producing: usize,
    /// Enqueued and not yet dequeued.
    pub queued: usize,
    /// Dequeued and not yet recycled.
    pub consuming: usize,
}

/// Transport buffer handing slots between a producer and a consumer.
///
/// The flat operations (`fetch`, `enqueue`, `dequeue`, `recycle`) take `&self`
/// and may be mixed freely by code running in one context: a `Conveyor` is
/// not `Sync`, so it can never be reached from two contexts at once. To put
/// the producer and the consumer in different contexts (main loop and
/// interrupt handler, or two threads) use [`Conveyor::split`].
///
/// # Memory
/// The arena has `N` cells for `N - 1` slots. Cell 0 pairs with the reserved
/// handle entry and stays uninitialized: it costs `size_of::<T>()` bytes of
/// RAM but no `T` is ever built or dropped in it.
pub struct Conveyor<T, const N: usize> {
    /// Slot arena. Cell 0 never circulates; see the module docs.
    slots: [SlotCell<T>; N],
    /// Slot ids, partitioned into regions by the cursors below.
    handles: [AtomicU8; N],
    /// Next entry `fetch` hands out. Stored by the producer.
    fetch_at: AtomicU8,
    /// Entry `enqueue` writes next. Stored by the producer.
    enqueue_at: AtomicU8,
    /// Next entry `dequeue` hands out. Stored by the consumer.
    dequeue_at: AtomicU8,
    /// Entry `recycle` writes next. Stored by the consumer.
    recycle_at: AtomicU8,
}

impl<T: Default, const N: usize> Conveyor<T, N> {
    pub fn new() -> Self {
        const {
            assert!(N.is_power_of_two(), "conveyor size must be a power of two");
            assert!(N >= 2 && N <= 256, "conveyor size must fit an 8-bit cursor");
        }
        Self {
            slots: core::array::from_fn(|i| match i {
                0 => SlotCell::new(MaybeUninit::uninit()),
                _ => SlotCell::new(MaybeUninit::new(T::default())),
            }),
            handles: core::array::from_fn(|i| AtomicU8::new(i as u8)),
            fetch_at: AtomicU8::new(1),
            enqueue_at: AtomicU8::new(0),
            dequeue_at: AtomicU8::new(0),
            recycle_at: AtomicU8::new(0),
        }
    }
}

impl<T: Default, const N: usize> Default for Conveyor<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for Conveyor<T, N> {
    fn drop(&mut self) {
        for cell in &self.slots[1..] {
            #[cfg(not(loom))]
            unsafe {
                (*cell.get()).assume_init_drop()
            };
            #[cfg(loom)]
            cell.with_mut(|slot| unsafe { (*slot).assume_init_drop() });
        }
    }
}

impl<T, const N: usize> Conveyor<T, N> {
    /// Number of slots that can be outstanding at once.
    pub const SLOTS: usize = N - 1;

    const MASK: u8 = (N - 1) as u8;

    #[inline(always)]
    const fn next(i: u8) -> u8 {
        i.wrapping_add(1) & Self::MASK
    }

    #[inline(always)]
    const fn distance(from: u8, to: u8) -> usize {
        (to.wrapping_sub(from) & Self::MASK) as usize
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        Self::SLOTS
    }

    /// Handle for the slot named by handle entry `at`, which the caller's role
    /// has just claimed.
    #[inline(always)]
    fn lend<R>(&self, at: u8) -> Handle<'_, T, R> {
        let id = SlotId(self.handles[at as usize].load(Ordering::Relaxed));
        // Ids in the handle array are 1..N, each present once, and every
        // circulating cell is initialized.
        unsafe { Handle::new(id, &self.slots[id.index()]) }
    }

    #[inline(always)]
    fn owns<R>(&self, handle: &Handle<'_, T, R>) -> bool {
        self.slots
            .get(handle.slot().index())
            .is_some_and(|cell| ptr::eq(cell, handle.cell()))
    }

    /// Take a free slot for filling. `None` if every slot is out.
    #[inline]
    pub fn fetch(&self) -> Option<FillHandle<'_, T>> {
        let e = self.fetch_at.load(Ordering::Relaxed);
        if e == self.recycle_at.load(Ordering::Acquire) {
            return None;
        }
        let handle = self.lend(e);
        self.fetch_at.store(Self::next(e), Ordering::Release);
        Some(handle)
    }

    /// Queue a filled slot for the consumer.
    ///
    /// # Panics
    /// If `handle` was fetched from a different conveyor.
    #[inline]
    pub fn enqueue(&self, handle: FillHandle<'_, T>) {
        assert!(self.owns(&handle), "handle belongs to another conveyor");
        unsafe { self.enqueue_unchecked(handle) }
    }

    /// [`enqueue`](Self::enqueue) without the ownership check.
    ///
    /// # Safety
    /// `handle` must have been fetched from this conveyor.
    #[inline]
    pub unsafe fn enqueue_unchecked(&self, handle: FillHandle<'_, T>) {
        let id = handle.slot();
        drop(handle);
        let p = self.enqueue_at.load(Ordering::Relaxed);
        self.handles[p as usize].store(id.0, Ordering::Relaxed);
        self.enqueue_at.store(Self::next(p), Ordering::Release);
    }

    /// Take the oldest queued slot. `None` if nothing is queued.
    #[inline]
    pub fn dequeue(&self) -> Option<DrainHandle<'_, T>> {
        let f = self.dequeue_at.load(Ordering::Relaxed);
        if f == self.enqueue_at.load(Ordering::Acquire) {
            return None;
        }
        let handle = self.lend(f);
        self.dequeue_at.store(Self::next(f), Ordering::Release);
        Some(handle)
    }

    /// Return a drained slot to the free region.
    ///
    /// # Panics
    /// If `handle` was dequeued from a different conveyor.
    #[inline]
    pub fn recycle(&self, handle: DrainHandle<'_, T>) {
        assert!(self.owns(&handle), "handle belongs to another conveyor");
        unsafe { self.recycle_unchecked(handle) }
    }

    /// [`recycle`](Self::recycle) without the ownership check.
    ///
    /// # Safety
    /// `handle` must have been dequeued from this conveyor.
    #[inline]
    pub unsafe fn recycle_unchecked(&self, handle: DrainHandle<'_, T>) {
        let id = handle.slot();
        drop(handle);
        let c = self.recycle_at.load(Ordering::Relaxed);
        self.handles[c as usize].store(id.0, Ordering::Relaxed);
        self.recycle_at.store(Self::next(c), Ordering::Release);
    }

    /// Region sizes at the moment of the call.
    pub fn regions(&self) -> Regions {
        let c = self.recycle_at.load(Ordering::Acquire);
        let f = self.dequeue_at.load(Ordering::Acquire);
        let p = self.enqueue_at.load(Ordering::Acquire);
        let e = self.fetch_at.load(Ordering::Acquire);
        let free = Self::distance(e, c);
        let queued = Self::distance(f, p);
        let consuming = Self::distance(c, f);
        // `[p, e)` can span all N entries, which the masked distance reads as 0.
        Regions {
            free,
            producing: Self::SLOTS.saturating_sub(free + queued + consuming),
            queued,
            consuming,
        }
    }

    #[inline]
    pub(crate) fn free_len(&self) -> usize {
        let e = self.fetch_at.load(Ordering::Relaxed);
        Self::distance(e, self.recycle_at.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn queued_len(&self) -> usize {
        let f = self.dequeue_at.load(Ordering::Relaxed);
        Self::distance(f, self.enqueue_at.load(Ordering::Acquire))
    }

    /// Split into a producer and a consumer that may live in different
    /// contexts.
    ///
    /// The exclusive borrow guarantees there is exactly one of each for as
    /// long as they exist. Both are `Send` when `T` is, so either one can be
    /// moved into an interrupt handler or another thread. Handles they lend
    /// stay valid for the whole borrow.
    pub fn split(&mut self) -> (Producer<'_, T, N>, Consumer<'_, T, N>) {
        let this: &Self = self;
        (Producer::new(this), Consumer::new(this))
    }
}


#[cfg(all(test, not(loom)))]
mod prop_tests {
    use super::Conveyor;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::vec::Vec;

    #[derive(Debug, Clone)]
    enum Op {
        Fetch(u32),
        Enqueue,
        Dequeue,
        Recycle,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u32>().prop_map(Op::Fetch),
            Just(Op::Enqueue),
            Just(Op::Dequeue),
            Just(Op::Recycle),
        ]
    }

    proptest! {
        /// Random interleavings keep FIFO order and the slot accounting.
        #[test]
        fn matches_queue_model(ops in proptest::collection::vec(op_strategy(), 0..400)) {
            const N: usize = 8;
            let conveyor = Conveyor::<u32, N>::new();
            let mut producing = VecDeque::new();
            let mut consuming = VecDeque::new();
            let mut model = VecDeque::new();

            for op in ops {
                match op {
                    Op::Fetch(v) => match conveyor.fetch() {
                        Some(mut h) => {
                            *h = v;
                            producing.push_back(h);
                        }
                        None => {
                            prop_assert_eq!(producing.len() + model.len() + consuming.len(), N - 1);
                        }
                    },
                    Op::Enqueue => {
                        if let Some(h) = producing.pop_front() {
                            model.push_back(*h);
                            conveyor.enqueue(h);
                        }
                    }
                    Op::Dequeue => match conveyor.dequeue() {
                        Some(h) => {
                            prop_assert_eq!(Some(*h), model.pop_front());
                            consuming.push_back(h);
                        }
                        None => prop_assert!(model.is_empty()),
                    },
                    Op::Recycle => {
                        if let Some(h) = consuming.pop_front() {
                            conveyor.recycle(h);
                        }
                    }
                }

                let regions = conveyor.regions();
                prop_assert_eq!(regions.producing, producing.len());
                prop_assert_eq!(regions.queued, model.len());
                prop_assert_eq!(regions.consuming, consuming.len());
                prop_assert_eq!(
                    regions.free + regions.producing + regions.queued + regions.consuming,
                    N - 1
                );
            }

            let mut lent: Vec<_> = producing
                .iter()
                .map(|h| h.slot())
                .chain(consuming.iter().map(|h| h.slot()))
                .collect();
            lent.sort();
            lent.dedup();
            prop_assert_eq!(lent.len(), producing.len() + consuming.len());
        }
    }
}
