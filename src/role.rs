//! Producer and consumer views over a split [`Conveyor`].
//!
//! Each view exposes only the two operations of its role. The views are the
//! role tokens: whoever holds the [`Producer`] is the one producer, and the
//! same for the [`Consumer`]. A role can be time-shared between call sites by
//! passing its view around, or by parking it behind whatever critical section
//! the target provides.
//!
//! A slot fetched by the producer can only go back through `enqueue`:
//!
//! ```compile_fail
//! use conveyor::Conveyor;
//!
//! let mut conveyor = Conveyor::<u8, 4>::new();
//! let (mut producer, mut consumer) = conveyor.split();
//! let fetched = producer.fetch().unwrap();
//! consumer.recycle(fetched);
//! ```

use crate::conveyor::Conveyor;
use crate::handle::{DrainHandle, FillHandle};

pub struct Producer<'c, T, const N: usize> {
    conveyor: &'c Conveyor<T, N>,
}

// The producer touches only `fetch_at`, `enqueue_at` and the entries it owns;
// `split` guarantees no other producer exists.
unsafe impl<T: Send, const N: usize> Send for Producer<'_, T, N> {}

impl<'c, T, const N: usize> Producer<'c, T, N> {
    #[inline]
    pub(crate) fn new(conveyor: &'c Conveyor<T, N>) -> Self {
        Self { conveyor }
    }

    /// Take a free slot for filling. `None` if every slot is out.
    #[inline]
    pub fn fetch(&mut self) -> Option<FillHandle<'c, T>> {
        self.conveyor.fetch()
    }

    /// Queue a slot previously fetched through this producer.
    ///
    /// # Panics
    /// If `handle` was fetched from a different conveyor.
    #[inline]
    pub fn enqueue(&mut self, handle: FillHandle<'c, T>) {
        self.conveyor.enqueue(handle)
    }

    /// # Safety
    /// `handle` must have been fetched through this producer.
    #[inline]
    pub unsafe fn enqueue_unchecked(&mut self, handle: FillHandle<'c, T>) {
        unsafe { self.conveyor.enqueue_unchecked(handle) }
    }

    /// Fetch, fill and enqueue in one step.
    /// Hands `value` back if no slot is free.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), T> {
        match self.fetch() {
            Some(mut handle) => {
                *handle = value;
                self.enqueue(handle);
                Ok(())
            }
            None => Err(value),
        }
    }

    /// Slots currently free to fetch.
    #[inline]
    pub fn available(&self) -> usize {
        self.conveyor.free_len()
    }
}

pub struct Consumer<'c, T, const N: usize> {
    conveyor: &'c Conveyor<T, N>,
}

// Mirror of the producer: only `dequeue_at`, `recycle_at` and consumer-owned
// entries are written from here.
unsafe impl<T: Send, const N: usize> Send for Consumer<'_, T, N> {}

impl<'c, T, const N: usize> Consumer<'c, T, N> {
    #[inline]
    pub(crate) fn new(conveyor: &'c Conveyor<T, N>) -> Self {
        Self { conveyor }
    }

    /// Take the oldest queued slot. `None` if nothing is queued.
    #[inline]
    pub fn dequeue(&mut self) -> Option<DrainHandle<'c, T>> {
        self.conveyor.dequeue()
    }

    /// Return a slot previously dequeued through this consumer.
    ///
    /// # Panics
    /// If `handle` was dequeued from a different conveyor.
    #[inline]
    pub fn recycle(&mut self, handle: DrainHandle<'c, T>) {
        self.conveyor.recycle(handle)
    }

    /// # Safety
    /// `handle` must have been dequeued through this consumer.
    #[inline]
    pub unsafe fn recycle_unchecked(&mut self, handle: DrainHandle<'c, T>) {
        unsafe { self.conveyor.recycle_unchecked(handle) }
    }

    /// Items queued and waiting.
    #[inline]
    pub fn pending(&self) -> usize {
        self.conveyor.queued_len()
    }

    /// Drain at most one item.
    /// Returns true if an item was delivered to the hook.
    #[inline]
    pub fn poll_one(&mut self, hook: impl FnOnce(&T)) -> bool {
        match self.dequeue() {
            Some(handle) => {
                hook(&*handle);
                self.recycle(handle);
                true
            }
            None => false,
        }
    }

    /// Drain up to `max` items in FIFO order, recycling each after the hook
    /// has seen it. Returns how many were delivered.
    pub fn poll_up_to(&mut self, max: usize, mut hook: impl FnMut(&T)) -> usize {
        let mut read = 0usize;
        while read < max {
            let Some(handle) = self.dequeue() else {
                break;
            };
            hook(&*handle);
            self.recycle(handle);
            read += 1;
        }
        read
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use crate::Conveyor;
    use std::thread;
    use std::vec::Vec;

    #[test]
    fn poll_one_empty_returns_false() {
        let mut conveyor = Conveyor::<u32, 4>::new();
        let (_producer, mut consumer) = conveyor.split();
        assert!(!consumer.poll_one(|_| {}));
    }

    #[test]
    fn push_reports_full_and_returns_value() {
        let mut conveyor = Conveyor::<u32, 4>::new();
        let (mut producer, mut consumer) = conveyor.split();

        assert_eq!(producer.available(), 3);
        for v in 0..3 {
            assert_eq!(producer.push(v), Ok(()));
        }
        assert_eq!(producer.available(), 0);
        assert_eq!(producer.push(99), Err(99));
        assert_eq!(consumer.pending(), 3);

        let mut got = None;
        assert!(consumer.poll_one(|v| got = Some(*v)));
        assert_eq!(got, Some(0));
        assert_eq!(producer.available(), 1);
        assert_eq!(producer.push(99), Ok(()));
    }

    #[test]
    fn polls_in_order() {
        let mut conveyor = Conveyor::<u32, 8>::new();
        let (mut producer, mut consumer) = conveyor.split();

        producer.push(10).unwrap();
        producer.push(11).unwrap();
        producer.push(12).unwrap();

        let mut seen = Vec::new();
        let read = consumer.poll_up_to(2, |v| seen.push(*v));
        assert_eq!(read, 2);
        assert_eq!(consumer.pending(), 1);

        let read = consumer.poll_up_to(10, |v| seen.push(*v));
        assert_eq!(read, 1);
        assert_eq!(&seen[..], &[10, 11, 12]);
        assert_eq!(producer.available(), 7);
    }

    #[test]
    fn handles_outlive_the_call_that_lent_them() {
        let mut conveyor = Conveyor::<[u8; 4], 4>::new();
        let (mut producer, mut consumer) = conveyor.split();

        let mut a = producer.fetch().unwrap();
        let mut b = producer.fetch().unwrap();
        a.copy_from_slice(b"abcd");
        b.copy_from_slice(b"efgh");
        producer.enqueue(b);
        producer.enqueue(a);

        let first = consumer.dequeue().unwrap();
        let second = consumer.dequeue().unwrap();
        assert_eq!(&*first, b"efgh");
        assert_eq!(&*second, b"abcd");
        consumer.recycle(second);
        consumer.recycle(first);
        assert_eq!(producer.available(), 3);
    }

    #[test]
    #[should_panic(expected = "another conveyor")]
    fn consumer_rejects_slot_from_other_conveyor() {
        let mut left = Conveyor::<u32, 4>::new();
        let mut right = Conveyor::<u32, 4>::new();
        let (mut left_tx, mut left_rx) = left.split();
        let (mut right_tx, mut right_rx) = right.split();

        left_tx.push(1).unwrap();
        right_tx.push(2).unwrap();
        let _own = right_rx.dequeue().unwrap();
        let foreign = left_rx.dequeue().unwrap();
        right_rx.recycle(foreign);
    }

    #[test]
    fn views_release_the_conveyor_when_dropped() {
        let mut conveyor = Conveyor::<u8, 4>::new();
        {
            let (mut producer, _consumer) = conveyor.split();
            producer.push(7).unwrap();
        }
        let h = conveyor.dequeue().unwrap();
        assert_eq!(*h, 7);
        conveyor.recycle(h);
    }

    #[test]
    fn producer_and_consumer_on_separate_threads() {
        const COUNT: u32 = 10_000;
        let mut conveyor = Conveyor::<u32, 16>::new();
        let (mut producer, mut consumer) = conveyor.split();

        let received = thread::scope(|s| {
            s.spawn(move || {
                for i in 0..COUNT {
                    while producer.push(i).is_err() {
                        std::hint::spin_loop();
                    }
                }
            });

            let reader = s.spawn(move || {
                let mut received = Vec::with_capacity(COUNT as usize);
                while received.len() < COUNT as usize {
                    if consumer.poll_up_to(8, |v| received.push(*v)) == 0 {
                        std::hint::spin_loop();
                    }
                }
                received
            });

            reader.join().unwrap()
        });

        assert!(received.iter().copied().eq(0..COUNT));
        assert_eq!(conveyor.regions().free, 15);
    }
}
