//! Slot ids and the handles that lend a slot to one role at a time.
//!
//! A [`Handle`] is the only way to reach a slot's value. The producer side
//! gets a [`FillHandle`] from `fetch` and gives it back to `enqueue`; the
//! consumer side gets a [`DrainHandle`] from `dequeue` and gives it back to
//! `recycle`. Both transfers take the handle by value, and each one accepts
//! only its own kind:
//!
//! ```compile_fail
//! use conveyor::Conveyor;
//!
//! let conveyor = Conveyor::<u8, 4>::new();
//! let fetched = conveyor.fetch().unwrap();
//! conveyor.recycle(fetched);
//! ```
//!
//! ```compile_fail
//! use conveyor::Conveyor;
//!
//! let conveyor = Conveyor::<u8, 4>::new();
//! let mut fetched = conveyor.fetch().unwrap();
//! conveyor.enqueue(fetched);
//! *fetched = 1;
//! ```

use core::fmt;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ops::{Deref, DerefMut};

#[cfg(not(loom))]
pub(crate) use core::cell::UnsafeCell;
#[cfg(loom)]
pub(crate) use loom::cell::UnsafeCell;

/// Storage cell of one slot. Initialized for every slot that circulates.
pub(crate) type SlotCell<T> = UnsafeCell<MaybeUninit<T>>;

/// Index of one storage cell in a conveyor's slot arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotId(pub(crate) u8);

impl SlotId {
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Role marker: slot lent to the producer for filling.
#[derive(Debug)]
pub enum Fill {}

/// Role marker: slot lent to the consumer for draining.
#[derive(Debug)]
pub enum Drain {}

/// Slot fetched by the producer, accepted only by `enqueue`.
pub type FillHandle<'c, T> = Handle<'c, T, Fill>;

/// Slot dequeued by the consumer, accepted only by `recycle`.
pub type DrainHandle<'c, T> = Handle<'c, T, Drain>;

/// Exclusive lease on one slot of a [`Conveyor`](crate::Conveyor).
///
/// Dropping a handle instead of returning it takes its slot out of
/// circulation for good; the conveyor keeps working with one slot fewer.
#[must_use = "a dropped handle leaks its slot; pass it to enqueue or recycle"]
pub struct Handle<'c, T, R> {
    id: SlotId,
    cell: &'c SlotCell<T>,
    #[cfg(loom)]
    access: loom::cell::MutPtr<MaybeUninit<T>>,
    _role: PhantomData<fn() -> R>,
}

// A handle behaves like `&mut T`: the four-cursor protocol never lends the same
// slot twice, so the handle is the only path to the cell while it exists.
unsafe impl<T: Send, R> Send for Handle<'_, T, R> {}
unsafe impl<T: Sync, R> Sync for Handle<'_, T, R> {}

impl<'c, T, R> Handle<'c, T, R> {
    /// The cell must hold an initialized value and must not be reachable
    /// through any other live handle.
    #[inline(always)]
    pub(crate) unsafe fn new(id: SlotId, cell: &'c SlotCell<T>) -> Self {
        Self {
            id,
            cell,
            #[cfg(loom)]
            access: cell.get_mut(),
            _role: PhantomData,
        }
    }

    /// The arena slot this handle lends.
    #[inline]
    pub fn slot(&self) -> SlotId {
        self.id
    }

    #[inline(always)]
    pub(crate) fn cell(&self) -> &'c SlotCell<T> {
        self.cell
    }

    /// Overwrite the slot's value, returning the previous one.
    #[inline]
    pub fn replace(&mut self, value: T) -> T {
        core::mem::replace(&mut **self, value)
    }

    #[cfg(not(loom))]
    #[inline(always)]
    fn slot_ptr(&self) -> *mut MaybeUninit<T> {
        self.cell.get()
    }

    #[cfg(loom)]
    #[inline(always)]
    fn slot_ptr(&self) -> *mut MaybeUninit<T> {
        self.access.with(|ptr| ptr)
    }
}

impl<T, R> Deref for Handle<'_, T, R> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        unsafe { (*self.slot_ptr()).assume_init_ref() }
    }
}

impl<T, R> DerefMut for Handle<'_, T, R> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { (*self.slot_ptr()).assume_init_mut() }
    }
}

impl<T: fmt::Debug, R> fmt::Debug for Handle<'_, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("slot", &self.id)
            .field("value", &**self)
            .finish()
    }
}
