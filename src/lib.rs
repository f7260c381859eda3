//! Fixed-capacity transport buffer between a main loop and an interrupt handler.
//!
//! # Highlights
//! - `N - 1` slots of `T` circulate between one producer and one consumer.
//! - No allocation, no locks, no CAS, no waiting: every operation is one cursor step.
//! - Slots are lent out as [`Handle`]s and handed back by value, so a
//!   transferred handle cannot be touched again. Producer-side and
//!   consumer-side handles are distinct types and cannot be mixed up.
//!
//! # Quick start
//! ```
//! use conveyor::Conveyor;
//!
//! let conveyor = Conveyor::<char, 8>::new();
//! assert_eq!(conveyor.capacity(), 7);
//!
//! let mut slot = conveyor.fetch().unwrap();
//! *slot = '+';
//! conveyor.enqueue(slot);
//!
//! let slot = conveyor.dequeue().unwrap();
//! assert_eq!(*slot, '+');
//! conveyor.recycle(slot);
//! assert!(conveyor.dequeue().is_none());
//! ```
//!
//! # Two contexts
//! ```
//! use conveyor::Conveyor;
//!
//! let mut conveyor = Conveyor::<u32, 16>::new();
//! let (mut producer, mut consumer) = conveyor.split();
//!
//! std::thread::scope(|s| {
//!     s.spawn(move || {
//!         while producer.push(42).is_err() {}
//!     });
//!     while !consumer.poll_one(|v| assert_eq!(*v, 42)) {}
//! });
//! ```
//!
//! On a microcontroller the conveyor usually lives in a `static` handed out once
//! as `&'static mut` (for example through a `StaticCell`), split at startup, and
//! the interrupt handler's half parked where the handler can reach it.
//!
//! # Safety and concurrency
//! Exactly one producer and one consumer may be active. The flat operations on
//! [`Conveyor`] need `&self` on a value that is not `Sync`, which confines them
//! to one context. [`Conveyor::split`] borrows the conveyor exclusively and
//! yields one [`Producer`] and one [`Consumer`]; they are `Send` and can sit in
//! different contexts. Contexts may preempt each other at any point.
//!
//! # Semantics
//! - `fetch`/`dequeue` return `None` when their region is empty; callers poll.
//! - Items are dequeued in enqueue order.
//! - `enqueue`/`recycle` panic on a handle lent by another conveyor; the
//!   `_unchecked` variants skip that pointer comparison and make it the
//!   caller's contract.
//!
//! # Features
//! - `portable-atomic`: use `portable_atomic` atomics for targets without native
//!   8-bit atomics (plus the `-unsafe-assume-single-core` and
//!   `-critical-section` backends).
//! - `defmt`: derive `defmt::Format` for [`SlotId`] and [`Regions`].
#![no_std]

pub mod conveyor;
pub mod handle;
pub mod role;

pub use conveyor::{Conveyor, Regions};
pub use handle::{Drain, DrainHandle, Fill, FillHandle, Handle, SlotId};
pub use role::{Consumer, Producer};

#[cfg(test)]
extern crate std;
