//! # Blocking synchronization primitives.
//!
//! The station coordinates its tasks with two primitives, both built on a
//! `parking_lot` mutex and condition variable:
//!
//! - [`Semaphore`]: a counting semaphore. [`Semaphore::acquire`] blocks while
//!   no permit is available; [`Semaphore::release`] adds a permit and wakes one
//!   waiter. [`Semaphore::close`] wakes *all* waiters with
//!   [`StationError::Cancelled`](crate::StationError::Cancelled), which is how
//!   a finished or stopped run unblocks every producer and pump.
//! - [`ExclusiveLock`]: the binary case, owning the value it protects. The
//!   lock is released only by dropping the [`LockGuard`] handed out by
//!   [`ExclusiveLock::acquire`].
//!
//! Neither primitive wakes waiters in FIFO order.

mod lock;
mod semaphore;

pub use lock::{ExclusiveLock, LockGuard};
pub use semaphore::{Permit, Semaphore};
