use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use parking_lot::{Condvar, Mutex};

/// Blocking mutual-exclusion lock: a single permit guarding `T`.
///
/// The protected value is only reachable through the [`LockGuard`] returned
/// by [`ExclusiveLock::acquire`], and the lock is only released when that
/// guard drops, so no task can release a lock it does not hold. The lock is
/// not reentrant: acquiring it twice from the same thread deadlocks.
pub struct ExclusiveLock<T> {
    held: Mutex<bool>,
    condition: Condvar,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is serialized by `held`; only the single live
// guard may touch it.
unsafe impl<T: Send> Send for ExclusiveLock<T> {}
unsafe impl<T: Send> Sync for ExclusiveLock<T> {}

/// Access to the value behind an [`ExclusiveLock`]; releases it on drop.
///
/// Like `std::sync::MutexGuard`, the guard can only be shared between
/// threads when `T` itself is `Sync`:
///
/// ```compile_fail
/// use std::cell::Cell;
/// use service_station::sync::ExclusiveLock;
///
/// fn assert_sync<S: Sync>(_: &S) {}
///
/// let lock = ExclusiveLock::new(Cell::new(0u64));
/// assert_sync(&lock.acquire());
/// ```
pub struct LockGuard<'a, T> {
    lock: &'a ExclusiveLock<T>,
    _marker: PhantomData<&'a mut T>,
}

impl<T> ExclusiveLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            held: Mutex::new(false),
            condition: Condvar::new(),
            data: UnsafeCell::new(data),
        }
    }

    /// Blocks until the lock is free, then takes it.
    pub fn acquire(&self) -> LockGuard<'_, T> {
        let mut held = self.held.lock();
        while *held {
            self.condition.wait(&mut held);
        }
        *held = true;
        LockGuard {
            lock: self,
            _marker: PhantomData,
        }
    }

    pub fn is_held(&self) -> bool {
        *self.held.lock()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T> Deref for LockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: this guard is the unique holder of the lock.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for LockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: this guard is the unique holder of the lock.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for LockGuard<'_, T> {
    fn drop(&mut self) {
        let mut held = self.lock.held.lock();
        *held = false;
        self.lock.condition.notify_one();
    }
}
