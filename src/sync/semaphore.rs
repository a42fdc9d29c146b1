use parking_lot::{Condvar, Mutex};

use crate::error::{Result, StationError};

struct SemaphoreState {
    permits: usize,
    closed: bool,
}

/// Counting semaphore built on a mutex-protected permit count and a condvar.
///
/// `release` wakes a single waiter; which one is left to the condvar, so
/// blocked callers are not served in FIFO order. `close` wakes every waiter
/// and makes all current and future `acquire` calls fail with
/// [`StationError::Cancelled`].
pub struct Semaphore {
    state: Mutex<SemaphoreState>,
    condition: Condvar,
}

/// RAII permit returned by [`Semaphore::acquire_permit`].
/// Dropping it puts the permit back.
pub struct Permit<'a> {
    semaphore: &'a Semaphore,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(SemaphoreState {
                permits,
                closed: false,
            }),
            condition: Condvar::new(),
        }
    }

    /// Checked constructor for counts coming from untyped input.
    pub fn try_new(permits: i64) -> Result<Self> {
        let permits = usize::try_from(permits).map_err(|_| {
            StationError::InvalidConfiguration(format!("permits cannot be negative ({permits})"))
        })?;
        Ok(Self::new(permits))
    }

    /// Blocks until a permit is available, then consumes it.
    pub fn acquire(&self) -> Result<()> {
        let mut state = self.state.lock();
        while state.permits == 0 && !state.closed {
            self.condition.wait(&mut state);
        }
        if state.closed {
            return Err(StationError::Cancelled);
        }
        state.permits -= 1;
        Ok(())
    }

    pub fn acquire_permit(&self) -> Result<Permit<'_>> {
        self.acquire()?;
        Ok(Permit { semaphore: self })
    }

    /// Consumes a permit only if one is available right now.
    pub fn try_acquire(&self) -> Result<bool> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StationError::Cancelled);
        }
        if state.permits == 0 {
            return Ok(false);
        }
        state.permits -= 1;
        Ok(true)
    }

    pub fn release(&self) {
        let mut state = self.state.lock();
        state.permits += 1;
        self.condition.notify_one();
    }

    /// Wakes all waiters with a cancellation result. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.condition.notify_all();
    }

    pub fn available(&self) -> usize {
        self.state.lock().permits
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}
