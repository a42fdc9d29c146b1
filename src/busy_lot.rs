use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Shared count of live simulation tasks (pumps, cars, the arrival spawner).
/// Cloning is cheap (Arc); dropping a ticket auto-decrements and wakes
/// anyone waiting for the lot to empty.
#[derive(Clone, Default)]
pub struct BusyLot {
    inner: Arc<LotState>,
}

#[derive(Default)]
struct LotState {
    parked: Mutex<usize>,
    emptied: Condvar,
}

/// RAII ticket returned from `BusyLot::park()`.
/// When the ticket is dropped (even on panic) the lot counter goes down.
pub struct Ticket {
    lot: BusyLot,
}

impl BusyLot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a parking space and returns a ticket.
    pub fn park(&self) -> Ticket {
        *self.inner.parked.lock() += 1;
        Ticket { lot: self.clone() }
    }

    /// `true` if at least one ticket is still parked.
    pub fn is_busy(&self) -> bool {
        self.parked() != 0
    }

    pub fn parked(&self) -> usize {
        *self.inner.parked.lock()
    }

    /// Waits until every ticket is dropped. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut parked = self.inner.parked.lock();
        while *parked != 0 {
            let Some(deadline) = deadline else {
                self.inner.emptied.wait(&mut parked);
                continue;
            };
            if self
                .inner
                .emptied
                .wait_until(&mut parked, deadline)
                .timed_out()
            {
                return *parked == 0;
            }
        }
        true
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let mut parked = self.lot.inner.parked.lock();
        *parked -= 1;
        if *parked == 0 {
            self.lot.inner.emptied.notify_all();
        }
    }
}
