use parking_lot::Mutex;

use crate::error::{Result, StationError};
use crate::sync::{Permit, Semaphore};

use super::car::CarId;

/// Service bays: a counting semaphore sized to the bay count, plus a table
/// recording which car sits in which bay.
///
/// The semaphore alone decides admission; the table is only consulted after a
/// permit is held, so a free slot always exists when it is searched.
pub struct BayPool {
    permits: Semaphore,
    occupants: Mutex<Vec<Option<CarId>>>,
}

/// A held bay. Dropping the lease frees the bay, then returns the permit.
pub struct BayLease<'a> {
    pool: &'a BayPool,
    bay: usize,
    car: CarId,
    _permit: Permit<'a>,
}

impl BayPool {
    pub fn new(bays: usize) -> Self {
        Self {
            permits: Semaphore::new(bays),
            occupants: Mutex::new(vec![None; bays]),
        }
    }

    /// Blocks until a bay is free and assigns it to `car`.
    pub fn start_service(&self, car: CarId) -> Result<BayLease<'_>> {
        let permit = self.permits.acquire_permit()?;
        let mut occupants = self.occupants.lock();
        let Some(bay) = occupants.iter().position(Option::is_none) else {
            return Err(StationError::InvariantViolation(format!(
                "bay permit granted to {car} but every bay is occupied"
            )));
        };
        occupants[bay] = Some(car);
        Ok(BayLease {
            pool: self,
            bay,
            car,
            _permit: permit,
        })
    }

    pub fn occupants(&self) -> Vec<Option<CarId>> {
        self.occupants.lock().clone()
    }

    pub(crate) fn close(&self) {
        self.permits.close();
    }
}

impl BayLease<'_> {
    pub fn bay(&self) -> usize {
        self.bay
    }

    pub fn car(&self) -> CarId {
        self.car
    }

    /// Frees the bay now instead of at end of scope.
    pub fn finish(self) {}
}

impl Drop for BayLease<'_> {
    fn drop(&mut self) {
        self.pool.occupants.lock()[self.bay] = None;
    }
}
