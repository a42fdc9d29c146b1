use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;

/// Sequence number of a car, starting at 1. Displayed as `Car-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CarId(pub usize);

impl Display for CarId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Car-{}", self.0)
    }
}

/// An arriving car. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Car {
    id: CarId,
    arrival: u64,
}

impl Car {
    pub fn new(id: usize, arrival: u64) -> Self {
        Self {
            id: CarId(id),
            arrival,
        }
    }

    pub fn id(&self) -> CarId {
        self.id
    }

    /// Milliseconds since the run started when the car arrived.
    pub fn arrival(&self) -> u64 {
        self.arrival
    }
}

impl Display for Car {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.id)
    }
}
