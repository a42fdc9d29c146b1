use std::collections::VecDeque;

use crate::error::{Result, StationError};

use super::car::{Car, CarId};

/// FIFO waiting area with a fixed capacity.
///
/// The queue itself never blocks; blocking is done by the station's slot
/// semaphores. Pushing past capacity or popping from an empty queue means
/// the semaphore handshake was broken and is reported as
/// [`StationError::InvariantViolation`].
#[derive(Debug)]
pub struct CarQueue {
    cars: VecDeque<Car>,
    capacity: usize,
}

impl CarQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            cars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, car: Car) -> Result<usize> {
        if self.cars.len() >= self.capacity {
            return Err(StationError::InvariantViolation(format!(
                "{car} would exceed waiting capacity {}",
                self.capacity
            )));
        }
        self.cars.push_back(car);
        Ok(self.cars.len())
    }

    pub fn pop(&mut self) -> Result<Car> {
        self.cars.pop_front().ok_or_else(|| {
            StationError::InvariantViolation("took a car from an empty queue".into())
        })
    }

    pub fn len(&self) -> usize {
        self.cars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Waiting car ids, head first.
    pub fn snapshot(&self) -> Vec<CarId> {
        self.cars.iter().map(Car::id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_arrival_order() {
        let mut q = CarQueue::new(3);
        for n in 1..=3 {
            q.push(Car::new(n, 0)).unwrap();
        }
        assert_eq!(q.snapshot(), vec![CarId(1), CarId(2), CarId(3)]);
        assert_eq!(q.pop().unwrap().id(), CarId(1));
        assert_eq!(q.pop().unwrap().id(), CarId(2));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn overflow_and_underflow_are_violations() {
        let mut q = CarQueue::new(1);
        assert_eq!(q.push(Car::new(1, 0)), Ok(1));
        assert!(matches!(
            q.push(Car::new(2, 0)),
            Err(StationError::InvariantViolation(_))
        ));
        q.pop().unwrap();
        assert!(q.is_empty());
        assert!(matches!(q.pop(), Err(StationError::InvariantViolation(_))));
    }
}
