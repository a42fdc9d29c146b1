use serde::Serialize;

use crate::error::{Result, StationError};

/// Upper bounds the host applies to user input. The core itself only
/// requires every count to be at least one.
pub const MAX_SLOTS: usize = 20;
pub const MAX_PUMPS: usize = 10;
pub const MAX_CARS: usize = 100;

/// Fixed parameters of one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StationConfig {
    pub waiting_capacity: usize,
    pub bay_count: usize,
    /// Number of consumer tasks. Equal to `bay_count` unless overridden.
    pub pump_count: usize,
    pub total_cars: usize,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            waiting_capacity: 5,
            bay_count: 3,
            pump_count: 3,
            total_cars: 12,
        }
    }
}

impl StationConfig {
    pub fn new(waiting_capacity: usize, bay_count: usize, total_cars: usize) -> Result<Self> {
        Self {
            waiting_capacity,
            bay_count,
            pump_count: bay_count,
            total_cars,
        }
        .validated()
    }

    /// Runs more pumps (or fewer) than there are bays.
    pub fn with_pumps(mut self, pump_count: usize) -> Result<Self> {
        self.pump_count = pump_count;
        self.validated()
    }

    pub fn validated(self) -> Result<Self> {
        let fields = [
            ("waiting_capacity", self.waiting_capacity),
            ("bay_count", self.bay_count),
            ("pump_count", self.pump_count),
            ("total_cars", self.total_cars),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(StationError::InvalidConfiguration(format!(
                    "{name} must be at least 1"
                )));
            }
        }
        Ok(self)
    }

    /// The sanity limits enforced by the host before a run is created.
    pub fn check_limits(&self) -> Result<()> {
        if self.waiting_capacity > MAX_SLOTS
            || self.pump_count > MAX_PUMPS
            || self.bay_count > MAX_PUMPS
            || self.total_cars > MAX_CARS
        {
            return Err(StationError::InvalidConfiguration(format!(
                "maximum limits: slots={MAX_SLOTS}, pumps={MAX_PUMPS}, cars={MAX_CARS}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pumps_follow_bays_by_default() {
        let config = StationConfig::new(2, 4, 10).unwrap();
        assert_eq!(config.pump_count, 4);
        assert_eq!(config.with_pumps(6).unwrap().pump_count, 6);
    }

    #[test]
    fn zero_counts_are_rejected() {
        for (slots, bays, cars) in [(0, 1, 1), (1, 0, 1), (1, 1, 0)] {
            assert!(matches!(
                StationConfig::new(slots, bays, cars),
                Err(StationError::InvalidConfiguration(_))
            ));
        }
        let config = StationConfig::new(1, 1, 1).unwrap();
        assert!(config.with_pumps(0).is_err());
    }

    #[test]
    fn limits_are_separate_from_validation() {
        let config = StationConfig::new(21, 1, 1).unwrap();
        assert!(config.check_limits().is_err());
        assert!(StationConfig::default().check_limits().is_ok());
    }
}
