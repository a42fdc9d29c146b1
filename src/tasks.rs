//! The two kinds of simulation task.
//!
//! A car task is short lived: it enters the queue once and ends. A pump task
//! loops `take_car -> start_service -> service -> finish_service` until the
//! station stops running. Cancellation is swallowed at the task boundary; any
//! other error aborts the whole run.

use std::thread;

use log::debug;

use crate::error::{Result, StationError};
use crate::pacing::Pacing;
use crate::station::{Car, Station};

pub fn run_car(station: &Station, car: Car) {
    let id = car.id();
    match station.enter_queue(car) {
        Ok(()) => {}
        Err(StationError::Cancelled) => {
            debug!("{id} turned away, station closed");
            station.log(format!("{id} turned away, station closed"));
        }
        Err(err) => station.abort(err),
    }
}

/// Consumer loop for pump `pump` (1-based).
pub fn run_pump(station: &Station, pump: usize, pacing: &dyn Pacing) {
    match serve(station, pump, pacing) {
        Ok(()) | Err(StationError::Cancelled) => debug!("Pump-{pump} exits"),
        Err(err) => station.abort(err),
    }
}

fn serve(station: &Station, pump: usize, pacing: &dyn Pacing) -> Result<()> {
    // The flag is read once per iteration; a stop that lands mid-iteration
    // is seen through the closed semaphores instead.
    while station.is_running() {
        let car = station.take_car()?;
        let lease = match station.start_service(pump, &car) {
            Ok(lease) => lease,
            Err(err) => {
                if err.is_cancelled() {
                    station.log(format!("{car} leaves without service"));
                }
                return Err(err);
            }
        };

        thread::sleep(pacing.service_time());
        station.finish_service(pump, lease);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;
    use crate::events::Recorder;
    use crate::pacing::FixedPacing;
    use crate::station::Outcome;
    use std::sync::Arc;

    #[test]
    fn single_pump_drains_queue_then_exits() {
        let recorder = Arc::new(Recorder::new());
        let config = StationConfig::new(3, 1, 3).unwrap();
        let station = Station::new(config, recorder.clone()).unwrap();
        for n in 1..=3 {
            run_car(&station, station.new_car(n));
        }

        run_pump(&station, 1, &FixedPacing::zero());

        assert_eq!(station.outcome(), Some(Outcome::Completed { served: 3 }));
        let starts: Vec<_> = recorder
            .log_lines()
            .into_iter()
            .filter(|l| l.contains("starts servicing"))
            .collect();
        assert_eq!(
            starts,
            vec![
                "Pump-1 starts servicing Car-1",
                "Pump-1 starts servicing Car-2",
                "Pump-1 starts servicing Car-3",
            ]
        );
    }

    #[test]
    fn car_arriving_after_stop_is_turned_away() {
        let recorder = Arc::new(Recorder::new());
        let config = StationConfig::new(1, 1, 2).unwrap();
        let station = Station::new(config, recorder.clone()).unwrap();
        station.stop();

        run_car(&station, station.new_car(1));
        run_pump(&station, 1, &FixedPacing::zero());

        assert_eq!(station.waiting(), 0);
        assert!(recorder
            .log_lines()
            .contains(&"Car-1 turned away, station closed".to_owned()));
        assert_eq!(station.outcome(), Some(Outcome::Stopped { served: 0 }));
    }
}
