//! Runs a [`Station`] on OS threads: one long-lived thread per pump, one
//! arrival thread that spawns a short-lived thread per car at paced
//! intervals. Threads are detached and tracked through a [`BusyLot`], so a
//! host can stop a run and wait (with a grace period) for tasks to drain
//! without holding join handles.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::busy_lot::BusyLot;
use crate::config::StationConfig;
use crate::error::Result;
use crate::events::StationObserver;
use crate::pacing::Pacing;
use crate::station::{Outcome, Station};
use crate::tasks;

pub struct Simulation {
    station: Arc<Station>,
    lot: BusyLot,
}

impl Simulation {
    /// Validates `config`, then starts the pumps and the car arrivals.
    pub fn start(
        config: StationConfig,
        pacing: Arc<dyn Pacing>,
        observer: Arc<dyn StationObserver>,
    ) -> Result<Self> {
        let station = Arc::new(Station::new(config, observer)?);
        let sim = Self {
            station,
            lot: BusyLot::new(),
        };
        info!(
            "simulation started: {} cars, {} pumps, {} slots",
            config.total_cars, config.pump_count, config.waiting_capacity
        );
        sim.station.log(format!(
            "Simulation started: {} cars, {} pumps, {} slots",
            config.total_cars, config.pump_count, config.waiting_capacity
        ));
        if let Err(err) = sim.spawn_tasks(pacing) {
            sim.station.abort(err.clone());
            return Err(err);
        }
        Ok(sim)
    }

    fn spawn_tasks(&self, pacing: Arc<dyn Pacing>) -> Result<()> {
        let config = *self.station.config();

        for pump in 1..=config.pump_count {
            let station = Arc::clone(&self.station);
            let pacing = Arc::clone(&pacing);
            let ticket = self.lot.park();
            thread::Builder::new()
                .name(format!("pump-{pump}"))
                .spawn(move || {
                    let _ticket = ticket;
                    tasks::run_pump(&station, pump, pacing.as_ref());
                })?;
        }

        let station = Arc::clone(&self.station);
        let lot = self.lot.clone();
        let ticket = self.lot.park();
        thread::Builder::new()
            .name("arrivals".to_owned())
            .spawn(move || {
                let _ticket = ticket;
                spawn_arrivals(&station, &lot, pacing.as_ref(), config.total_cars);
            })?;
        Ok(())
    }

    pub fn station(&self) -> &Arc<Station> {
        &self.station
    }

    pub fn stop(&self) {
        self.station.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.station.outcome().is_some() && !self.lot.is_busy()
    }

    /// Number of task threads still alive.
    pub fn live_tasks(&self) -> usize {
        self.lot.parked()
    }

    /// Waits up to `timeout` for the run to end, then up to `timeout` again
    /// for its tasks to exit. Returns the outcome if the run ended.
    pub fn wait(&self, timeout: Duration) -> Option<Outcome> {
        let outcome = self.station.wait_outcome(timeout)?;
        self.lot.wait_idle(timeout);
        Some(outcome)
    }

    /// Stops the run and gives tasks `grace` to exit. Returns `true` if every
    /// task finished in time; threads still inside a service delay are left
    /// detached otherwise.
    pub fn shutdown(&self, grace: Duration) -> bool {
        self.stop();
        let drained = self.lot.wait_idle(grace);
        if !drained {
            debug!("{} task(s) still running after grace period", self.lot.parked());
        }
        drained
    }
}

fn spawn_arrivals(station: &Arc<Station>, lot: &BusyLot, pacing: &dyn Pacing, total: usize) {
    for n in 1..=total {
        if !station.is_running() {
            break;
        }
        let car = station.new_car(n);
        let car_station = Arc::clone(station);
        let ticket = lot.park();
        let spawned = thread::Builder::new()
            .name(format!("car-{n}"))
            .spawn(move || {
                let _ticket = ticket;
                tasks::run_car(&car_station, car);
            });
        if let Err(err) = spawned {
            station.abort(err.into());
            break;
        }
        // Doubles as the arrival gap and an early exit once the run ends.
        if station.wait_outcome(pacing.arrival_gap()).is_some() {
            break;
        }
    }
    debug!("arrivals done");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopObserver;
    use crate::pacing::FixedPacing;

    #[test]
    fn runs_to_completion_and_drains_tasks() {
        let config = StationConfig::new(2, 2, 6).unwrap();
        let sim = Simulation::start(
            config,
            Arc::new(FixedPacing::new(Duration::ZERO, Duration::from_millis(1))),
            Arc::new(NoopObserver),
        )
        .unwrap();
        assert_eq!(
            sim.wait(Duration::from_secs(10)),
            Some(Outcome::Completed { served: 6 })
        );
        assert!(sim.is_finished());
        assert_eq!(sim.live_tasks(), 0);
    }

    #[test]
    fn shutdown_stops_a_slow_run() {
        let config = StationConfig::new(2, 1, 50).unwrap();
        let sim = Simulation::start(
            config,
            Arc::new(FixedPacing::new(
                Duration::from_millis(5),
                Duration::from_millis(20),
            )),
            Arc::new(NoopObserver),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(30));
        assert!(sim.shutdown(Duration::from_secs(5)));
        assert!(matches!(
            sim.station().outcome(),
            Some(Outcome::Stopped { .. })
        ));
        assert!(!sim.station().is_running());
    }
}
