//! # The service station.
//!
//! [`Station`] is the single owner of all shared run state: the waiting
//! queue and the served count (both behind one [`ExclusiveLock`]), the two
//! slot semaphores that implement the bounded-buffer handshake, the
//! [`BayPool`], and the running flag. Producer and pump tasks only go
//! through the protocol methods below.
//!
//! ```text
//! enter_queue:  empty_slots.acquire -> lock -> push -> unlock -> full_slots.release
//! take_car:     full_slots.acquire  -> lock -> pop  -> unlock -> empty_slots.release
//! start_service / finish_service: bay permit held by a BayLease
//! ```
//!
//! Because every semaphore operation decrements before the matching
//! increment, `empty_slots + full_slots <= capacity` holds at every instant,
//! with equality whenever no task is between the two halves of a handshake.
//!
//! When the served count reaches the target, or [`Station::stop`] is called,
//! the running flag flips exactly once and all three semaphores are closed.
//! Every blocked producer and pump then wakes with
//! [`StationError::Cancelled`] instead of waiting forever for a car that
//! will never arrive. Services already holding a bay run to completion.

mod bays;
mod car;
mod queue;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use log::{debug, error, info};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::config::StationConfig;
use crate::error::{Result, StationError};
use crate::events::{StationObserver, Stats};
use crate::sync::{ExclusiveLock, Semaphore};

pub use bays::{BayLease, BayPool};
pub use car::{Car, CarId};
pub use queue::CarQueue;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { served: usize },
    Stopped { served: usize },
    Failed(StationError),
}

/// State guarded by the station lock.
struct Yard {
    queue: CarQueue,
    served: usize,
}

/// Consistent view of the station, read while holding the station lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationSnapshot {
    pub queue: Vec<CarId>,
    pub capacity: usize,
    pub empty_slots: usize,
    pub full_slots: usize,
    pub bays: Vec<Option<CarId>>,
    pub served: usize,
    pub total: usize,
    pub running: bool,
    pub blocked_arrivals: usize,
}

pub struct Station {
    config: StationConfig,
    yard: ExclusiveLock<Yard>,
    empty_slots: Semaphore,
    full_slots: Semaphore,
    bays: BayPool,
    running: AtomicBool,
    blocked_arrivals: AtomicUsize,
    outcome: Mutex<Option<Outcome>>,
    finished: Condvar,
    observer: Arc<dyn StationObserver>,
    started: Instant,
}

impl Station {
    pub fn new(config: StationConfig, observer: Arc<dyn StationObserver>) -> Result<Self> {
        let config = config.validated()?;
        let station = Self {
            config,
            yard: ExclusiveLock::new(Yard {
                queue: CarQueue::new(config.waiting_capacity),
                served: 0,
            }),
            empty_slots: Semaphore::new(config.waiting_capacity),
            full_slots: Semaphore::new(0),
            bays: BayPool::new(config.bay_count),
            running: AtomicBool::new(true),
            blocked_arrivals: AtomicUsize::new(0),
            outcome: Mutex::new(None),
            finished: Condvar::new(),
            observer,
            started: Instant::now(),
        };
        info!(
            "station created: slots={} bays={} pumps={} cars={}",
            config.waiting_capacity, config.bay_count, config.pump_count, config.total_cars
        );
        station.log(format!(
            "Station initialized with {} waiting slots and {} pumps",
            config.waiting_capacity, config.pump_count
        ));
        Ok(station)
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    /// Creates the next arriving car, stamped with the time since start.
    pub fn new_car(&self, number: usize) -> Car {
        Car::new(number, self.elapsed_ms())
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Producer side of the handshake. Blocks while the waiting area is full.
    pub fn enter_queue(&self, car: Car) -> Result<()> {
        debug!("{car} arrives, checking queue space");
        if !self.empty_slots.try_acquire()? {
            self.blocked_arrivals.fetch_add(1, Ordering::Relaxed);
            self.log(format!("{car} waits for a free slot"));
            self.empty_slots.acquire()?;
        }

        let id = car.id();
        {
            let mut yard = self.yard.acquire();
            if !self.is_running() {
                drop(yard);
                self.empty_slots.release();
                return Err(StationError::Cancelled);
            }
            let waiting = yard.queue.push(car)?;
            self.publish_queue(&yard);
            self.log(format!("{id} enters the queue ({waiting} waiting)"));
        }

        self.full_slots.release();
        Ok(())
    }

    /// Consumer side of the handshake. Blocks while the waiting area is empty.
    pub fn take_car(&self) -> Result<Car> {
        self.full_slots.acquire()?;

        let car = {
            let mut yard = self.yard.acquire();
            // The run may have ended after the permit was granted. The car
            // stays queued and the permit goes back.
            if !self.is_running() {
                drop(yard);
                self.full_slots.release();
                return Err(StationError::Cancelled);
            }
            let car = yard.queue.pop()?;
            self.publish_queue(&yard);
            car
        };

        self.empty_slots.release();
        debug!(
            "{car} leaves the queue after waiting {} ms",
            self.elapsed_ms().saturating_sub(car.arrival())
        );
        Ok(car)
    }

    /// Waits for a free bay for `car`, which has already left the queue.
    pub fn start_service(&self, pump: usize, car: &Car) -> Result<BayLease<'_>> {
        let lease = self.bays.start_service(car.id())?;
        self.observer
            .on_bay_status_changed(lease.bay(), Some(car.id()));
        self.log(format!("Pump-{pump} starts servicing {car}"));
        Ok(lease)
    }

    /// Frees the bay held by `lease` and counts the car as served.
    pub fn finish_service(&self, pump: usize, lease: BayLease<'_>) {
        let (bay, car) = (lease.bay(), lease.car());
        // Report the bay as free while it is still ours, so a pump that grabs
        // it next cannot have its update overwritten by this one.
        self.observer.on_bay_status_changed(bay, None);
        lease.finish();
        self.log(format!("Pump-{pump} finished servicing {car}"));
        self.record_served();
    }

    fn record_served(&self) {
        let reached = {
            let mut yard = self.yard.acquire();
            yard.served += 1;
            self.observer.on_stats_changed(Self::stats_of(&yard, &self.config));
            yard.served >= self.config.total_cars
        };
        if reached {
            self.finish(Outcome::Completed {
                served: self.served(),
            });
        }
    }

    /// Cancels the run. Waiting tasks wake with [`StationError::Cancelled`]
    /// and nothing enters or leaves the queue afterwards; services in
    /// progress complete. Has no effect once the run has ended.
    pub fn stop(&self) {
        self.finish(Outcome::Stopped {
            served: self.served(),
        });
    }

    /// Ends the run after a broken invariant was observed.
    pub fn abort(&self, err: StationError) {
        error!("station aborted: {err}");
        self.log(format!("Simulation aborted: {err}"));
        self.finish(Outcome::Failed(err));
    }

    fn finish(&self, outcome: Outcome) {
        // Flipped under the station lock: once it is released, no queue
        // change can be published for this run.
        let was_running = {
            let _yard = self.yard.acquire();
            self.running.swap(false, Ordering::AcqRel)
        };
        if !was_running {
            return;
        }
        self.full_slots.close();
        self.empty_slots.close();
        self.bays.close();

        match &outcome {
            Outcome::Completed { served } => {
                info!("run complete after {served} cars");
                self.log(format!(
                    "Simulation complete! All {} cars serviced",
                    self.config.total_cars
                ));
                self.observer.on_complete(*served);
            }
            Outcome::Stopped { served } => {
                info!("run stopped after {served} cars");
                self.log("Simulation stopped manually".to_owned());
                self.observer.on_stopped(*served);
            }
            Outcome::Failed(_) => self.observer.on_stopped(self.served()),
        }

        *self.outcome.lock() = Some(outcome);
        self.finished.notify_all();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome.lock().clone()
    }

    /// Blocks until the run ends or `timeout` elapses.
    pub fn wait_outcome(&self, timeout: Duration) -> Option<Outcome> {
        let deadline = Instant::now().checked_add(timeout);
        let mut outcome = self.outcome.lock();
        while outcome.is_none() {
            match deadline {
                Some(deadline) => {
                    if self.finished.wait_until(&mut outcome, deadline).timed_out() {
                        break;
                    }
                }
                None => self.finished.wait(&mut outcome),
            }
        }
        outcome.clone()
    }

    pub fn served(&self) -> usize {
        self.yard.acquire().served
    }

    pub fn waiting(&self) -> usize {
        self.yard.acquire().queue.len()
    }

    pub fn blocked_arrivals(&self) -> usize {
        self.blocked_arrivals.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StationSnapshot {
        let yard = self.yard.acquire();
        StationSnapshot {
            queue: yard.queue.snapshot(),
            capacity: yard.queue.capacity(),
            empty_slots: self.empty_slots.available(),
            full_slots: self.full_slots.available(),
            bays: self.bays.occupants(),
            served: yard.served,
            total: self.config.total_cars,
            running: self.is_running(),
            blocked_arrivals: self.blocked_arrivals(),
        }
    }

    pub fn log(&self, message: String) {
        self.observer.on_log_event(&message, Local::now());
    }

    fn publish_queue(&self, yard: &Yard) {
        self.observer
            .on_queue_changed(&yard.queue.snapshot(), yard.queue.capacity());
        self.observer.on_stats_changed(Self::stats_of(yard, &self.config));
    }

    fn stats_of(yard: &Yard, config: &StationConfig) -> Stats {
        Stats {
            served: yard.served,
            waiting: yard.queue.len(),
            total: config.total_cars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Recorder, StationEvent};
    use std::thread;

    fn station(slots: usize, bays: usize, cars: usize) -> (Arc<Station>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::new());
        let config = StationConfig::new(slots, bays, cars).unwrap();
        let station = Station::new(config, recorder.clone()).unwrap();
        (Arc::new(station), recorder)
    }

    #[test]
    fn rejects_invalid_configuration_before_starting() {
        let config = StationConfig {
            waiting_capacity: 0,
            ..StationConfig::default()
        };
        let result = Station::new(config, Arc::new(Recorder::new()));
        assert!(matches!(result, Err(StationError::InvalidConfiguration(_))));
    }

    #[test]
    fn queue_is_fifo_and_slots_balance() {
        let (station, recorder) = station(3, 1, 3);
        for n in 1..=3 {
            station.enter_queue(station.new_car(n)).unwrap();
        }
        let snap = station.snapshot();
        assert_eq!(snap.queue, vec![CarId(1), CarId(2), CarId(3)]);
        assert_eq!((snap.empty_slots, snap.full_slots), (0, 3));

        assert_eq!(station.take_car().unwrap().id(), CarId(1));
        let snap = station.snapshot();
        assert_eq!(snap.empty_slots + snap.full_slots, snap.capacity);
        assert_eq!(snap.queue.len(), snap.full_slots);

        assert!(recorder
            .log_lines()
            .contains(&"Car-3 enters the queue (3 waiting)".to_owned()));
    }

    #[test]
    fn full_queue_applies_backpressure() {
        let (station, recorder) = station(1, 1, 2);
        station.enter_queue(station.new_car(1)).unwrap();

        let producer = {
            let station = Arc::clone(&station);
            thread::spawn(move || station.enter_queue(station.new_car(2)))
        };
        thread::sleep(Duration::from_millis(30));
        assert_eq!(station.waiting(), 1);
        assert_eq!(station.blocked_arrivals(), 1);

        station.take_car().unwrap();
        producer.join().unwrap().unwrap();
        assert_eq!(station.snapshot().queue, vec![CarId(2)]);
        assert!(recorder
            .log_lines()
            .contains(&"Car-2 waits for a free slot".to_owned()));
    }

    #[test]
    fn reaching_target_completes_once() {
        let (station, recorder) = station(2, 1, 2);
        for n in 1..=2 {
            station.enter_queue(station.new_car(n)).unwrap();
        }
        for _ in 0..2 {
            let car = station.take_car().unwrap();
            let lease = station.start_service(1, &car).unwrap();
            station.finish_service(1, lease);
        }
        assert!(!station.is_running());
        assert_eq!(
            station.wait_outcome(Duration::ZERO),
            Some(Outcome::Completed { served: 2 })
        );
        station.stop();
        assert_eq!(recorder.count(StationEvent::is_terminal), 1);
        assert_eq!(station.outcome(), Some(Outcome::Completed { served: 2 }));
    }

    #[test]
    fn stop_wakes_blocked_pumps() {
        let (station, recorder) = station(2, 2, 5);
        let pumps: Vec<_> = (0..2)
            .map(|_| {
                let station = Arc::clone(&station);
                thread::spawn(move || station.take_car().map(|car| car.id()))
            })
            .collect();
        thread::sleep(Duration::from_millis(30));
        station.stop();
        for pump in pumps {
            assert_eq!(pump.join().unwrap(), Err(StationError::Cancelled));
        }
        assert!(!station.is_running());
        assert!(matches!(
            recorder.events().last(),
            Some(StationEvent::Stopped { served: 0 })
        ));
        assert_eq!(
            station.enter_queue(station.new_car(9)),
            Err(StationError::Cancelled)
        );
    }

    #[test]
    fn abort_fails_the_run_and_wakes_pumps() {
        let (station, recorder) = station(2, 1, 4);
        let pump = {
            let station = Arc::clone(&station);
            thread::spawn(move || station.take_car().map(|car| car.id()))
        };
        thread::sleep(Duration::from_millis(30));

        let err = StationError::InvariantViolation("queue underflow".into());
        station.abort(err.clone());
        station.abort(StationError::InvariantViolation("again".into()));
        station.stop();

        assert_eq!(pump.join().unwrap(), Err(StationError::Cancelled));
        assert!(!station.is_running());
        assert_eq!(station.outcome(), Some(Outcome::Failed(err)));
        assert_eq!(recorder.count(StationEvent::is_terminal), 1);
        assert_eq!(
            recorder.count(|e| matches!(e, StationEvent::Stopped { served: 0 })),
            1
        );
        assert!(recorder
            .log_lines()
            .contains(&"Simulation aborted: invariant violation: queue underflow".to_owned()));
    }

    #[test]
    fn queued_cars_stay_put_after_stop() {
        let (station, recorder) = station(2, 1, 4);
        station.enter_queue(station.new_car(1)).unwrap();
        station.stop();
        let before = recorder.events().len();

        assert_eq!(station.take_car(), Err(StationError::Cancelled));
        assert_eq!(
            station.enter_queue(station.new_car(2)),
            Err(StationError::Cancelled)
        );
        let snap = station.snapshot();
        assert_eq!(snap.queue, vec![CarId(1)]);
        assert_eq!(snap.empty_slots + snap.full_slots, snap.capacity);
        assert_eq!(recorder.events().len(), before);
    }

    #[test]
    fn unbounded_wait_returns_a_settled_outcome() {
        let (station, _) = station(1, 1, 1);
        station.stop();
        assert_eq!(
            station.wait_outcome(Duration::MAX),
            Some(Outcome::Stopped { served: 0 })
        );
    }

    #[test]
    fn service_in_progress_finishes_after_stop() {
        let (station, _) = station(1, 1, 3);
        station.enter_queue(station.new_car(1)).unwrap();
        let car = station.take_car().unwrap();
        let lease = station.start_service(1, &car).unwrap();
        station.stop();
        station.finish_service(1, lease);
        assert_eq!(station.served(), 1);
        assert_eq!(station.outcome(), Some(Outcome::Stopped { served: 0 }));
        assert_eq!(station.snapshot().bays, vec![None]);
    }

    #[test]
    fn bay_events_report_occupancy() {
        let (station, recorder) = station(1, 1, 1);
        station.enter_queue(station.new_car(1)).unwrap();
        let car = station.take_car().unwrap();
        let lease = station.start_service(2, &car).unwrap();
        station.finish_service(2, lease);

        let bays: Vec<_> = recorder
            .events()
            .into_iter()
            .filter_map(|e| match e {
                StationEvent::BayStatusChanged { bay, occupant } => Some((bay, occupant)),
                _ => None,
            })
            .collect();
        assert_eq!(bays, vec![(0, Some(CarId(1))), (0, None)]);
        let lines = recorder.log_lines();
        assert!(lines.contains(&"Pump-2 starts servicing Car-1".to_owned()));
        assert!(lines.contains(&"Pump-2 finished servicing Car-1".to_owned()));
        assert!(lines.contains(&"Simulation complete! All 1 cars serviced".to_owned()));
    }
}
