//! Notifications the station emits for whoever renders a run.
//!
//! The station calls a [`StationObserver`] from the task that caused the
//! change, so implementations must be cheap and must not call back into the
//! station. Hosts usually forward everything into a channel with
//! [`ChannelObserver`] and render from their own loop.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::station::CarId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Stats {
    pub served: usize,
    pub waiting: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StationEvent {
    QueueChanged {
        snapshot: Vec<CarId>,
        capacity: usize,
    },
    BayStatusChanged {
        bay: usize,
        occupant: Option<CarId>,
    },
    StatsChanged {
        served: usize,
        waiting: usize,
        total: usize,
    },
    Log {
        message: String,
        at: DateTime<Local>,
    },
    Completed {
        served: usize,
    },
    Stopped {
        served: usize,
    },
}

impl StationEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Stopped { .. })
    }
}

/// Receives station notifications. Every method defaults to doing nothing.
pub trait StationObserver: Send + Sync {
    fn on_queue_changed(&self, _snapshot: &[CarId], _capacity: usize) {}
    fn on_bay_status_changed(&self, _bay: usize, _occupant: Option<CarId>) {}
    fn on_stats_changed(&self, _stats: Stats) {}
    fn on_log_event(&self, _message: &str, _at: DateTime<Local>) {}
    /// Sent once, when the served count reaches the run's target.
    fn on_complete(&self, _served: usize) {}
    /// Sent once, when the run is cancelled before reaching its target.
    fn on_stopped(&self, _served: usize) {}
}

/// Anything that can take owned [`StationEvent`]s is an observer.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: StationEvent);
}

impl<S: EventSink> StationObserver for S {
    fn on_queue_changed(&self, snapshot: &[CarId], capacity: usize) {
        self.emit(StationEvent::QueueChanged {
            snapshot: snapshot.to_vec(),
            capacity,
        });
    }

    fn on_bay_status_changed(&self, bay: usize, occupant: Option<CarId>) {
        self.emit(StationEvent::BayStatusChanged { bay, occupant });
    }

    fn on_stats_changed(&self, stats: Stats) {
        self.emit(StationEvent::StatsChanged {
            served: stats.served,
            waiting: stats.waiting,
            total: stats.total,
        });
    }

    fn on_log_event(&self, message: &str, at: DateTime<Local>) {
        self.emit(StationEvent::Log {
            message: message.to_owned(),
            at,
        });
    }

    fn on_complete(&self, served: usize) {
        self.emit(StationEvent::Completed { served });
    }

    fn on_stopped(&self, served: usize) {
        self.emit(StationEvent::Stopped { served });
    }
}

pub struct NoopObserver;

impl EventSink for NoopObserver {
    fn emit(&self, _event: StationEvent) {}
}

/// Forwards events into the host's message queue. Sends after the receiver
/// is gone are dropped.
pub struct ChannelObserver<M> {
    tx: UnboundedSender<M>,
    wrap: Box<dyn Fn(StationEvent) -> M + Send + Sync>,
}

impl ChannelObserver<StationEvent> {
    pub fn new(tx: UnboundedSender<StationEvent>) -> Self {
        Self::mapped(tx, |e| e)
    }
}

impl<M> ChannelObserver<M> {
    /// Wraps every event into the host's own message type, e.g. tagged with
    /// the run it came from.
    pub fn mapped<F>(tx: UnboundedSender<M>, wrap: F) -> Self
    where
        F: Fn(StationEvent) -> M + Send + Sync + 'static,
    {
        Self {
            tx,
            wrap: Box::new(wrap),
        }
    }
}

impl<M: Send> EventSink for ChannelObserver<M> {
    fn emit(&self, event: StationEvent) {
        let _ = self.tx.send((self.wrap)(event));
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<StationEvent>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StationEvent> {
        self.events.lock().clone()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                StationEvent::Log { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&StationEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for Recorder {
    fn emit(&self, event: StationEvent) {
        self.events.lock().push(event);
    }
}
