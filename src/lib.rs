//! Service station simulation: cars queue in a bounded waiting area and a
//! fixed pool of pumps drains it, competing for a separate pool of service
//! bays.
//!
//! The core is the coordination layer in [`sync`] and [`station`]. Rendering
//! is left to the host, which subscribes through [`events::StationObserver`].

pub mod busy_lot;
pub mod config;
pub mod error;
pub mod events;
pub mod pacing;
pub mod simulation;
pub mod station;
pub mod sync;
pub mod tasks;

pub use config::StationConfig;
pub use error::{Result, StationError};
pub use events::{ChannelObserver, Recorder, StationEvent, StationObserver, Stats};
pub use pacing::{FixedPacing, Pacing, RandomPacing};
pub use simulation::Simulation;
pub use station::{Car, CarId, Outcome, Station, StationSnapshot};
