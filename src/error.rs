use std::fmt::{Display, Formatter, Result as FmtResult};

/// The error type for station construction and the producer/consumer protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationError {
    /// A capacity, bay, pump or car count was rejected before the run started.
    InvalidConfiguration(String),
    /// A blocked acquire was abandoned because the run is shutting down.
    Cancelled,
    /// The queue or a primitive was observed in a state the protocol forbids.
    InvariantViolation(String),
    /// The OS refused to start a task thread.
    Spawn(String),
}

impl StationError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl Display for StationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Cancelled => write!(f, "operation cancelled, station is shutting down"),
            Self::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
            Self::Spawn(msg) => write!(f, "failed to spawn task: {msg}"),
        }
    }
}

impl std::error::Error for StationError {}

impl From<std::io::Error> for StationError {
    fn from(e: std::io::Error) -> Self {
        Self::Spawn(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failure() {
        let e = StationError::InvalidConfiguration("bay_count must be at least 1".into());
        assert_eq!(
            e.to_string(),
            "invalid configuration: bay_count must be at least 1"
        );
        assert!(StationError::Cancelled.is_cancelled());
        assert!(!e.is_cancelled());
    }
}
