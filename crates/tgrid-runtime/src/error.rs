#![forbid(unsafe_code)]

//! Scheduling errors shared by the dispatcher, debouncer and sequencer.

use std::fmt;
use std::io;

/// Why a unit of work could not be scheduled.
#[derive(Debug)]
pub enum ScheduleError {
    /// `try_submit` found the dispatcher queue at capacity.
    QueueFull,
    /// The dispatcher was closed before the task was admitted.
    DispatcherClosed,
    /// The debouncer was shut down.
    DebouncerClosed,
    /// A timer or worker thread could not be spawned.
    Spawn(io::Error),
}

impl ScheduleError {
    /// Whether retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::QueueFull)
    }
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "dispatcher queue is full"),
            Self::DispatcherClosed => write!(f, "dispatcher is closed"),
            Self::DebouncerClosed => write!(f, "debouncer is shut down"),
            Self::Spawn(e) => write!(f, "failed to spawn thread: {e}"),
        }
    }
}

impl std::error::Error for ScheduleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ScheduleError {
    fn from(e: io::Error) -> Self {
        Self::Spawn(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_messages() {
        assert_eq!(ScheduleError::QueueFull.to_string(), "dispatcher queue is full");
        assert_eq!(ScheduleError::DispatcherClosed.to_string(), "dispatcher is closed");
        assert_eq!(ScheduleError::DebouncerClosed.to_string(), "debouncer is shut down");
    }

    #[test]
    fn spawn_error_chains_source() {
        let err = ScheduleError::from(io::Error::other("no threads"));
        assert!(err.to_string().contains("no threads"));
        assert!(err.source().is_some());
        assert!(!err.is_transient());
        assert!(ScheduleError::QueueFull.is_transient());
    }
}
