//! Per-path watch state machine.
//!
//! # State Transitions
//! ```text
//! Watching → Reloading: change event dispatched
//! Reloading → Watching: reload callback returned
//! Watching → Failed: OS watch could not be set up or reported an error
//! ```
//!
//! Failed is terminal until the path is registered again.

/// Watch state of one registered path.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Watching = 0,
    Reloading = 1,
    Failed = 2,
}

impl From<u8> for WatchState {
    fn from(val: u8) -> Self {
        match val {
            0 => WatchState::Watching,
            1 => WatchState::Reloading,
            _ => WatchState::Failed,
        }
    }
}

impl WatchState {
    /// Whether change events for the path are still delivered.
    pub fn is_live(&self) -> bool {
        !matches!(self, WatchState::Failed)
    }
}
