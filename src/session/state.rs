//! Stream lifecycle state machine
//!
//! ```text
//!   Starting ──first capture──► Running
//!      │                          │
//!      └──stop / fatal error──────┴──► Stopping ──tasks exited, purged──► Stopped
//! ```
//!
//! Transitions only move forward. The state is shared between the registry
//! and the stream's background tasks, so it lives in an atomic.

use std::sync::atomic::{AtomicU8, Ordering};

/// Stream lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum StreamState {
    /// Tasks spawned, no data captured yet
    Starting = 0,
    /// Capture loop has succeeded at least once
    Running = 1,
    /// Stop requested or a fatal error occurred; tasks are winding down
    Stopping = 2,
    /// Tasks exited and buffered segments purged
    Stopped = 3,
}

impl StreamState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => StreamState::Starting,
            1 => StreamState::Running,
            2 => StreamState::Stopping,
            _ => StreamState::Stopped,
        }
    }

    /// Whether the stream is still relaying (or about to)
    pub fn is_live(self) -> bool {
        matches!(self, StreamState::Starting | StreamState::Running)
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StreamState::Starting => "starting",
            StreamState::Running => "running",
            StreamState::Stopping => "stopping",
            StreamState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Atomically updated [`StreamState`]
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Create a cell in the `Starting` state
    pub fn new() -> Self {
        Self(AtomicU8::new(StreamState::Starting as u8))
    }

    /// Current state
    pub fn get(&self) -> StreamState {
        StreamState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `Starting -> Running`. Returns true if this call made the transition.
    pub fn mark_running(&self) -> bool {
        self.0
            .compare_exchange(
                StreamState::Starting as u8,
                StreamState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `Stopping` unless already stopping or stopped
    ///
    /// Returns true if this call made the transition.
    pub fn mark_stopping(&self) -> bool {
        self.advance_to(StreamState::Stopping)
    }

    /// Move to the terminal `Stopped` state
    pub fn mark_stopped(&self) {
        self.advance_to(StreamState::Stopped);
    }

    fn advance_to(&self, target: StreamState) -> bool {
        let target = target as u8;
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < target).then_some(target)
            })
            .is_ok()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
