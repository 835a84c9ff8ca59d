//! Crawl session lifecycle
//!
//! ```text
//! Idle → Running ─┬→ SuspendedPartial ─┬→ Draining → Completed
//!                 ├→ Draining          └→ Completed
//!                 └→ Completed
//! ```
//!
//! Any non-terminal state after `Idle` may end in `Aborted` when the batch
//! store fails persistently.

use std::fmt;

/// Represents the current state of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, no worker started yet
    Idle,

    /// Workers are pulling frontier entries
    Running,

    /// A stop signal or the session timeout was hit; workers finish and flush
    ///
    /// Page ceilings do not drain: the frontier stops handing out work and
    /// the session completes once in-flight fetches return.
    Draining,

    /// At least one domain was suspended by the rate limiter; others continue
    SuspendedPartial,

    /// All workers exited and the pending buffer is flushed
    Completed,

    /// The store kept failing; some crawled pages were not persisted
    Aborted,
}

impl SessionState {
    /// Returns true if the transition `self → next` is part of the lifecycle
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, Draining)
                | (Running, SuspendedPartial)
                | (Running, Completed)
                | (SuspendedPartial, Draining)
                | (SuspendedPartial, Completed)
                | (Draining, Completed)
                | (Running | SuspendedPartial | Draining, Aborted)
        )
    }

    /// Returns true while workers may still pull frontier entries
    pub fn is_accepting_work(&self) -> bool {
        matches!(self, Self::Running | Self::SuspendedPartial)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Converts the state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::SuspendedPartial => "suspended_partial",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    /// Parses a state from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "running" => Some(Self::Running),
            "draining" => Some(Self::Draining),
            "suspended_partial" => Some(Self::SuspendedPartial),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
