//! Instance lifecycle state machine.
//!
//! Tracks where a single lifecycle operation is while it runs. There is no
//! updating phase: a configuration change is resolved by the host as a
//! delete followed by a create.
//!
//! # State Machine
//!
//! ```text
//!     ┌──────────┐  create   ┌──────────┐  status fetch  ┌─────────────┐
//!     │  Absent  │──────────▶│ Creating │───────────────▶│ ReadingFull │
//!     └──────────┘           └──────────┘                └──────┬──────┘
//!          ▲  ▲                                                 │
//!          │  │ removed                                         ▼
//!          │  │              ┌──────────┐     refreshed   ┌──────────┐
//!          │  └──────────────│ Reading  │◀───────────────▶│ Present  │
//!          │                 └──────────┘                 └────┬─────┘
//!          │                 ┌──────────┐                      │
//!          └─────────────────│ Deleting │◀─────────────────────┘
//!                            └──────────┘
//! ```
//!
//! Import enters `Reading` from `Absent`.

use crate::error::{ResourceError, Result};

/// Phase of an instance within a lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No remote instance is recorded.
    Absent,
    /// The create call is in flight.
    Creating,
    /// The status fetch following a create is in flight.
    ReadingFull,
    /// The instance exists and its state is recorded.
    Present,
    /// A status fetch for a recorded instance is in flight.
    Reading,
    /// The delete call is in flight.
    Deleting,
}

/// Validates a phase transition and returns the target phase if valid.
///
/// # Errors
///
/// Returns `ResourceError::InvalidTransition` if the transition is not
/// allowed.
pub fn validate_transition(from: Phase, to: Phase) -> Result<Phase> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(ResourceError::InvalidTransition { from, to })
    }
}

/// Check if a phase transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: Phase, to: Phase) -> bool {
    use Phase::{Absent, Creating, Deleting, Present, Reading, ReadingFull};

    matches!(
        (from, to),
        // Create is two calls; either may fail back to Absent
        (Absent, Creating)
            | (Creating, ReadingFull | Absent)
            | (ReadingFull, Present | Absent)
            // Import reads from nothing
            | (Absent, Reading)
            | (Present, Reading | Deleting)
            | (Reading, Present | Absent)
            // A failed delete leaves the instance in place
            | (Deleting, Absent | Present)
    )
}

/// Tracks the phase of one operation and logs each step.
#[derive(Debug)]
pub(crate) struct Tracker {
    phase: Phase,
}

impl Tracker {
    pub(crate) const fn new(phase: Phase) -> Self {
        Self { phase }
    }

    pub(crate) fn advance(&mut self, to: Phase) -> Result<()> {
        self.phase = validate_transition(self.phase, to)?;
        tracing::trace!(phase = ?to, "Lifecycle phase");
        Ok(())
    }

    pub(crate) const fn phase(&self) -> Phase {
        self.phase
    }
}
