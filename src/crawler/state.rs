/// Run state definitions
///
/// A run moves strictly forward through these states; anything else is a
/// programming error in the orchestrator and is rejected.
use std::fmt;
use thiserror::Error;

/// Represents the current state of one feed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Run created, nothing submitted yet
    Idle,

    /// Listing URLs are being submitted to the worker pool
    Dispatching,

    /// Waiting for listing tasks and their candidate tasks
    Awaiting,

    /// Every task finished and the results are collected
    Aggregated,

    // ===== Terminal States =====
    /// Records were produced and deduplicated
    Succeeded,

    /// At least one listing URL failed; no records are returned
    Failed,
}

/// A rejected state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid run transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: RunState,
    pub to: RunState,
}

impl RunState {
    /// Returns true once the run can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether `next` directly follows this state
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Dispatching)
                | (Self::Dispatching, Self::Awaiting)
                | (Self::Awaiting, Self::Aggregated)
                | (Self::Aggregated, Self::Succeeded)
                | (Self::Aggregated, Self::Failed)
        )
    }

    /// Moves to `next`, rejecting anything but the forward path
    pub fn advance(&mut self, next: RunState) -> Result<(), InvalidTransition> {
        if !self.can_transition_to(next) {
            return Err(InvalidTransition {
                from: *self,
                to: next,
            });
        }
        tracing::trace!("run state {} -> {}", self, next);
        *self = next;
        Ok(())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Dispatching => "dispatching",
            Self::Awaiting => "awaiting",
            Self::Aggregated => "aggregated",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
