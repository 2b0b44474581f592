//! Run status state machine.

use super::ParseRunStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a pipeline run, stage, or task.
///
/// States are partially ordered: `Pending` precedes `Running`, which
/// precedes the three terminal states. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Submitted but not yet acknowledged by the engine.
    Pending,
    /// Accepted and executing.
    Running,
    /// Completed successfully.
    Succeeded,
    /// Completed with a failure.
    Failed,
    /// Stopped on request.
    Cancelled,
}

impl RunStatus {
    /// All states, in rank order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Running,
        Self::Succeeded,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Position in the partial order. Terminal states share the top rank.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Succeeded | Self::Failed | Self::Cancelled => 2,
        }
    }

    /// Returns `true` for absorbing states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.rank() == 2
    }

    /// Returns `true` when the run may move from `self` to `next`.
    ///
    /// Only strictly later states are reachable and nothing leaves a
    /// terminal state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// States from which a run may move to `self`.
    #[must_use]
    pub fn predecessors(self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|candidate| candidate.can_transition_to(self))
            .collect()
    }
}

impl TryFrom<&str> for RunStatus {
    type Error = ParseRunStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseRunStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
