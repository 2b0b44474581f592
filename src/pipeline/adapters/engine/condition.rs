//! Native condition model of the Kubernetes-native engine and its mapping
//! onto [`RunStatus`].

use crate::pipeline::domain::RunStatus;
use serde::{Deserialize, Serialize};

/// Reasons the engine reports for runs stopped on request.
pub const CANCELLED_REASONS: [&str; 4] = [
    "PipelineRunCancelled",
    "Cancelled",
    "CancelledRunFinally",
    "StoppedRunFinally",
];

/// Tri-state `Succeeded` condition status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    /// The run finished successfully.
    True,
    /// The run finished unsuccessfully.
    False,
    /// The run is still in progress.
    Unknown,
}

/// `Succeeded` condition attached to an execution object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCondition {
    /// Condition status.
    pub status: ConditionStatus,
    /// Machine-readable reason.
    pub reason: String,
    /// Human-readable message.
    pub message: Option<String>,
}

impl EngineCondition {
    /// Condition of a run that is executing.
    #[must_use]
    pub fn running() -> Self {
        Self::new(ConditionStatus::Unknown, "Running")
    }

    /// Condition of a run that succeeded.
    #[must_use]
    pub fn succeeded() -> Self {
        Self::new(ConditionStatus::True, "Succeeded")
    }

    /// Condition of a run that failed.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(ConditionStatus::False, "Failed")
        }
    }

    /// Condition of a run stopped on request.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ConditionStatus::False, "PipelineRunCancelled")
    }

    /// Creates a condition with the given status and reason.
    #[must_use]
    pub fn new(status: ConditionStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            message: None,
        }
    }
}

/// Maps the engine's condition onto the platform state machine.
///
/// No condition means the engine has not picked the run up yet. `True` is
/// success. `False` is cancellation when the reason says so and failure
/// otherwise. Anything else is treated as still running.
#[must_use]
pub fn map_condition(condition: Option<&EngineCondition>) -> RunStatus {
    let Some(condition) = condition else {
        return RunStatus::Pending;
    };
    match condition.status {
        ConditionStatus::True => RunStatus::Succeeded,
        ConditionStatus::False if CANCELLED_REASONS.contains(&condition.reason.as_str()) => {
            RunStatus::Cancelled
        }
        ConditionStatus::False => RunStatus::Failed,
        ConditionStatus::Unknown => RunStatus::Running,
    }
}
