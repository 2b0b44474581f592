//! Pipeline run aggregate and status snapshots.

use super::{
    PipelineConfig, PipelineDomainError, PipelineId, ProjectId, RunId, RunStatus, WorkspaceId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata key recording why a submission was rejected.
pub const SUBMISSION_ERROR_KEY: &str = "submission_error";

/// Status of one task inside a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Task name.
    pub name: String,
    /// Task state.
    pub status: RunStatus,
    /// Start time, once known.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time, once known.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Process exit code reported by the engine.
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Engine diagnostic message.
    #[serde(default)]
    pub message: Option<String>,
}

impl TaskStatus {
    /// Creates a pending task status.
    #[must_use]
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: RunStatus::Pending,
            started_at: None,
            finished_at: None,
            exit_code: None,
            message: None,
        }
    }
}

/// Status of one stage of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStatus {
    /// Stage name.
    pub name: String,
    /// Stage state.
    pub status: RunStatus,
    /// Start time, once known.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time, once known.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Task states in declaration order.
    #[serde(default)]
    pub tasks: Vec<TaskStatus>,
}

impl StageStatus {
    /// Creates a pending stage status with no tasks.
    #[must_use]
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: RunStatus::Pending,
            started_at: None,
            finished_at: None,
            tasks: Vec::new(),
        }
    }
}

/// Handle returned by a provider when it accepts a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    /// Platform run identifier echoed by the provider.
    pub run_id: RunId,
    /// Backend-specific run name.
    pub provider_run_name: String,
    /// Time the engine accepted the run.
    pub started_at: DateTime<Utc>,
}

/// Live view of a run as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    /// Platform run identifier read from the execution object's labels.
    pub run_id: RunId,
    /// Backend-specific run name.
    pub provider_run_name: String,
    /// Mapped run state.
    pub status: RunStatus,
    /// Start time reported by the engine.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time reported by the engine.
    pub finished_at: Option<DateTime<Utc>>,
    /// Stage states.
    pub stages: Vec<StageStatus>,
}

/// Result of folding a provider snapshot into a local run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The run moved to a strictly later state.
    Advanced {
        /// Previous state.
        from: RunStatus,
        /// New state.
        to: RunStatus,
    },
    /// The reported state matches the local state.
    Unchanged,
    /// The provider reported an earlier state than the local record.
    Stale {
        /// Local state.
        local: RunStatus,
        /// Reported state.
        reported: RunStatus,
    },
    /// The local record is terminal and the provider disagrees.
    TerminalConflict {
        /// Local terminal state.
        local: RunStatus,
        /// Reported state.
        reported: RunStatus,
    },
}

impl ReconcileOutcome {
    /// Returns `true` when the local record changed and must be written.
    #[must_use]
    pub const fn is_changed(self) -> bool {
        matches!(self, Self::Advanced { .. })
    }
}

/// One execution attempt of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    id: RunId,
    pipeline_id: PipelineId,
    provider_run_name: Option<String>,
    workspace_id: WorkspaceId,
    project_id: ProjectId,
    name: String,
    status: RunStatus,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    stages: Vec<StageStatus>,
    metadata: BTreeMap<String, Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted run.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRunData {
    /// Run identifier.
    pub id: RunId,
    /// Parent pipeline.
    pub pipeline_id: PipelineId,
    /// Backend-specific run name, once assigned.
    pub provider_run_name: Option<String>,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Pipeline name at submission time.
    pub name: String,
    /// Run state.
    pub status: RunStatus,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// Completion timestamp.
    pub finished_at: Option<DateTime<Utc>>,
    /// Stage snapshot.
    pub stages: Vec<StageStatus>,
    /// Free-form metadata.
    pub metadata: BTreeMap<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl PipelineRun {
    /// Creates a pending run recording the intent to execute `config`.
    #[must_use]
    pub fn new(
        id: RunId,
        pipeline_id: PipelineId,
        config: &PipelineConfig,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id,
            pipeline_id,
            provider_run_name: None,
            workspace_id: config.workspace_id.clone(),
            project_id: config.project_id.clone(),
            name: config.name.clone(),
            status: RunStatus::Pending,
            started_at: timestamp,
            finished_at: None,
            stages: config
                .stages
                .iter()
                .map(|stage| StageStatus {
                    tasks: stage
                        .tasks
                        .iter()
                        .map(|task| TaskStatus::pending(&task.name))
                        .collect(),
                    ..StageStatus::pending(&stage.name)
                })
                .collect(),
            metadata: config.metadata.clone(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a run from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedRunData) -> Self {
        Self {
            id: data.id,
            pipeline_id: data.pipeline_id,
            provider_run_name: data.provider_run_name,
            workspace_id: data.workspace_id,
            project_id: data.project_id,
            name: data.name,
            status: data.status,
            started_at: data.started_at,
            finished_at: data.finished_at,
            stages: data.stages,
            metadata: data.metadata,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the run identifier.
    #[must_use]
    pub const fn id(&self) -> RunId {
        self.id
    }

    /// Returns the parent pipeline identifier.
    #[must_use]
    pub const fn pipeline_id(&self) -> PipelineId {
        self.pipeline_id
    }

    /// Returns the backend run name, once assigned.
    #[must_use]
    pub fn provider_run_name(&self) -> Option<&str> {
        self.provider_run_name.as_deref()
    }

    /// Returns the owning workspace.
    #[must_use]
    pub const fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// Returns the pipeline name at submission time.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the run state.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Returns the start timestamp.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the completion timestamp for terminal runs.
    #[must_use]
    pub const fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Returns the stage snapshot.
    #[must_use]
    pub fn stages(&self) -> &[StageStatus] {
        &self.stages
    }

    /// Returns the run metadata.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Records the backend handle returned on submission.
    pub fn attach_handle(&mut self, handle: &RunHandle, clock: &impl Clock) {
        self.provider_run_name = Some(handle.provider_run_name.clone());
        self.started_at = handle.started_at;
        self.touch(clock);
    }

    /// Moves the run to a strictly later state.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineDomainError::InvalidStatusTransition`] when the
    /// current state is terminal or `next` is not later than it.
    pub fn transition_to(
        &mut self,
        next: RunStatus,
        clock: &impl Clock,
    ) -> Result<(), PipelineDomainError> {
        if !self.status.can_transition_to(next) {
            return Err(PipelineDomainError::InvalidStatusTransition {
                run_id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(clock.utc());
        }
        self.touch(clock);
        Ok(())
    }

    /// Marks a run whose submission was rejected by the provider.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineDomainError::InvalidStatusTransition`] when the run
    /// is already terminal.
    pub fn mark_submission_failed(
        &mut self,
        reason: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), PipelineDomainError> {
        self.transition_to(RunStatus::Failed, clock)?;
        self.metadata
            .insert(SUBMISSION_ERROR_KEY.to_owned(), Value::String(reason.into()));
        Ok(())
    }

    /// Folds a provider snapshot into this record.
    ///
    /// Only strictly later states are applied. A terminal record never
    /// changes; disagreement is reported so the caller can log it.
    pub fn reconcile(&mut self, snapshot: &RunSnapshot, clock: &impl Clock) -> ReconcileOutcome {
        let local = self.status;
        let reported = snapshot.status;
        if local.is_terminal() {
            if local == reported {
                return ReconcileOutcome::Unchanged;
            }
            return ReconcileOutcome::TerminalConflict { local, reported };
        }
        if local == reported {
            return ReconcileOutcome::Unchanged;
        }
        if !local.can_transition_to(reported) {
            return ReconcileOutcome::Stale { local, reported };
        }

        self.status = reported;
        self.stages.clone_from(&snapshot.stages);
        if self.provider_run_name.is_none() {
            self.provider_run_name = Some(snapshot.provider_run_name.clone());
        }
        if let Some(started_at) = snapshot.started_at {
            self.started_at = started_at;
        }
        if reported.is_terminal() {
            self.finished_at = snapshot.finished_at.or_else(|| Some(clock.utc()));
        }
        self.touch(clock);
        ReconcileOutcome::Advanced {
            from: local,
            to: reported,
        }
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
