//! Repository port for pipelines, runs, templates, and provider configs.

use crate::pipeline::domain::{
    ErrorKind, Pipeline, PipelineId, PipelineRun, PipelineTemplate, ProjectId, ProviderType,
    RunId, TemplateId, WorkspaceId, WorkspaceProviderConfig,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for pipeline repository operations.
pub type PipelineRepositoryResult<T> = Result<T, PipelineRepositoryError>;

/// Durable storage contract for the pipeline subsystem.
///
/// Implementations never swallow errors and report undecodable rows as
/// [`PipelineRepositoryError::CorruptState`].
#[async_trait]
pub trait PipelineRepository: Send + Sync {
    /// Stores a new pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineRepositoryError::DuplicatePipeline`] when a pipeline
    /// with the same workspace, project, and name exists.
    async fn create_pipeline(&self, pipeline: &Pipeline) -> PipelineRepositoryResult<()>;

    /// Persists changes to an existing pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineRepositoryError::PipelineNotFound`] when the
    /// pipeline does not exist.
    async fn update_pipeline(&self, pipeline: &Pipeline) -> PipelineRepositoryResult<()>;

    /// Finds a pipeline by identifier.
    async fn find_pipeline(&self, id: PipelineId) -> PipelineRepositoryResult<Option<Pipeline>>;

    /// Finds a pipeline by its tenant-scoped name.
    async fn find_pipeline_by_name(
        &self,
        workspace_id: &WorkspaceId,
        project_id: &ProjectId,
        name: &str,
    ) -> PipelineRepositoryResult<Option<Pipeline>>;

    /// Lists pipelines of a project, newest first.
    async fn list_pipelines(
        &self,
        workspace_id: &WorkspaceId,
        project_id: &ProjectId,
    ) -> PipelineRepositoryResult<Vec<Pipeline>>;

    /// Deletes a pipeline and all of its runs.
    ///
    /// Runs are removed before the pipeline within one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineRepositoryError::PipelineNotFound`] when the
    /// pipeline does not exist.
    async fn delete_pipeline(&self, id: PipelineId) -> PipelineRepositoryResult<()>;

    /// Stores a new run.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineRepositoryError::DuplicateRun`] or
    /// [`PipelineRepositoryError::DuplicateProviderRunName`] when either
    /// key is already taken.
    async fn create_pipeline_run(&self, run: &PipelineRun) -> PipelineRepositoryResult<()>;

    /// Writes a run if the stored state may legally move to the new one.
    ///
    /// A write happens when the stored status can transition to the new
    /// status, or when both are the same non-terminal status. Otherwise the
    /// stored record is left untouched. The stored record after the call is
    /// returned either way.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineRepositoryError::RunNotFound`] when the run does not
    /// exist.
    async fn update_pipeline_run(&self, run: &PipelineRun) -> PipelineRepositoryResult<PipelineRun>;

    /// Finds a run by platform identifier or, failing that, by backend run
    /// name.
    async fn get_pipeline_run(&self, key: &str) -> PipelineRepositoryResult<Option<PipelineRun>>;

    /// Lists runs of a project, newest first, up to `limit` entries.
    async fn list_pipeline_runs(
        &self,
        workspace_id: &WorkspaceId,
        project_id: &ProjectId,
        limit: usize,
    ) -> PipelineRepositoryResult<Vec<PipelineRun>>;

    /// Lists all runs of a pipeline, newest first.
    async fn list_runs_for_pipeline(
        &self,
        pipeline_id: PipelineId,
    ) -> PipelineRepositoryResult<Vec<PipelineRun>>;

    /// Deletes a single run.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineRepositoryError::RunNotFound`] when the run does not
    /// exist.
    async fn delete_pipeline_run(&self, id: RunId) -> PipelineRepositoryResult<()>;

    /// Stores a new template.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineRepositoryError::DuplicateTemplate`] when the
    /// identifier is taken.
    async fn create_template(&self, template: &PipelineTemplate) -> PipelineRepositoryResult<()>;

    /// Persists changes to an existing template.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineRepositoryError::TemplateNotFound`] when the template
    /// does not exist.
    async fn update_template(&self, template: &PipelineTemplate) -> PipelineRepositoryResult<()>;

    /// Finds a template by identifier.
    async fn get_template(
        &self,
        id: &TemplateId,
    ) -> PipelineRepositoryResult<Option<PipelineTemplate>>;

    /// Lists templates, optionally restricted to one provider.
    async fn list_templates(
        &self,
        provider: Option<ProviderType>,
    ) -> PipelineRepositoryResult<Vec<PipelineTemplate>>;

    /// Deletes a template.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineRepositoryError::TemplateNotFound`] when the template
    /// does not exist.
    async fn delete_template(&self, id: &TemplateId) -> PipelineRepositoryResult<()>;

    /// Returns the active provider configuration of a workspace.
    async fn get_provider_config(
        &self,
        workspace_id: &WorkspaceId,
    ) -> PipelineRepositoryResult<Option<WorkspaceProviderConfig>>;

    /// Makes `config` the single active configuration of its workspace.
    ///
    /// Deactivating the previous row and activating the new one happen in one
    /// transaction.
    async fn set_provider_config(
        &self,
        config: &WorkspaceProviderConfig,
    ) -> PipelineRepositoryResult<()>;
}

/// Errors returned by pipeline repository implementations.
#[derive(Debug, Clone, Error)]
pub enum PipelineRepositoryError {
    /// A pipeline with the same tenant-scoped name exists.
    #[error("duplicate pipeline '{name}' in workspace {workspace_id}")]
    DuplicatePipeline {
        /// Owning workspace.
        workspace_id: WorkspaceId,
        /// Pipeline name.
        name: String,
    },

    /// A run with the same identifier exists.
    #[error("duplicate pipeline run identifier: {0}")]
    DuplicateRun(RunId),

    /// A run with the same backend run name exists.
    #[error("duplicate provider run name: {0}")]
    DuplicateProviderRunName(String),

    /// A template with the same identifier exists.
    #[error("duplicate template identifier: {0}")]
    DuplicateTemplate(TemplateId),

    /// The pipeline was not found.
    #[error("pipeline not found: {0}")]
    PipelineNotFound(PipelineId),

    /// The run was not found.
    #[error("pipeline run not found: {0}")]
    RunNotFound(RunId),

    /// The template was not found.
    #[error("template not found: {0}")]
    TemplateNotFound(TemplateId),

    /// A stored row could not be decoded.
    #[error("corrupt {entity} record {id}: {reason}")]
    CorruptState {
        /// Entity kind, such as `pipeline_template`.
        entity: &'static str,
        /// Row key.
        id: String,
        /// Decoding failure.
        reason: String,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl PipelineRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Builds a corrupt-state error for an undecodable row.
    pub fn corrupt(entity: &'static str, id: impl ToString, reason: impl ToString) -> Self {
        Self::CorruptState {
            entity,
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicatePipeline { .. }
            | Self::DuplicateRun(_)
            | Self::DuplicateProviderRunName(_)
            | Self::DuplicateTemplate(_) => ErrorKind::Validation,
            Self::PipelineNotFound(_) | Self::RunNotFound(_) | Self::TemplateNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::CorruptState { .. } => ErrorKind::CorruptState,
            Self::Persistence(_) => ErrorKind::Internal,
        }
    }
}

impl From<diesel::result::Error> for PipelineRepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        Self::persistence(err)
    }
}
