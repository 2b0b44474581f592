//! Provider contract implemented once per backend execution engine.

use super::LogStream;
use crate::pipeline::domain::{
    ErrorKind, LogEntry, PipelineConfig, PipelineTemplate, ProjectId, ProviderSettings,
    ProviderType, RunHandle, RunId, RunSnapshot, TemplateId, WorkspaceId,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Template expansion request handled by a provider or the orchestration
/// service.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRequest {
    /// Template to expand.
    pub template_id: TemplateId,
    /// Workspace the resulting config belongs to.
    pub workspace_id: WorkspaceId,
    /// Project the resulting config belongs to.
    pub project_id: ProjectId,
    /// Caller-supplied parameter values.
    pub params: BTreeMap<String, Value>,
}

impl TemplateRequest {
    /// Creates a request with no parameters.
    #[must_use]
    pub const fn new(template_id: TemplateId, workspace_id: WorkspaceId, project_id: ProjectId) -> Self {
        Self {
            template_id,
            workspace_id,
            project_id,
            params: BTreeMap::new(),
        }
    }

    /// Adds a parameter value.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// Backend engine adapter.
///
/// Adapters are stateless with respect to the platform's durable model: they
/// translate configs into engine objects labelled with the platform run id
/// and translate engine status back into [`crate::pipeline::domain::RunStatus`].
#[async_trait]
pub trait PipelineProvider: Send + Sync {
    /// Submits a new execution labelled with `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Validation`] when the config lacks a name,
    /// source URL, or service account, and
    /// [`ProviderError::BackendUnavailable`] when the engine cannot accept
    /// work.
    async fn run_pipeline(&self, run_id: RunId, config: &PipelineConfig)
    -> ProviderResult<RunHandle>;

    /// Reads live status of the execution labelled with `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RunNotFound`] when no execution carries the
    /// label.
    async fn get_status(
        &self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
    ) -> ProviderResult<RunSnapshot>;

    /// Cancels an execution. Cancelling a terminal execution is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RunNotFound`] when no execution carries the
    /// label.
    async fn cancel_pipeline(&self, workspace_id: &WorkspaceId, run_id: RunId)
    -> ProviderResult<()>;

    /// Removes the execution object and its log sources.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RunNotFound`] when no execution carries the
    /// label.
    async fn delete_pipeline(&self, workspace_id: &WorkspaceId, run_id: RunId)
    -> ProviderResult<()>;

    /// Lists executions of a project, newest first.
    async fn list_pipelines(
        &self,
        workspace_id: &WorkspaceId,
        project_id: &ProjectId,
        limit: usize,
    ) -> ProviderResult<Vec<RunSnapshot>>;

    /// Reads the complete output of one stage.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RunNotFound`] or
    /// [`ProviderError::StageNotFound`] when the run or its stage pod is
    /// missing.
    async fn get_logs(
        &self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
        stage: &str,
    ) -> ProviderResult<Vec<LogEntry>>;

    /// Opens a live stream of one stage's output.
    ///
    /// Dropping the returned stream releases the engine connection.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RunNotFound`] or
    /// [`ProviderError::StageNotFound`] when the run or its stage pod is
    /// missing.
    async fn stream_logs(
        &self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
        stage: &str,
    ) -> ProviderResult<LogStream>;

    /// Checks a config without submitting it.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Validation`] describing the first problem.
    async fn validate_config(&self, config: &PipelineConfig) -> ProviderResult<()>;

    /// Returns the templates this provider ships.
    async fn get_templates(&self) -> ProviderResult<Vec<PipelineTemplate>>;

    /// Expands one of this provider's templates.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::TemplateNotFound`] for unknown templates and
    /// [`ProviderError::Validation`] for bad parameters.
    async fn create_from_template(&self, request: &TemplateRequest)
    -> ProviderResult<PipelineConfig>;

    /// Returns the provider type this adapter implements.
    fn name(&self) -> ProviderType;

    /// Returns the adapter or engine version.
    fn version(&self) -> String;

    /// Reports whether the engine is reachable.
    async fn is_healthy(&self) -> bool;
}

/// Maps provider types to adapter constructors.
pub trait ProviderFactory: Send + Sync {
    /// Instantiates the adapter for `provider_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotImplemented`] for recognised types without
    /// an adapter.
    fn create_provider(
        &self,
        provider_type: ProviderType,
        settings: &ProviderSettings,
    ) -> ProviderResult<Arc<dyn PipelineProvider>>;

    /// Instantiates the adapter named by a raw type identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnsupportedProvider`] for unknown identifiers
    /// and the errors of [`ProviderFactory::create_provider`] otherwise.
    fn create_provider_by_name(
        &self,
        provider_type: &str,
        settings: &ProviderSettings,
    ) -> ProviderResult<Arc<dyn PipelineProvider>> {
        let parsed = ProviderType::try_from(provider_type)
            .map_err(|err| ProviderError::UnsupportedProvider(err.0))?;
        self.create_provider(parsed, settings)
    }

    /// Lists every recognised provider type, implemented or not.
    fn list_providers(&self) -> Vec<ProviderType> {
        ProviderType::ALL.to_vec()
    }
}

/// Errors returned by provider adapters and factories.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The submitted configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    Validation(String),

    /// No execution carries the run label.
    #[error("pipeline run {0} not found in execution backend")]
    RunNotFound(RunId),

    /// The stage has no execution pod.
    #[error("no log source for stage '{stage}' of run {run_id}")]
    StageNotFound {
        /// Run identifier.
        run_id: RunId,
        /// Stage name.
        stage: String,
    },

    /// The provider does not ship the template.
    #[error("template {0} not found")]
    TemplateNotFound(TemplateId),

    /// The provider type is unknown.
    #[error("unsupported provider type: {0}")]
    UnsupportedProvider(String),

    /// The provider type has no adapter.
    #[error("provider {0} is not implemented")]
    NotImplemented(ProviderType),

    /// The engine could not be reached or rejected the request.
    #[error("execution backend unavailable: {0}")]
    BackendUnavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Wraps an engine connectivity failure.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::BackendUnavailable(Arc::new(err))
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::RunNotFound(_) | Self::StageNotFound { .. } | Self::TemplateNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::UnsupportedProvider(_) => ErrorKind::UnsupportedProvider,
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
        }
    }
}
