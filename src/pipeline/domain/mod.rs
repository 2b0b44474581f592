//! Domain model for pipeline orchestration.
//!
//! Pipelines, runs, templates, and workspace provider configuration are
//! plain values here; storage and engine access live behind the ports.

mod config;
mod error;
mod ids;
mod log;
mod pipeline;
mod provider;
mod run;
mod status;
mod template;

pub use config::{
    BuildConfig, BuildType, DeployConfig, GitSource, PipelineConfig, RegistryConfig,
    ResourceRequests, StagePlan, TaskPlan,
};
pub use error::{ErrorKind, ParseProviderTypeError, ParseRunStatusError, PipelineDomainError};
pub use ids::{PipelineId, ProjectId, ProviderConfigId, RunId, TemplateId, WorkspaceId};
pub use log::{LogEntry, LogLevel};
pub use pipeline::{PersistedPipelineData, Pipeline};
pub use provider::{
    PersistedProviderConfigData, ProviderAvailability, ProviderInfo, ProviderSettings,
    ProviderType, WorkspaceProviderConfig,
};
pub use run::{
    PersistedRunData, PipelineRun, ReconcileOutcome, RunHandle, RunSnapshot, SUBMISSION_ERROR_KEY,
    StageStatus, TaskStatus,
};
pub use status::RunStatus;
pub use template::{
    ParameterDefinition, ParameterType, PersistedTemplateData, PipelineTemplate, StageTemplate,
    TaskTemplate, TemplateDefinition, TemplateProvenance,
};
