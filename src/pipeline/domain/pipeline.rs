//! Pipeline aggregate root.

use super::{PipelineConfig, PipelineId, ProjectId, ProviderType, WorkspaceId};
use chrono::{DateTime, Utc};
use mockable::Clock;

/// Named, tenant-scoped execution definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    id: PipelineId,
    workspace_id: WorkspaceId,
    project_id: ProjectId,
    name: String,
    provider: ProviderType,
    source_config: PipelineConfig,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedPipelineData {
    /// Persisted pipeline identifier.
    pub id: PipelineId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Pipeline name.
    pub name: String,
    /// Provider that last executed the pipeline.
    pub provider: ProviderType,
    /// Last submitted configuration.
    pub source_config: PipelineConfig,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    /// Creates a pipeline from a validated run configuration.
    #[must_use]
    pub fn new(config: PipelineConfig, provider: ProviderType, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: PipelineId::new(),
            workspace_id: config.workspace_id.clone(),
            project_id: config.project_id.clone(),
            name: config.name.clone(),
            provider,
            source_config: config,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a pipeline from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedPipelineData) -> Self {
        Self {
            id: data.id,
            workspace_id: data.workspace_id,
            project_id: data.project_id,
            name: data.name,
            provider: data.provider,
            source_config: data.source_config,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the pipeline identifier.
    #[must_use]
    pub const fn id(&self) -> PipelineId {
        self.id
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

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the provider that last executed the pipeline.
    #[must_use]
    pub const fn provider(&self) -> ProviderType {
        self.provider
    }

    /// Returns the last submitted configuration.
    #[must_use]
    pub const fn source_config(&self) -> &PipelineConfig {
        &self.source_config
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

    /// Replaces the stored configuration after an edit or a new submission.
    pub fn revise(&mut self, config: PipelineConfig, provider: ProviderType, clock: &impl Clock) {
        self.source_config = config;
        self.provider = provider;
        self.updated_at = clock.utc();
    }
}
