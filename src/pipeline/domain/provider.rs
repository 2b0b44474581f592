//! Provider catalogue and per-workspace provider configuration.

use super::{ParseProviderTypeError, ProviderConfigId, WorkspaceId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque provider settings.
pub type ProviderSettings = BTreeMap<String, String>;

/// Recognised backend engine types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    /// Kubernetes-native pipeline engine.
    Tekton,
    /// Hosted GitHub workflow runners.
    GithubActions,
    /// Hosted GitLab runners.
    GitlabCi,
}

impl ProviderType {
    /// Every recognised type, whether or not an adapter exists.
    pub const ALL: [Self; 3] = [Self::Tekton, Self::GithubActions, Self::GitlabCi];

    /// Returns the canonical identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tekton => "tekton",
            Self::GithubActions => "github-actions",
            Self::GitlabCi => "gitlab-ci",
        }
    }

    /// Returns catalogue metadata for this type.
    #[must_use]
    pub fn info(self) -> ProviderInfo {
        match self {
            Self::Tekton => ProviderInfo {
                provider_type: self,
                display_name: "Tekton Pipelines".to_owned(),
                description: "Cloud-native CI/CD pipelines running inside the workspace cluster"
                    .to_owned(),
                features: [
                    "kubernetes-native",
                    "extensible",
                    "reusable-tasks",
                    "parallel-execution",
                ]
                .map(str::to_owned)
                .to_vec(),
                availability: ProviderAvailability::Available,
            },
            Self::GithubActions => ProviderInfo {
                provider_type: self,
                display_name: "GitHub Actions".to_owned(),
                description: "Workflows executed on GitHub-hosted or self-hosted runners"
                    .to_owned(),
                features: ["hosted-runners", "marketplace-actions"]
                    .map(str::to_owned)
                    .to_vec(),
                availability: ProviderAvailability::Beta,
            },
            Self::GitlabCi => ProviderInfo {
                provider_type: self,
                display_name: "GitLab CI".to_owned(),
                description: "Pipelines executed on GitLab runners".to_owned(),
                features: ["hosted-runners", "merge-request-pipelines"]
                    .map(str::to_owned)
                    .to_vec(),
                availability: ProviderAvailability::Beta,
            },
        }
    }
}

impl TryFrom<&str> for ProviderType {
    type Error = ParseProviderTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "tekton" => Ok(Self::Tekton),
            "github-actions" => Ok(Self::GithubActions),
            "gitlab-ci" => Ok(Self::GitlabCi),
            _ => Err(ParseProviderTypeError(value.to_owned())),
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maturity of a provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderAvailability {
    /// Generally available.
    Available,
    /// Usable but incomplete.
    Beta,
}

/// Capability discovery entry for a provider type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider type.
    pub provider_type: ProviderType,
    /// Display name.
    pub display_name: String,
    /// Description.
    pub description: String,
    /// Feature tags.
    pub features: Vec<String>,
    /// Maturity.
    pub availability: ProviderAvailability,
}

/// Provider configuration for a workspace.
///
/// At most one configuration per workspace is active at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceProviderConfig {
    id: ProviderConfigId,
    workspace_id: WorkspaceId,
    provider_type: ProviderType,
    settings: ProviderSettings,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted provider configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedProviderConfigData {
    /// Row identifier.
    pub id: ProviderConfigId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Selected provider type.
    pub provider_type: ProviderType,
    /// Provider settings.
    pub settings: ProviderSettings,
    /// Whether this row is the active configuration.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl WorkspaceProviderConfig {
    /// Creates an active configuration.
    #[must_use]
    pub fn new(
        workspace_id: WorkspaceId,
        provider_type: ProviderType,
        settings: ProviderSettings,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id: ProviderConfigId::new(),
            workspace_id,
            provider_type,
            settings,
            is_active: true,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a configuration from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedProviderConfigData) -> Self {
        Self {
            id: data.id,
            workspace_id: data.workspace_id,
            provider_type: data.provider_type,
            settings: data.settings,
            is_active: data.is_active,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the row identifier.
    #[must_use]
    pub const fn id(&self) -> ProviderConfigId {
        self.id
    }

    /// Returns the owning workspace.
    #[must_use]
    pub const fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }

    /// Returns the selected provider type.
    #[must_use]
    pub const fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    /// Returns the provider settings.
    #[must_use]
    pub const fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Returns whether this row is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
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

    /// Marks the row inactive as of `at`, the activation time of its
    /// successor.
    pub const fn deactivate(&mut self, at: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = at;
    }
}
