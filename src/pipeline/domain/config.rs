//! Backend-agnostic pipeline configuration.
//!
//! A [`PipelineConfig`] is what callers submit to run a pipeline. It is
//! either written by hand or produced by expanding a template, in which case
//! [`PipelineConfig::stages`] holds the ordered stage plan.

use super::{PipelineDomainError, ProjectId, WorkspaceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Source repository settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSource {
    /// Clone URL.
    pub url: String,
    /// Branch to build.
    #[serde(default)]
    pub branch: Option<String>,
    /// Exact commit to build.
    #[serde(default)]
    pub commit_sha: Option<String>,
    /// Secret holding an SSH deploy key.
    #[serde(default)]
    pub ssh_key_ref: Option<String>,
    /// Secret holding an access token.
    #[serde(default)]
    pub token_ref: Option<String>,
    /// Whether submodules are cloned.
    #[serde(default)]
    pub submodules: bool,
}

/// Image build strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildType {
    /// Dockerfile build.
    #[default]
    Docker,
    /// Cloud-native buildpacks.
    Buildpack,
    /// Engine-specific custom build.
    Custom,
}

/// Image build settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build strategy.
    #[serde(default)]
    pub build_type: BuildType,
    /// Dockerfile path relative to the build context.
    #[serde(default)]
    pub dockerfile: Option<String>,
    /// Build context directory.
    #[serde(default)]
    pub context: Option<String>,
    /// Target image reference.
    #[serde(default)]
    pub image: Option<String>,
    /// Extra build arguments.
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
}

/// Deployment settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Manifest path applied after the build.
    #[serde(default)]
    pub manifest_path: Option<String>,
    /// Target namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Helm chart reference.
    #[serde(default)]
    pub helm_chart: Option<String>,
    /// Kustomize overlay path.
    #[serde(default)]
    pub kustomize_path: Option<String>,
}

/// Container registry settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry URL.
    pub url: String,
    /// Repository namespace inside the registry.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Secret holding registry credentials.
    #[serde(default)]
    pub cred_ref: Option<String>,
    /// Whether TLS verification is skipped.
    #[serde(default)]
    pub insecure: bool,
}

/// Resource requests for a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequests {
    /// CPU request, e.g. `500m`.
    #[serde(default)]
    pub cpu: Option<String>,
    /// Memory request, e.g. `512Mi`.
    #[serde(default)]
    pub memory: Option<String>,
}

/// One task of an expanded stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPlan {
    /// Task name, unique within its stage.
    pub name: String,
    /// Engine task type, e.g. `git-clone`.
    pub task_type: String,
    /// Fully resolved task parameters.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    /// Resource requests.
    #[serde(default)]
    pub resources: Option<ResourceRequests>,
    /// Task timeout in seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// One stage of an expanded pipeline.
///
/// Dependencies are explicit edges; the position of a stage in
/// [`PipelineConfig::stages`] carries no scheduling meaning beyond being a
/// valid topological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagePlan {
    /// Stage name, unique within the pipeline.
    pub name: String,
    /// Stages that must finish before this one starts.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Tasks executed by this stage.
    #[serde(default)]
    pub tasks: Vec<TaskPlan>,
}

/// Request to run a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Pipeline name, unique per workspace and project.
    pub name: String,
    /// Namespace where the run and its secrets live.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Source repository.
    #[serde(default)]
    pub git_repo: GitSource,
    /// Build settings.
    #[serde(default)]
    pub build: Option<BuildConfig>,
    /// Deployment settings.
    #[serde(default)]
    pub deploy: Option<DeployConfig>,
    /// Registry settings.
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
    /// Service account the run executes as.
    #[serde(default)]
    pub service_account: String,
    /// Overall run timeout in seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Free-form metadata copied onto the run.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    /// Stage plan produced by template expansion.
    #[serde(default)]
    pub stages: Vec<StagePlan>,
}

impl PipelineConfig {
    /// Creates a configuration with the required tenant context and name.
    #[must_use]
    pub fn new(workspace_id: WorkspaceId, project_id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            workspace_id,
            project_id,
            name: name.into(),
            namespace: None,
            git_repo: GitSource::default(),
            build: None,
            deploy: None,
            registry: None,
            service_account: String::new(),
            timeout_seconds: None,
            metadata: BTreeMap::new(),
            stages: Vec::new(),
        }
    }

    /// Sets the source repository URL.
    #[must_use]
    pub fn with_git_url(mut self, url: impl Into<String>) -> Self {
        self.git_repo.url = url.into();
        self
    }

    /// Sets the source repository branch.
    #[must_use]
    pub fn with_git_branch(mut self, branch: impl Into<String>) -> Self {
        self.git_repo.branch = Some(branch.into());
        self
    }

    /// Sets the SSH key secret reference.
    #[must_use]
    pub fn with_ssh_key_ref(mut self, secret: impl Into<String>) -> Self {
        self.git_repo.ssh_key_ref = Some(secret.into());
        self
    }

    /// Sets the service account.
    #[must_use]
    pub fn with_service_account(mut self, service_account: impl Into<String>) -> Self {
        self.service_account = service_account.into();
        self
    }

    /// Sets the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets registry settings.
    #[must_use]
    pub fn with_registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets build settings.
    #[must_use]
    pub fn with_build(mut self, build: BuildConfig) -> Self {
        self.build = Some(build);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Checks the fields every provider needs to accept a submission.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineDomainError::MissingField`] naming the first blank
    /// required field.
    pub fn validate(&self) -> Result<(), PipelineDomainError> {
        if self.name.trim().is_empty() {
            return Err(PipelineDomainError::MissingField("pipeline name"));
        }
        if self.git_repo.url.trim().is_empty() {
            return Err(PipelineDomainError::MissingField("git repository URL"));
        }
        if self.service_account.trim().is_empty() {
            return Err(PipelineDomainError::MissingField("service account"));
        }
        Ok(())
    }

    /// Secret references that must exist before submission, with a label
    /// describing each.
    #[must_use]
    pub fn referenced_secrets(&self) -> Vec<(&'static str, &str)> {
        let ssh_key = self
            .git_repo
            .ssh_key_ref
            .as_deref()
            .map(|secret| ("git SSH key", secret));
        let registry = self
            .registry
            .as_ref()
            .and_then(|registry| registry.cred_ref.as_deref())
            .map(|secret| ("registry credential", secret));
        ssh_key
            .into_iter()
            .chain(registry)
            .filter(|(_, secret)| !secret.trim().is_empty())
            .collect()
    }
}
