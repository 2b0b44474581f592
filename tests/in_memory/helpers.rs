//! Shared fixtures for in-memory pipeline integration tests.

use mockable::DefaultClock;
use pipeline_control::pipeline::{
    adapters::{
        RegistryProviderFactory,
        engine::InMemoryEngineProvider,
        memory::{InMemoryCredentialStore, InMemoryPipelineRepository},
    },
    domain::{PipelineConfig, ProjectId, RegistryConfig, WorkspaceId},
    ports::PipelineProvider,
    services::{LogAccessService, PipelineOrchestrationService, TemplateCatalog},
};
use rstest::fixture;
use std::sync::Arc;

/// Orchestration service wired to in-memory adapters.
pub type TestService = PipelineOrchestrationService<
    InMemoryPipelineRepository,
    RegistryProviderFactory,
    InMemoryCredentialStore,
    DefaultClock,
>;

/// Log service sharing the orchestration service's resolver.
pub type TestLogs = LogAccessService<InMemoryPipelineRepository, RegistryProviderFactory>;

/// Services plus handles on the adapters behind them.
pub struct Stack {
    /// Backing repository.
    pub repository: Arc<InMemoryPipelineRepository>,
    /// Simulated engine registered for Tekton.
    pub engine: Arc<InMemoryEngineProvider>,
    /// Secret registry.
    pub credentials: Arc<InMemoryCredentialStore>,
    /// Orchestration service.
    pub service: TestService,
    /// Log access service.
    pub logs: TestLogs,
}

/// Builds a fresh stack with the built-in template catalogue.
#[fixture]
pub fn stack() -> Stack {
    let catalog =
        Arc::new(TemplateCatalog::builtin(&DefaultClock).expect("embedded templates are valid"));
    let engine = Arc::new(InMemoryEngineProvider::new(
        Arc::clone(&catalog),
        Arc::new(DefaultClock),
    ));
    let shared: Arc<dyn PipelineProvider> = engine.clone();
    let factory = Arc::new(RegistryProviderFactory::new().with_shared(shared));
    let repository = Arc::new(InMemoryPipelineRepository::new());
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let service = PipelineOrchestrationService::new(
        Arc::clone(&repository),
        factory,
        Arc::clone(&credentials),
        catalog,
        Arc::new(DefaultClock),
    );
    let logs = LogAccessService::new(
        Arc::clone(&repository),
        service.resolver(),
        service.settings().max_log_entries,
    );
    Stack {
        repository,
        engine,
        credentials,
        service,
        logs,
    }
}

/// Workspace used by most tests.
#[must_use]
pub fn workspace() -> WorkspaceId {
    WorkspaceId::new("ws-alpha").expect("valid workspace")
}

/// Project used by most tests.
#[must_use]
pub fn project() -> ProjectId {
    ProjectId::new("proj-web").expect("valid project")
}

/// A complete config named `name` with no secret references.
#[must_use]
pub fn config(name: &str) -> PipelineConfig {
    PipelineConfig::new(workspace(), project(), name)
        .with_git_url("https://git.example.com/web.git")
        .with_git_branch("main")
        .with_service_account("pipeline")
}

/// A config referencing an SSH key and a registry credential.
#[must_use]
pub fn config_with_secrets(name: &str) -> PipelineConfig {
    config(name).with_ssh_key_ref("git-deploy-key").with_registry(RegistryConfig {
        url: "registry.example.com".to_owned(),
        namespace: None,
        cred_ref: Some("registry-creds".to_owned()),
        insecure: false,
    })
}
