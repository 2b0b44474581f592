//! Shared world state for pipeline lifecycle BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use pipeline_control::pipeline::{
    adapters::{
        RegistryProviderFactory,
        engine::InMemoryEngineProvider,
        memory::{InMemoryCredentialStore, InMemoryPipelineRepository},
    },
    domain::{PipelineConfig, PipelineRun, ProjectId, WorkspaceId},
    ports::PipelineProvider,
    services::{PipelineOrchestrationService, PipelineServiceError, TemplateCatalog},
};
use rstest::fixture;

/// Service type used by the BDD world.
pub type TestPipelineService = PipelineOrchestrationService<
    InMemoryPipelineRepository,
    RegistryProviderFactory,
    InMemoryCredentialStore,
    DefaultClock,
>;

/// Scenario world for pipeline lifecycle behaviour tests.
pub struct PipelineWorld {
    pub service: TestPipelineService,
    pub engine: Arc<InMemoryEngineProvider>,
    pub workspace_id: Option<WorkspaceId>,
    pub project_id: ProjectId,
    pub pending_config: Option<PipelineConfig>,
    pub last_run: Option<PipelineRun>,
    pub last_error: Option<PipelineServiceError>,
}

impl PipelineWorld {
    /// Creates a world backed by in-memory adapters.
    ///
    /// # Panics
    ///
    /// Panics if the embedded template catalogue is malformed.
    #[must_use]
    pub fn new() -> Self {
        let catalog = Arc::new(
            TemplateCatalog::builtin(&DefaultClock).expect("embedded templates are valid"),
        );
        let engine = Arc::new(InMemoryEngineProvider::new(
            Arc::clone(&catalog),
            Arc::new(DefaultClock),
        ));
        let shared: Arc<dyn PipelineProvider> = engine.clone();
        let service = PipelineOrchestrationService::new(
            Arc::new(InMemoryPipelineRepository::new()),
            Arc::new(RegistryProviderFactory::new().with_shared(shared)),
            Arc::new(InMemoryCredentialStore::new()),
            catalog,
            Arc::new(DefaultClock),
        );

        Self {
            service,
            engine,
            workspace_id: None,
            project_id: ProjectId::new("proj-bdd").expect("valid project"),
            pending_config: None,
            last_run: None,
            last_error: None,
        }
    }

    /// Returns the scenario workspace.
    ///
    /// # Errors
    ///
    /// Returns an error when no workspace step has run.
    pub fn workspace(&self) -> Result<WorkspaceId, eyre::Report> {
        self.workspace_id
            .clone()
            .ok_or_else(|| eyre::eyre!("missing workspace in scenario world"))
    }

    /// Returns the most recent run.
    ///
    /// # Errors
    ///
    /// Returns an error when no run has been submitted.
    pub fn run(&self) -> Result<&PipelineRun, eyre::Report> {
        self.last_run
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing run in scenario world"))
    }
}

impl Default for PipelineWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> PipelineWorld {
    PipelineWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
