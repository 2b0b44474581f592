//! Service layer for pipeline run orchestration, templates, and provider
//! configuration.

use super::catalog::TemplateCatalog;
use super::error::{PipelineServiceError, PipelineServiceResult};
use super::resolver::ProviderResolver;
use super::settings::ServiceSettings;
use super::template_engine::TemplateEngine;
use crate::pipeline::{
    domain::{
        Pipeline, PipelineConfig, PipelineId, PipelineRun, PipelineTemplate, ProjectId,
        ProviderInfo, ProviderSettings, ProviderType, ReconcileOutcome, RunId, RunSnapshot,
        RunStatus, TemplateDefinition, TemplateId, WorkspaceId, WorkspaceProviderConfig,
    },
    ports::{
        CredentialValidator, PipelineProvider, PipelineRepository, PipelineRepositoryError,
        ProviderError, ProviderFactory, TemplateRequest,
    },
};
use mockable::Clock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Health and version of a workspace's resolved provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    /// Provider type of the adapter.
    pub provider_type: ProviderType,
    /// Adapter or engine version.
    pub version: String,
    /// Whether the engine answered.
    pub healthy: bool,
}

/// Pipeline orchestration service.
///
/// The service holds no run state between calls. Every durable change goes
/// through the repository; the provider is only asked for live status.
pub struct PipelineOrchestrationService<R, F, V, C>
where
    R: PipelineRepository,
    F: ProviderFactory,
    V: CredentialValidator,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    resolver: Arc<ProviderResolver<R, F>>,
    credentials: Arc<V>,
    catalog: Arc<TemplateCatalog>,
    engine: TemplateEngine,
    settings: ServiceSettings,
    clock: Arc<C>,
}

impl<R, F, V, C> PipelineOrchestrationService<R, F, V, C>
where
    R: PipelineRepository,
    F: ProviderFactory,
    V: CredentialValidator,
    C: Clock + Send + Sync,
{
    /// Creates a service with default settings.
    #[must_use]
    pub fn new(
        repository: Arc<R>,
        factory: Arc<F>,
        credentials: Arc<V>,
        catalog: Arc<TemplateCatalog>,
        clock: Arc<C>,
    ) -> Self {
        Self::with_settings(
            repository,
            factory,
            credentials,
            catalog,
            clock,
            ServiceSettings::default(),
        )
    }

    /// Creates a service with explicit settings.
    #[must_use]
    pub fn with_settings(
        repository: Arc<R>,
        factory: Arc<F>,
        credentials: Arc<V>,
        catalog: Arc<TemplateCatalog>,
        clock: Arc<C>,
        settings: ServiceSettings,
    ) -> Self {
        let resolver = Arc::new(ProviderResolver::new(
            Arc::clone(&repository),
            factory,
            settings.default_provider,
        ));
        Self {
            repository,
            resolver,
            credentials,
            catalog,
            engine: TemplateEngine::new(),
            settings,
            clock,
        }
    }

    /// Returns the provider resolver, for sharing its cache with the log
    /// access service.
    #[must_use]
    pub fn resolver(&self) -> Arc<ProviderResolver<R, F>> {
        Arc::clone(&self.resolver)
    }

    /// Returns the active settings.
    #[must_use]
    pub const fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Validates `config`, submits it, and returns the persisted run.
    ///
    /// The run is stored as `Pending` before the provider is called, so a
    /// crash after submission leaves a record that the next status read
    /// reconciles. A rejected submission marks the run `Failed`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for incomplete configs or missing secrets,
    /// repository errors, and provider errors with their kind preserved.
    pub async fn run_pipeline(&self, config: PipelineConfig) -> PipelineServiceResult<PipelineRun> {
        config.validate()?;
        self.check_secrets(&config).await?;

        let workspace_id = config.workspace_id.clone();
        let provider = self.resolver.resolve(&workspace_id).await?;
        provider
            .validate_config(&config)
            .await
            .map_err(|err| PipelineServiceError::provider("run_pipeline", workspace_id.clone(), err))?;

        let pipeline = self.upsert_pipeline(&config, provider.name()).await?;
        let run_id = RunId::new();
        let mut run = PipelineRun::new(run_id, pipeline.id(), &config, &*self.clock);
        self.repository.create_pipeline_run(&run).await?;

        match provider.run_pipeline(run_id, &config).await {
            Ok(handle) => {
                run.attach_handle(&handle, &*self.clock);
                let stored = self.repository.update_pipeline_run(&run).await?;
                info!(
                    workspace_id = %workspace_id,
                    run_id = %run_id,
                    provider = provider.name().as_str(),
                    provider_run_name = %handle.provider_run_name,
                    "pipeline run submitted"
                );
                Ok(stored)
            }
            Err(err) => {
                warn!(
                    workspace_id = %workspace_id,
                    run_id = %run_id,
                    error = %err,
                    "provider rejected pipeline submission"
                );
                if let Err(record_err) = self.record_submission_failure(&mut run, &err).await {
                    error!(
                        workspace_id = %workspace_id,
                        run_id = %run_id,
                        error = %record_err,
                        "failed to record rejected submission"
                    );
                }
                Err(PipelineServiceError::provider("run_pipeline", workspace_id, err))
            }
        }
    }

    /// Reads live status and writes it through when the run advanced.
    ///
    /// Terminal records are returned without asking the provider.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::RunNotFound`] when the workspace has
    /// no such run, and repository or provider errors.
    pub async fn get_status(
        &self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
    ) -> PipelineServiceResult<PipelineRun> {
        let run = self.load_run(workspace_id, &run_id.to_string()).await?;
        if run.status().is_terminal() {
            return Ok(run);
        }
        let provider = self.resolver.resolve(workspace_id).await?;
        let snapshot = provider
            .get_status(workspace_id, run_id)
            .await
            .map_err(|err| PipelineServiceError::provider("get_status", workspace_id.clone(), err))?;
        self.reconcile(run, &snapshot).await
    }

    /// Cancels a run. Cancelling a terminal run returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::RunNotFound`] when the workspace has
    /// no such run, and repository or provider errors.
    pub async fn cancel_pipeline(
        &self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
    ) -> PipelineServiceResult<PipelineRun> {
        let mut run = self.load_run(workspace_id, &run_id.to_string()).await?;
        if run.status().is_terminal() {
            debug!(run_id = %run_id, status = %run.status(), "cancel of terminal run ignored");
            return Ok(run);
        }
        let provider = self.resolver.resolve(workspace_id).await?;
        let wrap =
            |err| PipelineServiceError::provider("cancel_pipeline", workspace_id.clone(), err);
        // Executions are found by run label, so a missing handle does not
        // mean the engine never received the run.
        match provider.cancel_pipeline(workspace_id, run_id).await {
            Ok(()) => {}
            Err(ProviderError::RunNotFound(_)) if run.provider_run_name().is_none() => {
                run.transition_to(RunStatus::Cancelled, &*self.clock)?;
                debug!(run_id = %run_id, "run never reached the engine; cancelled locally");
                return Ok(self.repository.update_pipeline_run(&run).await?);
            }
            Err(err) => return Err(wrap(err)),
        }
        let snapshot = provider.get_status(workspace_id, run_id).await.map_err(wrap)?;
        info!(workspace_id = %workspace_id, run_id = %run_id, "pipeline run cancelled");
        self.reconcile(run, &snapshot).await
    }

    /// Removes a run from the engine and from storage.
    ///
    /// An execution already gone from the engine is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::RunNotFound`] when the workspace has
    /// no such run, and repository or provider errors.
    pub async fn delete_pipeline_run(
        &self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
    ) -> PipelineServiceResult<()> {
        let run = self.load_run(workspace_id, &run_id.to_string()).await?;
        let provider = self.resolver.resolve(workspace_id).await?;
        Self::delete_execution(provider.as_ref(), &run).await?;
        self.repository.delete_pipeline_run(run.id()).await?;
        info!(workspace_id = %workspace_id, run_id = %run_id, "pipeline run deleted");
        Ok(())
    }

    /// Deletes a pipeline, its engine executions, and its runs.
    ///
    /// Executions are removed first; runs are deleted before the pipeline
    /// in one repository transaction. The first failure stops the sequence.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::PipelineNotFound`] when the workspace
    /// has no such pipeline, and repository or provider errors.
    pub async fn delete_pipeline(
        &self,
        workspace_id: &WorkspaceId,
        pipeline_id: PipelineId,
    ) -> PipelineServiceResult<()> {
        let pipeline = self
            .repository
            .find_pipeline(pipeline_id)
            .await?
            .filter(|pipeline| pipeline.workspace_id() == workspace_id)
            .ok_or(PipelineServiceError::PipelineNotFound(pipeline_id))?;
        let provider = self.resolver.resolve(workspace_id).await?;
        for run in self.repository.list_runs_for_pipeline(pipeline.id()).await? {
            Self::delete_execution(provider.as_ref(), &run).await?;
        }
        self.repository.delete_pipeline(pipeline.id()).await?;
        info!(
            workspace_id = %workspace_id,
            pipeline_id = %pipeline_id,
            "pipeline deleted"
        );
        Ok(())
    }

    /// Lists a project's runs, newest first, after folding in the engine's
    /// view of them.
    ///
    /// `limit` is capped by the configured list limit.
    ///
    /// # Errors
    ///
    /// Returns repository or provider errors.
    pub async fn list_pipelines(
        &self,
        workspace_id: &WorkspaceId,
        project_id: &ProjectId,
        limit: Option<usize>,
    ) -> PipelineServiceResult<Vec<PipelineRun>> {
        let capped = limit
            .unwrap_or(self.settings.list_limit)
            .min(self.settings.list_limit);
        let provider = self.resolver.resolve(workspace_id).await?;
        let snapshots = provider
            .list_pipelines(workspace_id, project_id, capped)
            .await
            .map_err(|err| {
                PipelineServiceError::provider("list_pipelines", workspace_id.clone(), err)
            })?;
        for snapshot in snapshots {
            let Some(run) = self
                .repository
                .get_pipeline_run(&snapshot.run_id.to_string())
                .await?
            else {
                debug!(run_id = %snapshot.run_id, "engine reports a run unknown to storage");
                continue;
            };
            if run.workspace_id() == workspace_id {
                self.reconcile(run, &snapshot).await?;
            }
        }
        Ok(self
            .repository
            .list_pipeline_runs(workspace_id, project_id, capped)
            .await?)
    }

    /// Re-submits the stored configuration of a run's pipeline as a new run.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::RunNotFound`] or
    /// [`PipelineServiceError::PipelineNotFound`], and the errors of
    /// [`Self::run_pipeline`].
    pub async fn retry_pipeline(
        &self,
        workspace_id: &WorkspaceId,
        run_key: &str,
    ) -> PipelineServiceResult<PipelineRun> {
        let previous = self.load_run(workspace_id, run_key).await?;
        let pipeline = self
            .repository
            .find_pipeline(previous.pipeline_id())
            .await?
            .ok_or(PipelineServiceError::PipelineNotFound(previous.pipeline_id()))?;
        info!(
            workspace_id = %workspace_id,
            previous_run_id = %previous.id(),
            "retrying pipeline run"
        );
        self.run_pipeline(pipeline.source_config().clone()).await
    }

    /// Returns a run by platform id or provider run name.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::RunNotFound`] when the workspace has
    /// no such run, and repository errors.
    pub async fn get_pipeline_run(
        &self,
        workspace_id: &WorkspaceId,
        run_key: &str,
    ) -> PipelineServiceResult<PipelineRun> {
        self.load_run(workspace_id, run_key).await
    }

    /// Expands a stored, built-in, or provider template into a config ready
    /// for [`Self::run_pipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::TemplateNotFound`] when no source has
    /// the template, and validation errors for bad parameters.
    pub async fn create_from_template(
        &self,
        request: &TemplateRequest,
    ) -> PipelineServiceResult<PipelineConfig> {
        if let Some(template) = self.find_template(&request.template_id).await? {
            return Ok(self.engine.expand(&template, request, &*self.clock)?);
        }
        let provider = self.resolver.resolve(&request.workspace_id).await?;
        provider
            .create_from_template(request)
            .await
            .map_err(|err| match err {
                ProviderError::TemplateNotFound(id) => PipelineServiceError::TemplateNotFound(id),
                other => PipelineServiceError::provider(
                    "create_from_template",
                    request.workspace_id.clone(),
                    other,
                ),
            })
    }

    /// Stores a new user template.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::BuiltInTemplate`] when the id is taken
    /// by a built-in, template validation errors, and repository errors.
    pub async fn create_template(
        &self,
        definition: TemplateDefinition,
    ) -> PipelineServiceResult<PipelineTemplate> {
        self.ensure_not_builtin(&definition.id)?;
        self.engine.validate(&definition)?;
        let template = PipelineTemplate::new(definition, &*self.clock);
        self.repository.create_template(&template).await?;
        info!(template_id = %template.id(), "template created");
        Ok(template)
    }

    /// Replaces the content of a stored user template.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::BuiltInTemplate`] for built-ins,
    /// [`PipelineServiceError::TemplateNotFound`] for unknown ids, template
    /// validation errors, and repository errors.
    pub async fn update_template(
        &self,
        definition: TemplateDefinition,
    ) -> PipelineServiceResult<PipelineTemplate> {
        self.ensure_not_builtin(&definition.id)?;
        self.engine.validate(&definition)?;
        let mut template = self
            .repository
            .get_template(&definition.id)
            .await?
            .ok_or_else(|| PipelineServiceError::TemplateNotFound(definition.id.clone()))?;
        template.revise(definition, &*self.clock);
        self.repository.update_template(&template).await?;
        Ok(template)
    }

    /// Returns a stored or built-in template.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::TemplateNotFound`] when neither source
    /// has it, and repository errors.
    pub async fn get_template(&self, id: &TemplateId) -> PipelineServiceResult<PipelineTemplate> {
        self.find_template(id)
            .await?
            .ok_or_else(|| PipelineServiceError::TemplateNotFound(id.clone()))
    }

    /// Lists templates visible to a workspace, ordered by id.
    ///
    /// Stored templates shadow built-ins, which shadow the resolved
    /// provider's own templates.
    ///
    /// # Errors
    ///
    /// Returns repository or provider errors.
    pub async fn list_templates(
        &self,
        workspace_id: &WorkspaceId,
        provider_type: Option<ProviderType>,
    ) -> PipelineServiceResult<Vec<PipelineTemplate>> {
        let wanted = |template: &PipelineTemplate| {
            provider_type.is_none_or(|filter| template.provider() == filter)
        };
        let mut merged: BTreeMap<TemplateId, PipelineTemplate> = BTreeMap::new();

        let provider = self.resolver.resolve(workspace_id).await?;
        let provider_templates = provider.get_templates().await.map_err(|err| {
            PipelineServiceError::provider("list_templates", workspace_id.clone(), err)
        })?;
        let builtins = self.catalog.templates().iter().cloned();
        let stored = self.repository.list_templates(provider_type).await?;
        for template in provider_templates.into_iter().chain(builtins).chain(stored) {
            if wanted(&template) {
                merged.insert(template.id().clone(), template);
            }
        }
        Ok(merged.into_values().collect())
    }

    /// Deletes a stored user template.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::BuiltInTemplate`] for built-ins and
    /// repository errors, including not-found.
    pub async fn delete_template(&self, id: &TemplateId) -> PipelineServiceResult<()> {
        self.ensure_not_builtin(id)?;
        self.repository.delete_template(id).await?;
        Ok(())
    }

    /// Returns catalogue metadata for every recognised provider type.
    #[must_use]
    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        self.resolver
            .factory()
            .list_providers()
            .into_iter()
            .map(ProviderType::info)
            .collect()
    }

    /// Returns the active provider configuration of a workspace.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn get_provider_config(
        &self,
        workspace_id: &WorkspaceId,
    ) -> PipelineServiceResult<Option<WorkspaceProviderConfig>> {
        Ok(self.repository.get_provider_config(workspace_id).await?)
    }

    /// Activates a new provider configuration for a workspace.
    ///
    /// The adapter is built once up front so that unsupported or
    /// unimplemented providers are rejected before anything is stored.
    ///
    /// # Errors
    ///
    /// Returns provider errors from the factory and repository errors.
    pub async fn set_provider_config(
        &self,
        workspace_id: &WorkspaceId,
        provider_type: ProviderType,
        settings: ProviderSettings,
    ) -> PipelineServiceResult<WorkspaceProviderConfig> {
        self.resolver
            .factory()
            .create_provider(provider_type, &settings)
            .map_err(|err| {
                PipelineServiceError::provider("set_provider_config", workspace_id.clone(), err)
            })?;
        let config =
            WorkspaceProviderConfig::new(workspace_id.clone(), provider_type, settings, &*self.clock);
        self.repository.set_provider_config(&config).await?;
        self.resolver.invalidate(workspace_id);
        info!(
            workspace_id = %workspace_id,
            provider = provider_type.as_str(),
            "provider configuration activated"
        );
        Ok(config)
    }

    /// Reports the name, version, and health of a workspace's provider.
    ///
    /// # Errors
    ///
    /// Returns repository or factory errors from resolution.
    pub async fn provider_status(
        &self,
        workspace_id: &WorkspaceId,
    ) -> PipelineServiceResult<ProviderStatus> {
        let provider = self.resolver.resolve(workspace_id).await?;
        Ok(ProviderStatus {
            provider_type: provider.name(),
            version: provider.version(),
            healthy: provider.is_healthy().await,
        })
    }

    async fn record_submission_failure(
        &self,
        run: &mut PipelineRun,
        err: &ProviderError,
    ) -> PipelineServiceResult<()> {
        run.mark_submission_failed(err.to_string(), &*self.clock)?;
        self.repository.update_pipeline_run(run).await?;
        Ok(())
    }

    async fn check_secrets(&self, config: &PipelineConfig) -> PipelineServiceResult<()> {
        let namespace = config
            .namespace
            .as_deref()
            .unwrap_or(&self.settings.default_namespace);
        for (label, name) in config.referenced_secrets() {
            if !self.credentials.secret_exists(namespace, name).await? {
                return Err(PipelineServiceError::MissingSecret {
                    label,
                    name: name.to_owned(),
                    namespace: namespace.to_owned(),
                });
            }
        }
        Ok(())
    }

    async fn upsert_pipeline(
        &self,
        config: &PipelineConfig,
        provider_type: ProviderType,
    ) -> PipelineServiceResult<Pipeline> {
        if let Some(pipeline) = self.revise_existing(config, provider_type).await? {
            return Ok(pipeline);
        }
        let pipeline = Pipeline::new(config.clone(), provider_type, &*self.clock);
        match self.repository.create_pipeline(&pipeline).await {
            Ok(()) => Ok(pipeline),
            Err(PipelineRepositoryError::DuplicatePipeline { .. }) => self
                .revise_existing(config, provider_type)
                .await?
                .ok_or_else(|| {
                    PipelineServiceError::Repository(PipelineRepositoryError::DuplicatePipeline {
                        workspace_id: config.workspace_id.clone(),
                        name: config.name.clone(),
                    })
                }),
            Err(err) => Err(err.into()),
        }
    }

    async fn revise_existing(
        &self,
        config: &PipelineConfig,
        provider_type: ProviderType,
    ) -> PipelineServiceResult<Option<Pipeline>> {
        let Some(mut pipeline) = self
            .repository
            .find_pipeline_by_name(&config.workspace_id, &config.project_id, &config.name)
            .await?
        else {
            return Ok(None);
        };
        pipeline.revise(config.clone(), provider_type, &*self.clock);
        self.repository.update_pipeline(&pipeline).await?;
        Ok(Some(pipeline))
    }

    async fn load_run(
        &self,
        workspace_id: &WorkspaceId,
        run_key: &str,
    ) -> PipelineServiceResult<PipelineRun> {
        self.repository
            .get_pipeline_run(run_key)
            .await?
            .filter(|run| run.workspace_id() == workspace_id)
            .ok_or_else(|| PipelineServiceError::RunNotFound(run_key.to_owned()))
    }

    async fn reconcile(
        &self,
        mut run: PipelineRun,
        snapshot: &RunSnapshot,
    ) -> PipelineServiceResult<PipelineRun> {
        match run.reconcile(snapshot, &*self.clock) {
            ReconcileOutcome::Advanced { from, to } => {
                debug!(run_id = %run.id(), %from, %to, "pipeline run advanced");
                Ok(self.repository.update_pipeline_run(&run).await?)
            }
            ReconcileOutcome::Unchanged => Ok(run),
            ReconcileOutcome::Stale { local, reported } => {
                warn!(
                    run_id = %run.id(),
                    %local,
                    %reported,
                    "discarding stale status read"
                );
                Ok(run)
            }
            ReconcileOutcome::TerminalConflict { local, reported } => {
                warn!(
                    run_id = %run.id(),
                    %local,
                    %reported,
                    "engine disagrees with terminal run record; keeping stored state"
                );
                Ok(run)
            }
        }
    }

    async fn find_template(
        &self,
        id: &TemplateId,
    ) -> PipelineServiceResult<Option<PipelineTemplate>> {
        if let Some(stored) = self.repository.get_template(id).await? {
            return Ok(Some(stored));
        }
        Ok(self.catalog.get(id).cloned())
    }

    fn ensure_not_builtin(&self, id: &TemplateId) -> PipelineServiceResult<()> {
        if self.catalog.get(id).is_some() {
            return Err(PipelineServiceError::BuiltInTemplate(id.clone()));
        }
        Ok(())
    }

    async fn delete_execution(
        provider: &dyn PipelineProvider,
        run: &PipelineRun,
    ) -> PipelineServiceResult<()> {
        match provider.delete_pipeline(run.workspace_id(), run.id()).await {
            Ok(()) | Err(ProviderError::RunNotFound(_)) => Ok(()),
            Err(err) => Err(PipelineServiceError::provider(
                "delete_pipeline",
                run.workspace_id().clone(),
                err,
            )),
        }
    }
}
