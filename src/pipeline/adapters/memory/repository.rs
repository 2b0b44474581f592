//! In-memory pipeline repository for tests and local runs.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::pipeline::{
    domain::{
        Pipeline, PipelineId, PipelineRun, PipelineTemplate, ProjectId, ProviderType, RunId,
        TemplateId, WorkspaceId, WorkspaceProviderConfig,
    },
    ports::{PipelineRepository, PipelineRepositoryError, PipelineRepositoryResult},
};

/// Thread-safe in-memory pipeline repository.
///
/// A single lock guards all state, so multi-step operations such as
/// provider config activation are atomic with respect to readers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPipelineRepository {
    state: Arc<RwLock<InMemoryPipelineState>>,
}

#[derive(Debug, Default)]
struct InMemoryPipelineState {
    pipelines: HashMap<PipelineId, Pipeline>,
    runs: HashMap<RunId, PipelineRun>,
    run_names: HashMap<String, RunId>,
    templates: BTreeMap<TemplateId, PipelineTemplate>,
    provider_configs: Vec<WorkspaceProviderConfig>,
}

impl InMemoryPipelineRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored provider configuration row of a workspace,
    /// active or not.
    ///
    /// # Errors
    ///
    /// Returns persistence errors when lock acquisition fails.
    pub fn provider_config_history(
        &self,
        workspace_id: &WorkspaceId,
    ) -> PipelineRepositoryResult<Vec<WorkspaceProviderConfig>> {
        let state = self.read()?;
        Ok(state
            .provider_configs
            .iter()
            .filter(|config| config.workspace_id() == workspace_id)
            .cloned()
            .collect())
    }

    fn read(&self) -> PipelineRepositoryResult<RwLockReadGuard<'_, InMemoryPipelineState>> {
        self.state.read().map_err(|err| {
            PipelineRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> PipelineRepositoryResult<RwLockWriteGuard<'_, InMemoryPipelineState>> {
        self.state.write().map_err(|err| {
            PipelineRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

fn newest_runs_first(runs: &mut [PipelineRun]) {
    runs.sort_by(|left, right| {
        right
            .started_at()
            .cmp(&left.started_at())
            .then_with(|| right.id().cmp(&left.id()))
    });
}

fn remove_run(state: &mut InMemoryPipelineState, id: RunId) -> Option<PipelineRun> {
    let run = state.runs.remove(&id)?;
    if let Some(name) = run.provider_run_name() {
        state.run_names.remove(name);
    }
    Some(run)
}

#[async_trait]
impl PipelineRepository for InMemoryPipelineRepository {
    async fn create_pipeline(&self, pipeline: &Pipeline) -> PipelineRepositoryResult<()> {
        let mut state = self.write()?;
        let duplicate = state.pipelines.values().any(|existing| {
            existing.id() == pipeline.id()
                || (existing.workspace_id() == pipeline.workspace_id()
                    && existing.project_id() == pipeline.project_id()
                    && existing.name() == pipeline.name())
        });
        if duplicate {
            return Err(PipelineRepositoryError::DuplicatePipeline {
                workspace_id: pipeline.workspace_id().clone(),
                name: pipeline.name().to_owned(),
            });
        }
        state.pipelines.insert(pipeline.id(), pipeline.clone());
        Ok(())
    }

    async fn update_pipeline(&self, pipeline: &Pipeline) -> PipelineRepositoryResult<()> {
        let mut state = self.write()?;
        let stored = state
            .pipelines
            .get_mut(&pipeline.id())
            .ok_or(PipelineRepositoryError::PipelineNotFound(pipeline.id()))?;
        *stored = pipeline.clone();
        Ok(())
    }

    async fn find_pipeline(&self, id: PipelineId) -> PipelineRepositoryResult<Option<Pipeline>> {
        let state = self.read()?;
        Ok(state.pipelines.get(&id).cloned())
    }

    async fn find_pipeline_by_name(
        &self,
        workspace_id: &WorkspaceId,
        project_id: &ProjectId,
        name: &str,
    ) -> PipelineRepositoryResult<Option<Pipeline>> {
        let state = self.read()?;
        Ok(state
            .pipelines
            .values()
            .find(|pipeline| {
                pipeline.workspace_id() == workspace_id
                    && pipeline.project_id() == project_id
                    && pipeline.name() == name
            })
            .cloned())
    }

    async fn list_pipelines(
        &self,
        workspace_id: &WorkspaceId,
        project_id: &ProjectId,
    ) -> PipelineRepositoryResult<Vec<Pipeline>> {
        let state = self.read()?;
        let mut pipelines: Vec<Pipeline> = state
            .pipelines
            .values()
            .filter(|pipeline| {
                pipeline.workspace_id() == workspace_id && pipeline.project_id() == project_id
            })
            .cloned()
            .collect();
        pipelines.sort_by_key(|pipeline| std::cmp::Reverse(pipeline.created_at()));
        Ok(pipelines)
    }

    async fn delete_pipeline(&self, id: PipelineId) -> PipelineRepositoryResult<()> {
        let mut state = self.write()?;
        if !state.pipelines.contains_key(&id) {
            return Err(PipelineRepositoryError::PipelineNotFound(id));
        }
        let run_ids: Vec<RunId> = state
            .runs
            .values()
            .filter(|run| run.pipeline_id() == id)
            .map(PipelineRun::id)
            .collect();
        for run_id in run_ids {
            remove_run(&mut state, run_id);
        }
        state.pipelines.remove(&id);
        Ok(())
    }

    async fn create_pipeline_run(&self, run: &PipelineRun) -> PipelineRepositoryResult<()> {
        let mut state = self.write()?;
        if state.runs.contains_key(&run.id()) {
            return Err(PipelineRepositoryError::DuplicateRun(run.id()));
        }
        if let Some(name) = run.provider_run_name() {
            if state.run_names.contains_key(name) {
                return Err(PipelineRepositoryError::DuplicateProviderRunName(
                    name.to_owned(),
                ));
            }
            state.run_names.insert(name.to_owned(), run.id());
        }
        state.runs.insert(run.id(), run.clone());
        Ok(())
    }

    async fn update_pipeline_run(&self, run: &PipelineRun) -> PipelineRepositoryResult<PipelineRun> {
        let mut state = self.write()?;
        let stored = state
            .runs
            .get(&run.id())
            .ok_or(PipelineRepositoryError::RunNotFound(run.id()))?
            .clone();

        let stored_status = stored.status();
        let writable = stored_status.can_transition_to(run.status())
            || (stored_status == run.status() && !stored_status.is_terminal());
        if !writable {
            return Ok(stored);
        }

        if let Some(name) = run.provider_run_name() {
            let owner = state.run_names.get(name).copied();
            if owner.is_some_and(|owner| owner != run.id()) {
                return Err(PipelineRepositoryError::DuplicateProviderRunName(
                    name.to_owned(),
                ));
            }
            state.run_names.insert(name.to_owned(), run.id());
        }
        state.runs.insert(run.id(), run.clone());
        Ok(run.clone())
    }

    async fn get_pipeline_run(&self, key: &str) -> PipelineRepositoryResult<Option<PipelineRun>> {
        let state = self.read()?;
        let by_id = RunId::parse(key).and_then(|id| state.runs.get(&id));
        let run = by_id.or_else(|| {
            state
                .run_names
                .get(key)
                .and_then(|id| state.runs.get(id))
        });
        Ok(run.cloned())
    }

    async fn list_pipeline_runs(
        &self,
        workspace_id: &WorkspaceId,
        project_id: &ProjectId,
        limit: usize,
    ) -> PipelineRepositoryResult<Vec<PipelineRun>> {
        let state = self.read()?;
        let mut runs: Vec<PipelineRun> = state
            .runs
            .values()
            .filter(|run| run.workspace_id() == workspace_id && run.project_id() == project_id)
            .cloned()
            .collect();
        newest_runs_first(&mut runs);
        runs.truncate(limit);
        Ok(runs)
    }

    async fn list_runs_for_pipeline(
        &self,
        pipeline_id: PipelineId,
    ) -> PipelineRepositoryResult<Vec<PipelineRun>> {
        let state = self.read()?;
        let mut runs: Vec<PipelineRun> = state
            .runs
            .values()
            .filter(|run| run.pipeline_id() == pipeline_id)
            .cloned()
            .collect();
        newest_runs_first(&mut runs);
        Ok(runs)
    }

    async fn delete_pipeline_run(&self, id: RunId) -> PipelineRepositoryResult<()> {
        let mut state = self.write()?;
        remove_run(&mut state, id)
            .map(|_| ())
            .ok_or(PipelineRepositoryError::RunNotFound(id))
    }

    async fn create_template(&self, template: &PipelineTemplate) -> PipelineRepositoryResult<()> {
        let mut state = self.write()?;
        if state.templates.contains_key(template.id()) {
            return Err(PipelineRepositoryError::DuplicateTemplate(
                template.id().clone(),
            ));
        }
        state
            .templates
            .insert(template.id().clone(), template.clone());
        Ok(())
    }

    async fn update_template(&self, template: &PipelineTemplate) -> PipelineRepositoryResult<()> {
        let mut state = self.write()?;
        let stored = state
            .templates
            .get_mut(template.id())
            .ok_or_else(|| PipelineRepositoryError::TemplateNotFound(template.id().clone()))?;
        *stored = template.clone();
        Ok(())
    }

    async fn get_template(
        &self,
        id: &TemplateId,
    ) -> PipelineRepositoryResult<Option<PipelineTemplate>> {
        let state = self.read()?;
        Ok(state.templates.get(id).cloned())
    }

    async fn list_templates(
        &self,
        provider: Option<ProviderType>,
    ) -> PipelineRepositoryResult<Vec<PipelineTemplate>> {
        let state = self.read()?;
        Ok(state
            .templates
            .values()
            .filter(|template| provider.is_none_or(|wanted| template.provider() == wanted))
            .cloned()
            .collect())
    }

    async fn delete_template(&self, id: &TemplateId) -> PipelineRepositoryResult<()> {
        let mut state = self.write()?;
        state
            .templates
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PipelineRepositoryError::TemplateNotFound(id.clone()))
    }

    async fn get_provider_config(
        &self,
        workspace_id: &WorkspaceId,
    ) -> PipelineRepositoryResult<Option<WorkspaceProviderConfig>> {
        let state = self.read()?;
        Ok(state
            .provider_configs
            .iter()
            .find(|config| config.workspace_id() == workspace_id && config.is_active())
            .cloned())
    }

    async fn set_provider_config(
        &self,
        config: &WorkspaceProviderConfig,
    ) -> PipelineRepositoryResult<()> {
        let mut state = self.write()?;
        for existing in &mut state.provider_configs {
            if existing.workspace_id() == config.workspace_id() && existing.is_active() {
                existing.deactivate(config.updated_at());
            }
        }
        state
            .provider_configs
            .retain(|existing| existing.id() != config.id());
        state.provider_configs.push(config.clone());
        Ok(())
    }
}
