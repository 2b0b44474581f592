//! In-process Kubernetes-native execution engine.
//!
//! Executions are stored as labelled objects carrying a native `Succeeded`
//! condition, the way a cluster engine would hold them. Tests and local runs
//! drive the engine through [`InMemoryEngineProvider::set_condition`],
//! [`InMemoryEngineProvider::append_log`], and
//! [`InMemoryEngineProvider::set_available`].

use super::condition::{EngineCondition, map_condition};
use super::labels::{
    PROJECT_ID_LABEL, WORKSPACE_ID_LABEL, label_is, run_labels, run_name, selects_run,
};
use crate::pipeline::domain::{
    LogEntry, PipelineConfig, PipelineTemplate, ProjectId, ProviderType, RunHandle, RunId,
    RunSnapshot, RunStatus, StageStatus, WorkspaceId,
};
use crate::pipeline::ports::{
    LogStream, PipelineProvider, ProviderError, ProviderResult, TemplateRequest,
};
use crate::pipeline::services::{TemplateCatalog, TemplateEngine};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use mockable::{Clock, DefaultClock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tracing::debug;

/// API version reported by the simulated engine.
pub const ENGINE_VERSION: &str = "tekton.dev/v1";

#[derive(Debug, Clone)]
struct ExecutionObject {
    name: String,
    labels: BTreeMap<String, String>,
    condition: Option<EngineCondition>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    stages: Vec<StageStatus>,
}

impl ExecutionObject {
    fn status(&self) -> RunStatus {
        map_condition(self.condition.as_ref())
    }

    fn snapshot(&self, run_id: RunId) -> RunSnapshot {
        RunSnapshot {
            run_id,
            provider_run_name: self.name.clone(),
            status: self.status(),
            started_at: self.started_at,
            finished_at: self.completed_at,
            stages: self.stages.clone(),
        }
    }
}

/// Pods belong to exactly one run; names are for display only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PodKey {
    run_id: RunId,
    stage: String,
}

impl PodKey {
    fn new(run_id: RunId, stage: &str) -> Self {
        Self {
            run_id,
            stage: stage.to_owned(),
        }
    }
}

#[derive(Debug, Default)]
struct EngineState {
    executions: HashMap<RunId, ExecutionObject>,
    pods: HashMap<PodKey, Vec<LogEntry>>,
    followers: HashMap<PodKey, Vec<mpsc::UnboundedSender<Bytes>>>,
    unavailable: bool,
}

impl EngineState {
    fn locate(&self, workspace_id: &WorkspaceId, run_id: RunId) -> ProviderResult<&ExecutionObject> {
        self.executions
            .get(&run_id)
            .filter(|execution| selects_run(&execution.labels, workspace_id, run_id))
            .ok_or(ProviderError::RunNotFound(run_id))
    }

    fn locate_mut(
        &mut self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
    ) -> ProviderResult<&mut ExecutionObject> {
        self.executions
            .get_mut(&run_id)
            .filter(|execution| selects_run(&execution.labels, workspace_id, run_id))
            .ok_or(ProviderError::RunNotFound(run_id))
    }

    fn ensure_available(&self) -> ProviderResult<()> {
        if self.unavailable {
            return Err(ProviderError::unavailable(std::io::Error::other(
                "execution engine is not reachable",
            )));
        }
        Ok(())
    }

    fn close_followers(&mut self, run_id: RunId) {
        self.followers.retain(|pod, _| pod.run_id != run_id);
    }
}

/// Name of the pod holding a stage's output.
#[must_use]
pub fn pod_name(run_name: &str, stage: &str) -> String {
    format!("{run_name}-{stage}-pod")
}

/// Decrements the open stream counter when a log stream is dropped.
struct StreamGuard(Arc<AtomicUsize>);

impl StreamGuard {
    fn open(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn log_line(entry: &LogEntry) -> Bytes {
    Bytes::from(format!(
        "{} [{}] {}\n",
        entry.timestamp.to_rfc3339(),
        entry.task,
        entry.message
    ))
}

/// Simulated engine adapter.
pub struct InMemoryEngineProvider<C = DefaultClock>
where
    C: Clock + Send + Sync,
{
    state: Arc<RwLock<EngineState>>,
    open_streams: Arc<AtomicUsize>,
    catalog: Arc<TemplateCatalog>,
    engine: TemplateEngine,
    clock: Arc<C>,
}

impl<C> InMemoryEngineProvider<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty engine serving templates from `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<TemplateCatalog>, clock: Arc<C>) -> Self {
        Self {
            state: Arc::new(RwLock::new(EngineState::default())),
            open_streams: Arc::new(AtomicUsize::new(0)),
            catalog,
            engine: TemplateEngine::new(),
            clock,
        }
    }

    fn read(&self) -> ProviderResult<RwLockReadGuard<'_, EngineState>> {
        self.state
            .read()
            .map_err(|err| ProviderError::unavailable(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> ProviderResult<RwLockWriteGuard<'_, EngineState>> {
        self.state
            .write()
            .map_err(|err| ProviderError::unavailable(std::io::Error::other(err.to_string())))
    }

    /// Makes the engine reachable or unreachable.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::BackendUnavailable`] if the state lock is
    /// poisoned.
    pub fn set_available(&self, available: bool) -> ProviderResult<()> {
        self.write()?.unavailable = !available;
        Ok(())
    }

    /// Replaces the native condition of a run, as the engine controller
    /// would.
    ///
    /// Terminal conditions stamp the completion time and end live log
    /// streams of the run.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RunNotFound`] for unknown runs.
    pub fn set_condition(&self, run_id: RunId, condition: EngineCondition) -> ProviderResult<()> {
        let now = self.clock.utc();
        let mut state = self.write()?;
        let execution = state
            .executions
            .get_mut(&run_id)
            .ok_or(ProviderError::RunNotFound(run_id))?;
        execution.condition = Some(condition);
        let status = execution.status();
        if status != RunStatus::Pending && execution.started_at.is_none() {
            execution.started_at = Some(now);
        }
        if status.is_terminal() {
            execution.completed_at = Some(now);
            state.close_followers(run_id);
        }
        Ok(())
    }

    /// Replaces the reported state of one stage.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RunNotFound`] or
    /// [`ProviderError::StageNotFound`].
    pub fn set_stage_status(&self, run_id: RunId, stage: StageStatus) -> ProviderResult<()> {
        let mut state = self.write()?;
        let execution = state
            .executions
            .get_mut(&run_id)
            .ok_or(ProviderError::RunNotFound(run_id))?;
        let slot = execution
            .stages
            .iter_mut()
            .find(|existing| existing.name == stage.name)
            .ok_or_else(|| ProviderError::StageNotFound {
                run_id,
                stage: stage.name.clone(),
            })?;
        *slot = stage;
        Ok(())
    }

    /// Appends a line to the pod of `entry.stage`, creating the pod on first
    /// output, and forwards it to live followers.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RunNotFound`] for unknown runs.
    pub fn append_log(&self, run_id: RunId, entry: LogEntry) -> ProviderResult<()> {
        let mut state = self.write()?;
        let name = state
            .executions
            .get(&run_id)
            .map(|execution| execution.name.clone())
            .ok_or(ProviderError::RunNotFound(run_id))?;
        let pod = PodKey::new(run_id, &entry.stage);
        if let Some(followers) = state.followers.get_mut(&pod) {
            let line = log_line(&entry);
            followers.retain(|follower| follower.send(line.clone()).is_ok());
        }
        if !state.pods.contains_key(&pod) {
            debug!(run_id = %run_id, pod = %pod_name(&name, &entry.stage), "log pod created");
        }
        state.pods.entry(pod).or_default().push(entry);
        Ok(())
    }

    /// Returns the number of log streams not yet dropped.
    #[must_use]
    pub fn open_stream_count(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Returns the labels of a run's execution object.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::BackendUnavailable`] if the state lock is
    /// poisoned.
    pub fn execution_labels(&self, run_id: RunId) -> ProviderResult<Option<BTreeMap<String, String>>> {
        Ok(self
            .read()?
            .executions
            .get(&run_id)
            .map(|execution| execution.labels.clone()))
    }

    fn check_config(config: &PipelineConfig) -> ProviderResult<()> {
        config
            .validate()
            .map_err(|err| ProviderError::Validation(err.to_string()))
    }

    fn planned_stages(config: &PipelineConfig) -> Vec<StageStatus> {
        if !config.stages.is_empty() {
            return config
                .stages
                .iter()
                .map(|stage| StageStatus::pending(stage.name.clone()))
                .collect();
        }
        let mut stages = vec![StageStatus::pending("clone")];
        if config.build.is_some() {
            stages.push(StageStatus::pending("build"));
        }
        if config.deploy.is_some() {
            stages.push(StageStatus::pending("deploy"));
        }
        stages
    }
}

#[async_trait]
impl<C> PipelineProvider for InMemoryEngineProvider<C>
where
    C: Clock + Send + Sync + 'static,
{
    async fn run_pipeline(
        &self,
        run_id: RunId,
        config: &PipelineConfig,
    ) -> ProviderResult<RunHandle> {
        Self::check_config(config)?;
        let now = self.clock.utc();
        let mut state = self.write()?;
        state.ensure_available()?;
        if state.executions.contains_key(&run_id) {
            return Err(ProviderError::Validation(format!(
                "an execution labelled with run {run_id} already exists"
            )));
        }
        let name = run_name(&config.name, run_id);
        state.executions.insert(
            run_id,
            ExecutionObject {
                name: name.clone(),
                labels: run_labels(run_id, config),
                condition: None,
                created_at: now,
                started_at: None,
                completed_at: None,
                stages: Self::planned_stages(config),
            },
        );
        debug!(run_id = %run_id, run_name = %name, "execution object created");
        Ok(RunHandle {
            run_id,
            provider_run_name: name,
            started_at: now,
        })
    }

    async fn get_status(
        &self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
    ) -> ProviderResult<RunSnapshot> {
        let state = self.read()?;
        state.ensure_available()?;
        Ok(state.locate(workspace_id, run_id)?.snapshot(run_id))
    }

    async fn cancel_pipeline(
        &self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
    ) -> ProviderResult<()> {
        let now = self.clock.utc();
        let mut state = self.write()?;
        state.ensure_available()?;
        let execution = state.locate_mut(workspace_id, run_id)?;
        if execution.status().is_terminal() {
            return Ok(());
        }
        execution.condition = Some(EngineCondition::cancelled());
        execution.completed_at = Some(now);
        state.close_followers(run_id);
        Ok(())
    }

    async fn delete_pipeline(
        &self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
    ) -> ProviderResult<()> {
        let mut state = self.write()?;
        state.ensure_available()?;
        state.locate(workspace_id, run_id)?;
        state.executions.remove(&run_id);
        state.pods.retain(|pod, _| pod.run_id != run_id);
        state.close_followers(run_id);
        Ok(())
    }

    async fn list_pipelines(
        &self,
        workspace_id: &WorkspaceId,
        project_id: &ProjectId,
        limit: usize,
    ) -> ProviderResult<Vec<RunSnapshot>> {
        let state = self.read()?;
        state.ensure_available()?;
        let mut matching: Vec<(&RunId, &ExecutionObject)> = state
            .executions
            .iter()
            .filter(|(_, execution)| {
                label_is(&execution.labels, WORKSPACE_ID_LABEL, workspace_id.as_str())
                    && label_is(&execution.labels, PROJECT_ID_LABEL, project_id.as_str())
            })
            .collect();
        matching.sort_by(|(a_id, a), (b_id, b)| {
            b.created_at.cmp(&a.created_at).then_with(|| b_id.cmp(a_id))
        });
        Ok(matching
            .into_iter()
            .take(limit)
            .map(|(run_id, execution)| execution.snapshot(*run_id))
            .collect())
    }

    async fn get_logs(
        &self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
        stage: &str,
    ) -> ProviderResult<Vec<LogEntry>> {
        let state = self.read()?;
        state.ensure_available()?;
        state.locate(workspace_id, run_id)?;
        state
            .pods
            .get(&PodKey::new(run_id, stage))
            .cloned()
            .ok_or_else(|| ProviderError::StageNotFound {
                run_id,
                stage: stage.to_owned(),
            })
    }

    async fn stream_logs(
        &self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
        stage: &str,
    ) -> ProviderResult<LogStream> {
        let mut state = self.write()?;
        state.ensure_available()?;
        let execution = state.locate(workspace_id, run_id)?;
        let terminal = execution.status().is_terminal();
        let pod = PodKey::new(run_id, stage);
        let backlog: Vec<ProviderResult<Bytes>> = state
            .pods
            .get(&pod)
            .ok_or_else(|| ProviderError::StageNotFound {
                run_id,
                stage: stage.to_owned(),
            })?
            .iter()
            .map(|entry| Ok(log_line(entry)))
            .collect();

        let (sender, receiver) = mpsc::unbounded_channel();
        if !terminal {
            state.followers.entry(pod).or_default().push(sender);
        }
        let guard = StreamGuard::open(&self.open_streams);
        let live = stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
            let line = receiver.recv().await?;
            Some((Ok::<Bytes, ProviderError>(line), (receiver, guard)))
        });
        Ok(LogStream::new(stream::iter(backlog).chain(live)))
    }

    async fn validate_config(&self, config: &PipelineConfig) -> ProviderResult<()> {
        Self::check_config(config)
    }

    async fn get_templates(&self) -> ProviderResult<Vec<PipelineTemplate>> {
        Ok(self.catalog.for_provider(self.name()))
    }

    async fn create_from_template(
        &self,
        request: &TemplateRequest,
    ) -> ProviderResult<PipelineConfig> {
        let template = self
            .catalog
            .get(&request.template_id)
            .filter(|template| template.provider() == self.name())
            .ok_or_else(|| ProviderError::TemplateNotFound(request.template_id.clone()))?;
        self.engine
            .expand(template, request, &*self.clock)
            .map_err(|err| ProviderError::Validation(err.to_string()))
    }

    fn name(&self) -> ProviderType {
        ProviderType::Tekton
    }

    fn version(&self) -> String {
        ENGINE_VERSION.to_owned()
    }

    async fn is_healthy(&self) -> bool {
        self.read().is_ok_and(|state| !state.unavailable)
    }
}
