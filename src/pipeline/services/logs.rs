//! Bulk and streaming access to execution output.

use super::error::{PipelineServiceError, PipelineServiceResult};
use super::resolver::ProviderResolver;
use crate::pipeline::domain::{LogEntry, RunId, WorkspaceId};
use crate::pipeline::ports::{LogStream, PipelineRepository, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Log access service.
///
/// Streams are passed through from the provider untouched; nothing is
/// buffered or stored here.
pub struct LogAccessService<R, F>
where
    R: PipelineRepository,
    F: ProviderFactory,
{
    repository: Arc<R>,
    resolver: Arc<ProviderResolver<R, F>>,
    max_entries: usize,
}

impl<R, F> LogAccessService<R, F>
where
    R: PipelineRepository,
    F: ProviderFactory,
{
    /// Creates a log service returning at most `max_entries` lines per bulk
    /// read.
    #[must_use]
    pub const fn new(
        repository: Arc<R>,
        resolver: Arc<ProviderResolver<R, F>>,
        max_entries: usize,
    ) -> Self {
        Self {
            repository,
            resolver,
            max_entries,
        }
    }

    /// Returns the most recent output lines of one stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::RunNotFound`] when the workspace has
    /// no such run, and provider errors when the stage has no log source.
    pub async fn get_logs(
        &self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
        stage: &str,
    ) -> PipelineServiceResult<Vec<LogEntry>> {
        self.ensure_run(workspace_id, run_id).await?;
        let provider = self.resolver.resolve(workspace_id).await?;
        let mut entries = provider
            .get_logs(workspace_id, run_id, stage)
            .await
            .map_err(|err| PipelineServiceError::provider("get_logs", workspace_id.clone(), err))?;
        let excess = entries.len().saturating_sub(self.max_entries);
        if excess > 0 {
            debug!(run_id = %run_id, stage, dropped = excess, "log read truncated");
            entries.drain(..excess);
        }
        Ok(entries)
    }

    /// Opens a live stream of one stage's output.
    ///
    /// The caller owns the stream and releases the engine connection by
    /// dropping it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineServiceError::RunNotFound`] when the workspace has
    /// no such run, and provider errors when the stage has no log source.
    pub async fn stream_logs(
        &self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
        stage: &str,
    ) -> PipelineServiceResult<LogStream> {
        self.ensure_run(workspace_id, run_id).await?;
        let provider = self.resolver.resolve(workspace_id).await?;
        provider
            .stream_logs(workspace_id, run_id, stage)
            .await
            .map_err(|err| PipelineServiceError::provider("stream_logs", workspace_id.clone(), err))
    }

    /// Opens a live stream that ends when `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::stream_logs`].
    pub async fn stream_logs_until<S>(
        &self,
        workspace_id: &WorkspaceId,
        run_id: RunId,
        stage: &str,
        shutdown: S,
    ) -> PipelineServiceResult<LogStream>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let stream = self.stream_logs(workspace_id, run_id, stage).await?;
        Ok(stream.until(shutdown))
    }

    async fn ensure_run(&self, workspace_id: &WorkspaceId, run_id: RunId) -> PipelineServiceResult<()> {
        let key = run_id.to_string();
        self.repository
            .get_pipeline_run(&key)
            .await?
            .filter(|run| run.workspace_id() == workspace_id)
            .map(|_| ())
            .ok_or(PipelineServiceError::RunNotFound(key))
    }
}
