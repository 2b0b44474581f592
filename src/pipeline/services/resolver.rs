//! Per-process resolution of a workspace's provider adapter.

use super::error::{PipelineServiceError, PipelineServiceResult};
use crate::pipeline::domain::{ProviderConfigId, ProviderSettings, ProviderType, WorkspaceId};
use crate::pipeline::ports::{PipelineProvider, PipelineRepository, ProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[derive(Clone)]
struct CachedProvider {
    config_id: Option<ProviderConfigId>,
    provider: Arc<dyn PipelineProvider>,
}

/// Resolves and caches the provider adapter of each workspace.
///
/// Entries are tagged with the identity of the active configuration they
/// were built from. The active configuration is read on every resolution,
/// so a change made by another replica is picked up on the next call. The
/// cache holds nothing that cannot be rebuilt, and a poisoned lock is
/// recovered rather than reported.
pub struct ProviderResolver<R, F>
where
    R: PipelineRepository,
    F: ProviderFactory,
{
    repository: Arc<R>,
    factory: Arc<F>,
    default_provider: ProviderType,
    cache: RwLock<HashMap<WorkspaceId, CachedProvider>>,
}

impl<R, F> ProviderResolver<R, F>
where
    R: PipelineRepository,
    F: ProviderFactory,
{
    /// Creates a resolver falling back to `default_provider`.
    #[must_use]
    pub fn new(repository: Arc<R>, factory: Arc<F>, default_provider: ProviderType) -> Self {
        Self {
            repository,
            factory,
            default_provider,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the factory used to build adapters.
    #[must_use]
    pub const fn factory(&self) -> &Arc<F> {
        &self.factory
    }

    /// Returns the adapter for the workspace's active configuration.
    ///
    /// Workspaces without an active configuration get the default provider
    /// with empty settings.
    ///
    /// # Errors
    ///
    /// Returns repository errors from the configuration lookup and provider
    /// errors from the factory.
    pub async fn resolve(
        &self,
        workspace_id: &WorkspaceId,
    ) -> PipelineServiceResult<Arc<dyn PipelineProvider>> {
        let active = self.repository.get_provider_config(workspace_id).await?;
        let config_id = active.as_ref().map(|config| config.id());
        if let Some(provider) = self.cached(workspace_id, config_id) {
            return Ok(provider);
        }

        let (provider_type, settings) = active.map_or_else(
            || (self.default_provider, ProviderSettings::new()),
            |config| (config.provider_type(), config.settings().clone()),
        );
        let provider = self
            .factory
            .create_provider(provider_type, &settings)
            .map_err(|err| {
                PipelineServiceError::provider("resolve_provider", workspace_id.clone(), err)
            })?;
        debug!(
            workspace_id = %workspace_id,
            provider = provider_type.as_str(),
            "provider adapter built"
        );
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                workspace_id.clone(),
                CachedProvider {
                    config_id,
                    provider: Arc::clone(&provider),
                },
            );
        Ok(provider)
    }

    /// Discards the cached adapter of a workspace.
    pub fn invalidate(&self, workspace_id: &WorkspaceId) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(workspace_id);
    }

    fn cached(
        &self,
        workspace_id: &WorkspaceId,
        config_id: Option<ProviderConfigId>,
    ) -> Option<Arc<dyn PipelineProvider>> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache
            .get(workspace_id)
            .filter(|entry| entry.config_id == config_id)
            .map(|entry| Arc::clone(&entry.provider))
    }
}
