//! Provider factory backed by a registry of adapter constructors.

use crate::pipeline::domain::{ProviderSettings, ProviderType};
use crate::pipeline::ports::{PipelineProvider, ProviderError, ProviderFactory, ProviderResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type ProviderConstructor =
    Arc<dyn Fn(&ProviderSettings) -> ProviderResult<Arc<dyn PipelineProvider>> + Send + Sync>;

/// Factory that maps provider types to registered constructors.
///
/// Types recognised by [`ProviderType`] but never registered fail with
/// [`ProviderError::NotImplemented`].
#[derive(Clone, Default)]
pub struct RegistryProviderFactory {
    constructors: HashMap<ProviderType, ProviderConstructor>,
}

impl RegistryProviderFactory {
    /// Creates a factory with no registered adapters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the constructor used for `provider_type`, replacing any
    /// earlier registration.
    #[must_use]
    pub fn with_constructor<F>(mut self, provider_type: ProviderType, constructor: F) -> Self
    where
        F: Fn(&ProviderSettings) -> ProviderResult<Arc<dyn PipelineProvider>>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(provider_type, Arc::new(constructor));
        self
    }

    /// Registers a shared adapter instance returned for every request of
    /// its own provider type.
    #[must_use]
    pub fn with_shared(self, provider: Arc<dyn PipelineProvider>) -> Self {
        let provider_type = provider.name();
        self.with_constructor(provider_type, move |_| Ok(Arc::clone(&provider)))
    }

    /// Returns `true` when an adapter is registered for `provider_type`.
    #[must_use]
    pub fn is_registered(&self, provider_type: ProviderType) -> bool {
        self.constructors.contains_key(&provider_type)
    }
}

impl ProviderFactory for RegistryProviderFactory {
    fn create_provider(
        &self,
        provider_type: ProviderType,
        settings: &ProviderSettings,
    ) -> ProviderResult<Arc<dyn PipelineProvider>> {
        let constructor = self
            .constructors
            .get(&provider_type)
            .ok_or(ProviderError::NotImplemented(provider_type))?;
        constructor(settings)
    }
}

impl fmt::Debug for RegistryProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut registered: Vec<&str> = self.constructors.keys().map(|t| t.as_str()).collect();
        registered.sort_unstable();
        f.debug_struct("RegistryProviderFactory")
            .field("registered", &registered)
            .finish()
    }
}
