//! Tunables shared by the pipeline services.

use crate::pipeline::domain::ProviderType;

/// Default number of runs returned by list operations.
pub const DEFAULT_LIST_LIMIT: usize = 50;
/// Default bound on bulk log retrieval.
pub const DEFAULT_MAX_LOG_ENTRIES: usize = 1000;
/// Namespace searched for secrets when a config names none.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Settings applied by the orchestration and log services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Provider used for workspaces without an active configuration.
    pub default_provider: ProviderType,
    /// Namespace used for credential checks when a config names none.
    pub default_namespace: String,
    /// Upper bound on runs returned by list operations.
    pub list_limit: usize,
    /// Upper bound on entries returned by bulk log retrieval.
    pub max_log_entries: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            default_provider: ProviderType::Tekton,
            default_namespace: DEFAULT_NAMESPACE.to_owned(),
            list_limit: DEFAULT_LIST_LIMIT,
            max_log_entries: DEFAULT_MAX_LOG_ENTRIES,
        }
    }
}
