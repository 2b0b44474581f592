//! Control plane configuration read from the environment.

use crate::pipeline::domain::ProviderType;
use crate::pipeline::services::{
    DEFAULT_LIST_LIMIT, DEFAULT_MAX_LOG_ENTRIES, DEFAULT_NAMESPACE, ServiceSettings,
};
use thiserror::Error;

/// Provider used when a workspace has no active configuration.
pub const DEFAULT_PROVIDER_VAR: &str = "PIPELINE_DEFAULT_PROVIDER";
/// Namespace used for credential checks when a config names none.
pub const DEFAULT_NAMESPACE_VAR: &str = "PIPELINE_DEFAULT_NAMESPACE";
/// Maximum runs returned by list operations.
pub const LIST_LIMIT_VAR: &str = "PIPELINE_LIST_LIMIT";
/// Bound on bulk log retrieval.
pub const MAX_LOG_ENTRIES_VAR: &str = "PIPELINE_MAX_LOG_ENTRIES";
/// Default tracing filter directive.
pub const LOG_FILTER_VAR: &str = "PIPELINE_LOG_FILTER";
/// `PostgreSQL` connection URL.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Errors raised while reading configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The variable names an unknown provider type.
    #[error("{variable} names unknown provider '{value}'")]
    UnknownProvider {
        /// Variable name.
        variable: &'static str,
        /// Rejected value.
        value: String,
    },

    /// The variable is not a positive integer.
    #[error("{variable} must be a positive integer, got '{value}'")]
    InvalidLimit {
        /// Variable name.
        variable: &'static str,
        /// Rejected value.
        value: String,
    },

    /// The variable is set but blank.
    #[error("{0} must not be blank")]
    Blank(&'static str),
}

/// Control plane configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPlaneConfig {
    /// Provider used when a workspace has no active configuration.
    pub default_provider: ProviderType,
    /// Namespace used for credential checks when a config names none.
    pub default_namespace: String,
    /// Maximum runs returned by list operations.
    pub list_limit: usize,
    /// Bound on bulk log retrieval.
    pub max_log_entries: usize,
    /// Default tracing filter directive, overridden by `RUST_LOG`.
    pub log_filter: String,
    /// `PostgreSQL` connection URL, when persistence is database-backed.
    pub database_url: Option<String>,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            default_provider: ProviderType::Tekton,
            default_namespace: DEFAULT_NAMESPACE.to_owned(),
            list_limit: DEFAULT_LIST_LIMIT,
            max_log_entries: DEFAULT_MAX_LOG_ENTRIES,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            database_url: None,
        }
    }
}

impl ControlPlaneConfig {
    /// Reads configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first invalid variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, using defaults for unset
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first invalid variable.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let default_provider = match lookup(DEFAULT_PROVIDER_VAR) {
            Some(value) => ProviderType::try_from(value.trim()).map_err(|_| {
                ConfigError::UnknownProvider {
                    variable: DEFAULT_PROVIDER_VAR,
                    value,
                }
            })?,
            None => defaults.default_provider,
        };
        let default_namespace =
            non_blank(DEFAULT_NAMESPACE_VAR, lookup(DEFAULT_NAMESPACE_VAR))?
                .unwrap_or(defaults.default_namespace);
        let list_limit = parse_limit(LIST_LIMIT_VAR, lookup(LIST_LIMIT_VAR))?
            .unwrap_or(defaults.list_limit);
        let max_log_entries = parse_limit(MAX_LOG_ENTRIES_VAR, lookup(MAX_LOG_ENTRIES_VAR))?
            .unwrap_or(defaults.max_log_entries);
        let log_filter =
            non_blank(LOG_FILTER_VAR, lookup(LOG_FILTER_VAR))?.unwrap_or(defaults.log_filter);
        let database_url = non_blank(DATABASE_URL_VAR, lookup(DATABASE_URL_VAR))?;

        Ok(Self {
            default_provider,
            default_namespace,
            list_limit,
            max_log_entries,
            log_filter,
            database_url,
        })
    }

    /// Returns the settings consumed by the pipeline services.
    #[must_use]
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            default_provider: self.default_provider,
            default_namespace: self.default_namespace.clone(),
            list_limit: self.list_limit,
            max_log_entries: self.max_log_entries,
        }
    }
}

fn non_blank(variable: &'static str, value: Option<String>) -> Result<Option<String>, ConfigError> {
    match value {
        Some(raw) if raw.trim().is_empty() => Err(ConfigError::Blank(variable)),
        Some(raw) => Ok(Some(raw.trim().to_owned())),
        None => Ok(None),
    }
}

fn parse_limit(variable: &'static str, value: Option<String>) -> Result<Option<usize>, ConfigError> {
    let Some(raw) = value else {
        return Ok(None);
    };
    match raw.trim().parse::<usize>() {
        Ok(limit) if limit > 0 => Ok(Some(limit)),
        _ => Err(ConfigError::InvalidLimit {
            variable,
            value: raw,
        }),
    }
}
