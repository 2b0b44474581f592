//! Credential validation port.

use crate::pipeline::domain::ErrorKind;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for credential lookups.
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Answers whether a secret exists; storage mechanics stay outside.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Returns `true` when `name` exists in `namespace`.
    async fn secret_exists(&self, namespace: &str, name: &str) -> CredentialResult<bool>;
}

/// Errors returned by credential validators.
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    /// The secret store could not be queried.
    #[error("secret store unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl CredentialError {
    /// Wraps a secret store failure.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::BackendUnavailable
    }
}
