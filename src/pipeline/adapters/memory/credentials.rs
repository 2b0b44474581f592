//! In-memory secret registry for credential validation.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::pipeline::ports::{CredentialError, CredentialResult, CredentialValidator};

/// Secret names keyed by namespace.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    secrets: Arc<RwLock<HashSet<(String, String)>>>,
}

impl InMemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a secret.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Unavailable`] when lock acquisition fails.
    pub fn add_secret(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> CredentialResult<()> {
        let mut secrets = self
            .secrets
            .write()
            .map_err(|err| CredentialError::unavailable(std::io::Error::other(err.to_string())))?;
        secrets.insert((namespace.into(), name.into()));
        Ok(())
    }
}

#[async_trait]
impl CredentialValidator for InMemoryCredentialStore {
    async fn secret_exists(&self, namespace: &str, name: &str) -> CredentialResult<bool> {
        let secrets = self
            .secrets
            .read()
            .map_err(|err| CredentialError::unavailable(std::io::Error::other(err.to_string())))?;
        Ok(secrets.contains(&(namespace.to_owned(), name.to_owned())))
    }
}
