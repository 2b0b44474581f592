//! Errors surfaced by the pipeline services.

use super::template_engine::TemplateError;
use crate::pipeline::domain::{ErrorKind, PipelineDomainError, PipelineId, TemplateId, WorkspaceId};
use crate::pipeline::ports::{CredentialError, PipelineRepositoryError, ProviderError};
use thiserror::Error;
use tracing::error;

/// Message shown to callers instead of internal failure details.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal error";

/// Service-level errors for pipeline orchestration, templates, and logs.
#[derive(Debug, Clone, Error)]
pub enum PipelineServiceError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] PipelineDomainError),

    /// Template validation or expansion failed.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] PipelineRepositoryError),

    /// The secret store could not be queried.
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    /// A provider call failed.
    #[error("{operation} failed for workspace {workspace_id}: {source}")]
    Provider {
        /// Service operation that issued the call.
        operation: &'static str,
        /// Workspace the call was made for.
        workspace_id: WorkspaceId,
        /// Provider error, kind preserved.
        #[source]
        source: ProviderError,
    },

    /// A secret referenced by the config does not exist.
    #[error("{label} secret '{name}' does not exist in namespace '{namespace}'")]
    MissingSecret {
        /// What the config uses the secret for.
        label: &'static str,
        /// Secret name.
        name: String,
        /// Namespace searched.
        namespace: String,
    },

    /// No run matches the key in the workspace.
    #[error("pipeline run {0} not found")]
    RunNotFound(String),

    /// No pipeline matches the identifier in the workspace.
    #[error("pipeline {0} not found")]
    PipelineNotFound(PipelineId),

    /// No stored, built-in, or provider template has the identifier.
    #[error("template {0} not found")]
    TemplateNotFound(TemplateId),

    /// Built-in templates are read-only.
    #[error("template {0} is built in and cannot be modified")]
    BuiltInTemplate(TemplateId),
}

impl PipelineServiceError {
    /// Wraps a provider error with the operation and workspace it came from.
    #[must_use]
    pub const fn provider(
        operation: &'static str,
        workspace_id: WorkspaceId,
        source: ProviderError,
    ) -> Self {
        Self::Provider {
            operation,
            workspace_id,
            source,
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(_)
            | Self::MissingSecret { .. }
            | Self::BuiltInTemplate(_) => ErrorKind::Validation,
            Self::Template(err) => err.kind(),
            Self::Repository(err) => err.kind(),
            Self::Credentials(err) => err.kind(),
            Self::Provider { source, .. } => source.kind(),
            Self::RunNotFound(_) | Self::PipelineNotFound(_) | Self::TemplateNotFound(_) => {
                ErrorKind::NotFound
            }
        }
    }

    /// Returns the message safe to show to a caller.
    ///
    /// Corrupt records and infrastructure failures are reported generically;
    /// their detail goes to the log at `error` level instead.
    #[must_use]
    pub fn public_message(&self) -> String {
        let kind = self.kind();
        match kind {
            ErrorKind::CorruptState | ErrorKind::Internal => {
                error!(kind = kind.as_str(), error = %self, "internal failure hidden from caller");
                INTERNAL_ERROR_MESSAGE.to_owned()
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for pipeline service operations.
pub type PipelineServiceResult<T> = Result<T, PipelineServiceError>;
