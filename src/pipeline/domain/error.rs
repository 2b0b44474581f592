//! Error types for pipeline domain validation and parsing.

use super::{RunId, RunStatus};
use thiserror::Error;

/// Coarse classification shared by every pipeline error.
///
/// Callers use the kind to tell a bad request from a missing record or an
/// unreachable backend without matching on concrete error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request was malformed or incomplete.
    Validation,
    /// A run, pipeline, template, or secret does not exist.
    NotFound,
    /// The provider type is not recognised.
    UnsupportedProvider,
    /// The provider type is recognised but has no adapter yet.
    NotImplemented,
    /// The execution engine could not be reached or rejected the request.
    BackendUnavailable,
    /// Persisted data could not be decoded.
    CorruptState,
    /// Any other infrastructure failure.
    Internal,
}

impl ErrorKind {
    /// Returns `true` when the caller may retry the same request.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::BackendUnavailable)
    }

    /// Returns `true` when the failure was caused by the request itself.
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        matches!(self, Self::Validation | Self::NotFound)
    }

    /// Returns the canonical label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::UnsupportedProvider => "unsupported_provider",
            Self::NotImplemented => "not_implemented",
            Self::BackendUnavailable => "backend_unavailable",
            Self::CorruptState => "corrupt_state",
            Self::Internal => "internal",
        }
    }
}

/// Errors returned while constructing or mutating pipeline domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineDomainError {
    /// A required field is missing or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// An identifier value is blank or malformed.
    #[error("invalid {kind} identifier '{value}'")]
    InvalidIdentifier {
        /// Identifier kind, such as `workspace`.
        kind: &'static str,
        /// Rejected raw value.
        value: String,
    },

    /// The run cannot move between the given states.
    #[error("pipeline run {run_id} cannot transition from {from} to {to}")]
    InvalidStatusTransition {
        /// Run identifier.
        run_id: RunId,
        /// Current state.
        from: RunStatus,
        /// Requested state.
        to: RunStatus,
    },

    /// A template is structurally invalid.
    #[error("invalid template '{template}': {reason}")]
    InvalidTemplate {
        /// Template identifier.
        template: String,
        /// Validation failure.
        reason: String,
    },
}

impl PipelineDomainError {
    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Error returned while parsing run states from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown pipeline run status: {0}")]
pub struct ParseRunStatusError(pub String);

/// Error returned while parsing provider type identifiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported provider type: {0}")]
pub struct ParseProviderTypeError(pub String);
