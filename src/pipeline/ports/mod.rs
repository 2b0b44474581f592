//! Port contracts for pipeline orchestration.
//!
//! Ports define infrastructure-agnostic interfaces used by pipeline services.

pub mod credentials;
pub mod log_stream;
pub mod provider;
pub mod repository;

pub use credentials::{CredentialError, CredentialResult, CredentialValidator};
pub use log_stream::LogStream;
pub use provider::{
    PipelineProvider, ProviderError, ProviderFactory, ProviderResult, TemplateRequest,
};
pub use repository::{PipelineRepository, PipelineRepositoryError, PipelineRepositoryResult};
