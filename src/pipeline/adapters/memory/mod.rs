//! In-memory adapters for pipeline persistence and credential lookups.

mod credentials;
mod repository;

pub use credentials::InMemoryCredentialStore;
pub use repository::InMemoryPipelineRepository;
