//! `PostgreSQL` adapter for pipeline persistence.

mod models;
mod repository;
mod schema;

pub use repository::{PipelinePgPool, PostgresPipelineRepository};
