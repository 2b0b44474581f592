//! Diesel row models for pipeline persistence.

use super::schema::{pipeline_runs, pipeline_templates, pipelines, workspace_provider_configs};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for pipelines.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = pipelines)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PipelineRow {
    /// Internal pipeline identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
    /// Owning workspace.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub workspace_id: String,
    /// Owning project.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub project_id: String,
    /// Pipeline name.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub name: String,
    /// Provider type identifier.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub provider: String,
    /// Configuration payload.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub config: Value,
    /// Creation timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub updated_at: DateTime<Utc>,
}

/// Insert model for pipelines.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pipelines)]
pub struct NewPipelineRow {
    /// Internal pipeline identifier.
    pub id: uuid::Uuid,
    /// Owning workspace.
    pub workspace_id: String,
    /// Owning project.
    pub project_id: String,
    /// Pipeline name.
    pub name: String,
    /// Provider type identifier.
    pub provider: String,
    /// Configuration payload.
    pub config: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for pipeline runs.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = pipeline_runs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PipelineRunRow {
    /// Platform run identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
    /// Parent pipeline.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub pipeline_id: uuid::Uuid,
    /// Backend run name.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Varchar>)]
    pub provider_run_name: Option<String>,
    /// Owning workspace.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub workspace_id: String,
    /// Owning project.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub project_id: String,
    /// Run name.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub name: String,
    /// Run state.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub status: String,
    /// Start timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub started_at: DateTime<Utc>,
    /// Completion timestamp.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Stage states payload.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub stages: Value,
    /// Metadata payload.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub metadata: Value,
    /// Creation timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub updated_at: DateTime<Utc>,
}

/// Insert model for pipeline runs.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pipeline_runs)]
pub struct NewPipelineRunRow {
    /// Platform run identifier.
    pub id: uuid::Uuid,
    /// Parent pipeline.
    pub pipeline_id: uuid::Uuid,
    /// Backend run name.
    pub provider_run_name: Option<String>,
    /// Owning workspace.
    pub workspace_id: String,
    /// Owning project.
    pub project_id: String,
    /// Run name.
    pub name: String,
    /// Run state.
    pub status: String,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// Completion timestamp.
    pub finished_at: Option<DateTime<Utc>>,
    /// Stage states payload.
    pub stages: Value,
    /// Metadata payload.
    pub metadata: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for stored templates.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = pipeline_templates)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TemplateRow {
    /// Template identifier.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub id: String,
    /// Display name.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub name: String,
    /// Description.
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub description: String,
    /// Provider type identifier.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub provider: String,
    /// Stage templates payload.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub stages: Value,
    /// Parameter definitions payload.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub parameters: Value,
    /// Bindings payload.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub bindings: Value,
    /// Provenance payload.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub provenance: Value,
    /// Creation timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub updated_at: DateTime<Utc>,
}

/// Insert model for stored templates.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pipeline_templates)]
pub struct NewTemplateRow {
    /// Template identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Provider type identifier.
    pub provider: String,
    /// Stage templates payload.
    pub stages: Value,
    /// Parameter definitions payload.
    pub parameters: Value,
    /// Bindings payload.
    pub bindings: Value,
    /// Provenance payload.
    pub provenance: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for workspace provider configurations.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = workspace_provider_configs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProviderConfigRow {
    /// Configuration identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
    /// Owning workspace.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub workspace_id: String,
    /// Provider type identifier.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub provider_type: String,
    /// Settings payload.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub config: Value,
    /// Active flag.
    #[diesel(sql_type = diesel::sql_types::Bool)]
    pub is_active: bool,
    /// Creation timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub updated_at: DateTime<Utc>,
}

/// Insert model for workspace provider configurations.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = workspace_provider_configs)]
pub struct NewProviderConfigRow {
    /// Configuration identifier.
    pub id: uuid::Uuid,
    /// Owning workspace.
    pub workspace_id: String,
    /// Provider type identifier.
    pub provider_type: String,
    /// Settings payload.
    pub config: Value,
    /// Active flag.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
