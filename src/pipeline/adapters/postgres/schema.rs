//! Diesel schema for pipeline persistence.

diesel::table! {
    /// Pipeline definitions.
    pipelines (id) {
        /// Internal pipeline identifier.
        id -> Uuid,
        /// Owning workspace.
        #[max_length = 255]
        workspace_id -> Varchar,
        /// Owning project.
        #[max_length = 255]
        project_id -> Varchar,
        /// Pipeline name, unique per workspace and project.
        #[max_length = 255]
        name -> Varchar,
        /// Provider type identifier.
        #[max_length = 50]
        provider -> Varchar,
        /// Last submitted configuration as JSONB.
        config -> Jsonb,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Pipeline run records.
    pipeline_runs (id) {
        /// Platform run identifier.
        id -> Uuid,
        /// Parent pipeline.
        pipeline_id -> Uuid,
        /// Backend run name, unique when present.
        #[max_length = 255]
        provider_run_name -> Nullable<Varchar>,
        /// Owning workspace.
        #[max_length = 255]
        workspace_id -> Varchar,
        /// Owning project.
        #[max_length = 255]
        project_id -> Varchar,
        /// Run name.
        #[max_length = 255]
        name -> Varchar,
        /// Run state (`pending`, `running`, `succeeded`, `failed`, `cancelled`).
        #[max_length = 50]
        status -> Varchar,
        /// Start timestamp.
        started_at -> Timestamptz,
        /// Completion timestamp.
        finished_at -> Nullable<Timestamptz>,
        /// Stage states as JSONB.
        stages -> Jsonb,
        /// Free-form metadata as JSONB.
        metadata -> Jsonb,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Stored pipeline templates.
    pipeline_templates (id) {
        /// Template identifier.
        #[max_length = 255]
        id -> Varchar,
        /// Display name.
        #[max_length = 255]
        name -> Varchar,
        /// Description.
        description -> Text,
        /// Provider type identifier.
        #[max_length = 50]
        provider -> Varchar,
        /// Stage templates as JSONB.
        stages -> Jsonb,
        /// Parameter definitions as JSONB.
        parameters -> Jsonb,
        /// Field bindings as JSONB.
        bindings -> Jsonb,
        /// Provenance as JSONB.
        provenance -> Jsonb,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Per-workspace provider configuration history.
    workspace_provider_configs (id) {
        /// Configuration identifier.
        id -> Uuid,
        /// Owning workspace.
        #[max_length = 255]
        workspace_id -> Varchar,
        /// Provider type identifier.
        #[max_length = 50]
        provider_type -> Varchar,
        /// Opaque provider settings as JSONB.
        config -> Jsonb,
        /// Whether this row is the workspace's active configuration.
        is_active -> Bool,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}
