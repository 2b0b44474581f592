//! `PostgreSQL` repository implementation for pipeline storage.

use super::{
    models::{
        NewPipelineRow, NewPipelineRunRow, NewProviderConfigRow, NewTemplateRow, PipelineRow,
        PipelineRunRow, ProviderConfigRow, TemplateRow,
    },
    schema::{pipeline_runs, pipeline_templates, pipelines, workspace_provider_configs},
};
use crate::pipeline::{
    domain::{
        PersistedPipelineData, PersistedProviderConfigData, PersistedRunData,
        PersistedTemplateData, Pipeline, PipelineConfig, PipelineId, PipelineRun,
        PipelineTemplate, ProjectId, ProviderConfigId, ProviderType, RunId, RunStatus,
        TemplateDefinition, TemplateId, WorkspaceId, WorkspaceProviderConfig,
    },
    ports::{PipelineRepository, PipelineRepositoryError, PipelineRepositoryResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::Text;
use tracing::error;

/// `PostgreSQL` connection pool type used by pipeline adapters.
pub type PipelinePgPool = Pool<ConnectionManager<PgConnection>>;

const PROVIDER_RUN_NAME_INDEX: &str = "idx_pipeline_runs_provider_run_name";

/// `PostgreSQL`-backed pipeline repository.
///
/// Diesel calls run on the blocking pool. Status updates and provider
/// config activation are conditional or transactional in SQL, so several
/// service replicas may share one database.
///
/// # Example
///
/// ```ignore
/// use diesel::r2d2::{ConnectionManager, Pool};
/// use diesel::PgConnection;
/// use pipeline_control::pipeline::adapters::postgres::PostgresPipelineRepository;
///
/// let manager = ConnectionManager::<PgConnection>::new("postgres://...");
/// let pool = Pool::builder().build(manager).expect("pool");
/// let repo = PostgresPipelineRepository::new(pool);
/// ```
#[derive(Debug, Clone)]
pub struct PostgresPipelineRepository {
    pool: PipelinePgPool,
}

impl PostgresPipelineRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: PipelinePgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> PipelineRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> PipelineRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(PipelineRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(PipelineRepositoryError::persistence)?
    }
}

#[async_trait]
impl PipelineRepository for PostgresPipelineRepository {
    async fn create_pipeline(&self, pipeline: &Pipeline) -> PipelineRepositoryResult<()> {
        let new_row = to_new_pipeline_row(pipeline)?;
        let workspace_id = pipeline.workspace_id().clone();
        let name = pipeline.name().to_owned();

        self.run_blocking(move |connection| {
            diesel::insert_into(pipelines::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        PipelineRepositoryError::DuplicatePipeline {
                            workspace_id: workspace_id.clone(),
                            name: name.clone(),
                        }
                    }
                    _ => PipelineRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update_pipeline(&self, pipeline: &Pipeline) -> PipelineRepositoryResult<()> {
        let pipeline_id = pipeline.id();
        let row = to_new_pipeline_row(pipeline)?;

        self.run_blocking(move |connection| {
            let updated_count =
                diesel::update(pipelines::table.filter(pipelines::id.eq(pipeline_id.into_inner())))
                    .set((
                        pipelines::provider.eq(&row.provider),
                        pipelines::config.eq(&row.config),
                        pipelines::updated_at.eq(row.updated_at),
                    ))
                    .execute(connection)
                    .map_err(PipelineRepositoryError::persistence)?;
            if updated_count == 0 {
                return Err(PipelineRepositoryError::PipelineNotFound(pipeline_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_pipeline(&self, id: PipelineId) -> PipelineRepositoryResult<Option<Pipeline>> {
        self.run_blocking(move |connection| {
            let row = pipelines::table
                .filter(pipelines::id.eq(id.into_inner()))
                .select(PipelineRow::as_select())
                .first::<PipelineRow>(connection)
                .optional()
                .map_err(PipelineRepositoryError::persistence)?;
            row.map(row_to_pipeline).transpose()
        })
        .await
    }

    async fn find_pipeline_by_name(
        &self,
        workspace_id: &WorkspaceId,
        project_id: &ProjectId,
        name: &str,
    ) -> PipelineRepositoryResult<Option<Pipeline>> {
        let workspace = workspace_id.as_str().to_owned();
        let project = project_id.as_str().to_owned();
        let pipeline_name = name.to_owned();
        self.run_blocking(move |connection| {
            let row = pipelines::table
                .filter(pipelines::workspace_id.eq(&workspace))
                .filter(pipelines::project_id.eq(&project))
                .filter(pipelines::name.eq(&pipeline_name))
                .select(PipelineRow::as_select())
                .first::<PipelineRow>(connection)
                .optional()
                .map_err(PipelineRepositoryError::persistence)?;
            row.map(row_to_pipeline).transpose()
        })
        .await
    }

    async fn list_pipelines(
        &self,
        workspace_id: &WorkspaceId,
        project_id: &ProjectId,
    ) -> PipelineRepositoryResult<Vec<Pipeline>> {
        let workspace = workspace_id.as_str().to_owned();
        let project = project_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let rows = pipelines::table
                .filter(pipelines::workspace_id.eq(&workspace))
                .filter(pipelines::project_id.eq(&project))
                .order(pipelines::created_at.desc())
                .select(PipelineRow::as_select())
                .load::<PipelineRow>(connection)
                .map_err(PipelineRepositoryError::persistence)?;
            rows.into_iter().map(row_to_pipeline).collect()
        })
        .await
    }

    async fn delete_pipeline(&self, id: PipelineId) -> PipelineRepositoryResult<()> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, PipelineRepositoryError, _>(|tx| {
                diesel::delete(
                    pipeline_runs::table.filter(pipeline_runs::pipeline_id.eq(id.into_inner())),
                )
                .execute(tx)
                .map_err(PipelineRepositoryError::persistence)?;
                let deleted = diesel::delete(pipelines::table.filter(pipelines::id.eq(id.into_inner())))
                    .execute(tx)
                    .map_err(PipelineRepositoryError::persistence)?;
                if deleted == 0 {
                    return Err(PipelineRepositoryError::PipelineNotFound(id));
                }
                Ok(())
            })
        })
        .await
    }

    async fn create_pipeline_run(&self, run: &PipelineRun) -> PipelineRepositoryResult<()> {
        let run_id = run.id();
        let run_name = run.provider_run_name().map(str::to_owned);
        let new_row = to_new_run_row(run)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(pipeline_runs::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| map_run_write_error(err, run_id, run_name.as_deref()))?;
            Ok(())
        })
        .await
    }

    async fn update_pipeline_run(&self, run: &PipelineRun) -> PipelineRepositoryResult<PipelineRun> {
        let run_id = run.id();
        let run_name = run.provider_run_name().map(str::to_owned);
        let row = to_new_run_row(run)?;
        let writable_from = writable_predecessors(run.status());
        let written = run.clone();

        self.run_blocking(move |connection| {
            let updated_count = diesel::update(
                pipeline_runs::table
                    .filter(pipeline_runs::id.eq(run_id.into_inner()))
                    .filter(pipeline_runs::status.eq_any(writable_from)),
            )
            .set((
                pipeline_runs::provider_run_name.eq(&row.provider_run_name),
                pipeline_runs::status.eq(&row.status),
                pipeline_runs::started_at.eq(row.started_at),
                pipeline_runs::finished_at.eq(row.finished_at),
                pipeline_runs::stages.eq(&row.stages),
                pipeline_runs::metadata.eq(&row.metadata),
                pipeline_runs::updated_at.eq(row.updated_at),
            ))
            .execute(connection)
            .map_err(|err| map_run_write_error(err, run_id, run_name.as_deref()))?;
            if updated_count > 0 {
                return Ok(written);
            }

            let stored = pipeline_runs::table
                .filter(pipeline_runs::id.eq(run_id.into_inner()))
                .select(PipelineRunRow::as_select())
                .first::<PipelineRunRow>(connection)
                .optional()
                .map_err(PipelineRepositoryError::persistence)?
                .ok_or(PipelineRepositoryError::RunNotFound(run_id))?;
            row_to_run(stored)
        })
        .await
    }

    async fn get_pipeline_run(&self, key: &str) -> PipelineRepositoryResult<Option<PipelineRun>> {
        let parsed_id = RunId::parse(key);
        let run_name = key.to_owned();
        self.run_blocking(move |connection| {
            if let Some(id) = parsed_id {
                let by_id = pipeline_runs::table
                    .filter(pipeline_runs::id.eq(id.into_inner()))
                    .select(PipelineRunRow::as_select())
                    .first::<PipelineRunRow>(connection)
                    .optional()
                    .map_err(PipelineRepositoryError::persistence)?;
                if let Some(row) = by_id {
                    return row_to_run(row).map(Some);
                }
            }
            let by_name = pipeline_runs::table
                .filter(pipeline_runs::provider_run_name.eq(&run_name))
                .select(PipelineRunRow::as_select())
                .first::<PipelineRunRow>(connection)
                .optional()
                .map_err(PipelineRepositoryError::persistence)?;
            by_name.map(row_to_run).transpose()
        })
        .await
    }

    async fn list_pipeline_runs(
        &self,
        workspace_id: &WorkspaceId,
        project_id: &ProjectId,
        limit: usize,
    ) -> PipelineRepositoryResult<Vec<PipelineRun>> {
        let workspace = workspace_id.as_str().to_owned();
        let project = project_id.as_str().to_owned();
        let row_limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run_blocking(move |connection| {
            let rows = pipeline_runs::table
                .filter(pipeline_runs::workspace_id.eq(&workspace))
                .filter(pipeline_runs::project_id.eq(&project))
                .order((pipeline_runs::started_at.desc(), pipeline_runs::id.desc()))
                .limit(row_limit)
                .select(PipelineRunRow::as_select())
                .load::<PipelineRunRow>(connection)
                .map_err(PipelineRepositoryError::persistence)?;
            rows.into_iter().map(row_to_run).collect()
        })
        .await
    }

    async fn list_runs_for_pipeline(
        &self,
        pipeline_id: PipelineId,
    ) -> PipelineRepositoryResult<Vec<PipelineRun>> {
        self.run_blocking(move |connection| {
            let rows = pipeline_runs::table
                .filter(pipeline_runs::pipeline_id.eq(pipeline_id.into_inner()))
                .order((pipeline_runs::started_at.desc(), pipeline_runs::id.desc()))
                .select(PipelineRunRow::as_select())
                .load::<PipelineRunRow>(connection)
                .map_err(PipelineRepositoryError::persistence)?;
            rows.into_iter().map(row_to_run).collect()
        })
        .await
    }

    async fn delete_pipeline_run(&self, id: RunId) -> PipelineRepositoryResult<()> {
        self.run_blocking(move |connection| {
            let deleted =
                diesel::delete(pipeline_runs::table.filter(pipeline_runs::id.eq(id.into_inner())))
                    .execute(connection)
                    .map_err(PipelineRepositoryError::persistence)?;
            if deleted == 0 {
                return Err(PipelineRepositoryError::RunNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn create_template(&self, template: &PipelineTemplate) -> PipelineRepositoryResult<()> {
        let template_id = template.id().clone();
        let new_row = to_new_template_row(template)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(pipeline_templates::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        PipelineRepositoryError::DuplicateTemplate(template_id.clone())
                    }
                    _ => PipelineRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update_template(&self, template: &PipelineTemplate) -> PipelineRepositoryResult<()> {
        let template_id = template.id().clone();
        let row = to_new_template_row(template)?;

        self.run_blocking(move |connection| {
            let updated_count = diesel::update(
                pipeline_templates::table.filter(pipeline_templates::id.eq(&row.id)),
            )
            .set((
                pipeline_templates::name.eq(&row.name),
                pipeline_templates::description.eq(&row.description),
                pipeline_templates::provider.eq(&row.provider),
                pipeline_templates::stages.eq(&row.stages),
                pipeline_templates::parameters.eq(&row.parameters),
                pipeline_templates::bindings.eq(&row.bindings),
                pipeline_templates::provenance.eq(&row.provenance),
                pipeline_templates::updated_at.eq(row.updated_at),
            ))
            .execute(connection)
            .map_err(PipelineRepositoryError::persistence)?;
            if updated_count == 0 {
                return Err(PipelineRepositoryError::TemplateNotFound(template_id));
            }
            Ok(())
        })
        .await
    }

    async fn get_template(
        &self,
        id: &TemplateId,
    ) -> PipelineRepositoryResult<Option<PipelineTemplate>> {
        let template_id = id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = pipeline_templates::table
                .filter(pipeline_templates::id.eq(&template_id))
                .select(TemplateRow::as_select())
                .first::<TemplateRow>(connection)
                .optional()
                .map_err(PipelineRepositoryError::persistence)?;
            row.map(row_to_template).transpose()
        })
        .await
    }

    async fn list_templates(
        &self,
        provider: Option<ProviderType>,
    ) -> PipelineRepositoryResult<Vec<PipelineTemplate>> {
        self.run_blocking(move |connection| {
            let mut query = pipeline_templates::table
                .order(pipeline_templates::id.asc())
                .select(TemplateRow::as_select())
                .into_boxed();
            if let Some(wanted) = provider {
                query = query.filter(pipeline_templates::provider.eq(wanted.as_str()));
            }
            let rows = query
                .load::<TemplateRow>(connection)
                .map_err(PipelineRepositoryError::persistence)?;
            rows.into_iter().map(row_to_template).collect()
        })
        .await
    }

    async fn delete_template(&self, id: &TemplateId) -> PipelineRepositoryResult<()> {
        let template_id = id.clone();
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(
                pipeline_templates::table.filter(pipeline_templates::id.eq(template_id.as_str())),
            )
            .execute(connection)
            .map_err(PipelineRepositoryError::persistence)?;
            if deleted == 0 {
                return Err(PipelineRepositoryError::TemplateNotFound(template_id));
            }
            Ok(())
        })
        .await
    }

    async fn get_provider_config(
        &self,
        workspace_id: &WorkspaceId,
    ) -> PipelineRepositoryResult<Option<WorkspaceProviderConfig>> {
        let workspace = workspace_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = workspace_provider_configs::table
                .filter(workspace_provider_configs::workspace_id.eq(&workspace))
                .filter(workspace_provider_configs::is_active.eq(true))
                .select(ProviderConfigRow::as_select())
                .first::<ProviderConfigRow>(connection)
                .optional()
                .map_err(PipelineRepositoryError::persistence)?;
            row.map(row_to_provider_config).transpose()
        })
        .await
    }

    async fn set_provider_config(
        &self,
        config: &WorkspaceProviderConfig,
    ) -> PipelineRepositoryResult<()> {
        let row = to_new_provider_config_row(config)?;

        self.run_blocking(move |connection| {
            connection.transaction::<_, PipelineRepositoryError, _>(|tx| {
                // Serialises activations of one workspace across replicas.
                diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))")
                    .bind::<Text, _>(&row.workspace_id)
                    .execute(tx)
                    .map_err(PipelineRepositoryError::persistence)?;

                diesel::update(
                    workspace_provider_configs::table
                        .filter(workspace_provider_configs::workspace_id.eq(&row.workspace_id))
                        .filter(workspace_provider_configs::is_active.eq(true))
                        .filter(workspace_provider_configs::id.ne(row.id)),
                )
                .set((
                    workspace_provider_configs::is_active.eq(false),
                    workspace_provider_configs::updated_at.eq(row.updated_at),
                ))
                .execute(tx)
                .map_err(PipelineRepositoryError::persistence)?;

                diesel::insert_into(workspace_provider_configs::table)
                    .values(&row)
                    .on_conflict(workspace_provider_configs::id)
                    .do_update()
                    .set(&row)
                    .execute(tx)
                    .map_err(PipelineRepositoryError::persistence)?;
                Ok(())
            })
        })
        .await
    }
}

/// Statuses from which a stored run may be overwritten by `next`.
fn writable_predecessors(next: RunStatus) -> Vec<String> {
    let mut allowed: Vec<String> = next
        .predecessors()
        .into_iter()
        .map(|status| status.as_str().to_owned())
        .collect();
    if !next.is_terminal() {
        allowed.push(next.as_str().to_owned());
    }
    allowed
}

fn map_run_write_error(
    err: DieselError,
    run_id: RunId,
    run_name: Option<&str>,
) -> PipelineRepositoryError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
            if is_constraint(info.as_ref(), PROVIDER_RUN_NAME_INDEX) =>
        {
            PipelineRepositoryError::DuplicateProviderRunName(
                run_name.unwrap_or_default().to_owned(),
            )
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            PipelineRepositoryError::DuplicateRun(run_id)
        }
        _ => PipelineRepositoryError::persistence(err),
    }
}

fn corrupt_record(entity: &'static str, id: impl ToString, reason: String) -> PipelineRepositoryError {
    let record_id = id.to_string();
    error!(entity, id = %record_id, reason = %reason, "corrupt persisted record");
    PipelineRepositoryError::corrupt(entity, record_id, reason)
}

fn is_constraint(info: &dyn DatabaseErrorInformation, constraint: &str) -> bool {
    info.constraint_name().is_some_and(|name| name == constraint)
}

fn to_new_pipeline_row(pipeline: &Pipeline) -> PipelineRepositoryResult<NewPipelineRow> {
    let config = serde_json::to_value(pipeline.source_config())
        .map_err(PipelineRepositoryError::persistence)?;
    Ok(NewPipelineRow {
        id: pipeline.id().into_inner(),
        workspace_id: pipeline.workspace_id().as_str().to_owned(),
        project_id: pipeline.project_id().as_str().to_owned(),
        name: pipeline.name().to_owned(),
        provider: pipeline.provider().as_str().to_owned(),
        config,
        created_at: pipeline.created_at(),
        updated_at: pipeline.updated_at(),
    })
}

fn row_to_pipeline(row: PipelineRow) -> PipelineRepositoryResult<Pipeline> {
    let PipelineRow {
        id,
        workspace_id,
        project_id,
        name,
        provider,
        config,
        created_at,
        updated_at,
    } = row;
    let corrupt = |reason: String| corrupt_record("pipeline", id, reason);

    let source_config: PipelineConfig =
        serde_json::from_value(config).map_err(|err| corrupt(err.to_string()))?;
    let data = PersistedPipelineData {
        id: PipelineId::from_uuid(id),
        workspace_id: WorkspaceId::new(workspace_id).map_err(|err| corrupt(err.to_string()))?,
        project_id: ProjectId::new(project_id).map_err(|err| corrupt(err.to_string()))?,
        name,
        provider: ProviderType::try_from(provider.as_str())
            .map_err(|err| corrupt(err.to_string()))?,
        source_config,
        created_at,
        updated_at,
    };
    Ok(Pipeline::from_persisted(data))
}

fn to_new_run_row(run: &PipelineRun) -> PipelineRepositoryResult<NewPipelineRunRow> {
    let stages = serde_json::to_value(run.stages()).map_err(PipelineRepositoryError::persistence)?;
    let metadata =
        serde_json::to_value(run.metadata()).map_err(PipelineRepositoryError::persistence)?;
    Ok(NewPipelineRunRow {
        id: run.id().into_inner(),
        pipeline_id: run.pipeline_id().into_inner(),
        provider_run_name: run.provider_run_name().map(str::to_owned),
        workspace_id: run.workspace_id().as_str().to_owned(),
        project_id: run.project_id().as_str().to_owned(),
        name: run.name().to_owned(),
        status: run.status().as_str().to_owned(),
        started_at: run.started_at(),
        finished_at: run.finished_at(),
        stages,
        metadata,
        created_at: run.created_at(),
        updated_at: run.updated_at(),
    })
}

fn row_to_run(row: PipelineRunRow) -> PipelineRepositoryResult<PipelineRun> {
    let PipelineRunRow {
        id,
        pipeline_id,
        provider_run_name,
        workspace_id,
        project_id,
        name,
        status,
        started_at,
        finished_at,
        stages,
        metadata,
        created_at,
        updated_at,
    } = row;
    let corrupt = |reason: String| corrupt_record("pipeline run", id, reason);

    let data = PersistedRunData {
        id: RunId::from_uuid(id),
        pipeline_id: PipelineId::from_uuid(pipeline_id),
        provider_run_name,
        workspace_id: WorkspaceId::new(workspace_id).map_err(|err| corrupt(err.to_string()))?,
        project_id: ProjectId::new(project_id).map_err(|err| corrupt(err.to_string()))?,
        name,
        status: RunStatus::try_from(status.as_str()).map_err(|err| corrupt(err.to_string()))?,
        started_at,
        finished_at,
        stages: serde_json::from_value(stages).map_err(|err| corrupt(err.to_string()))?,
        metadata: serde_json::from_value(metadata).map_err(|err| corrupt(err.to_string()))?,
        created_at,
        updated_at,
    };
    Ok(PipelineRun::from_persisted(data))
}

fn to_new_template_row(template: &PipelineTemplate) -> PipelineRepositoryResult<NewTemplateRow> {
    let to_json = |value: Result<serde_json::Value, serde_json::Error>| {
        value.map_err(PipelineRepositoryError::persistence)
    };
    Ok(NewTemplateRow {
        id: template.id().as_str().to_owned(),
        name: template.name().to_owned(),
        description: template.description().to_owned(),
        provider: template.provider().as_str().to_owned(),
        stages: to_json(serde_json::to_value(template.stages()))?,
        parameters: to_json(serde_json::to_value(template.parameters()))?,
        bindings: to_json(serde_json::to_value(template.bindings()))?,
        provenance: to_json(serde_json::to_value(template.provenance()))?,
        created_at: template.created_at(),
        updated_at: template.updated_at(),
    })
}

fn row_to_template(row: TemplateRow) -> PipelineRepositoryResult<PipelineTemplate> {
    let TemplateRow {
        id,
        name,
        description,
        provider,
        stages,
        parameters,
        bindings,
        provenance,
        created_at,
        updated_at,
    } = row;
    let corrupt = |reason: String| corrupt_record("template", &id, reason);

    let definition = TemplateDefinition {
        id: TemplateId::new(id.clone()).map_err(|err| corrupt(err.to_string()))?,
        name,
        description,
        provider: ProviderType::try_from(provider.as_str())
            .map_err(|err| corrupt(err.to_string()))?,
        stages: serde_json::from_value(stages).map_err(|err| corrupt(err.to_string()))?,
        parameters: serde_json::from_value(parameters).map_err(|err| corrupt(err.to_string()))?,
        bindings: serde_json::from_value(bindings).map_err(|err| corrupt(err.to_string()))?,
    };
    let data = PersistedTemplateData {
        definition,
        provenance: serde_json::from_value(provenance).map_err(|err| corrupt(err.to_string()))?,
        created_at,
        updated_at,
    };
    Ok(PipelineTemplate::from_persisted(data))
}

fn to_new_provider_config_row(
    config: &WorkspaceProviderConfig,
) -> PipelineRepositoryResult<NewProviderConfigRow> {
    let settings =
        serde_json::to_value(config.settings()).map_err(PipelineRepositoryError::persistence)?;
    Ok(NewProviderConfigRow {
        id: config.id().into_inner(),
        workspace_id: config.workspace_id().as_str().to_owned(),
        provider_type: config.provider_type().as_str().to_owned(),
        config: settings,
        is_active: config.is_active(),
        created_at: config.created_at(),
        updated_at: config.updated_at(),
    })
}

fn row_to_provider_config(row: ProviderConfigRow) -> PipelineRepositoryResult<WorkspaceProviderConfig> {
    let ProviderConfigRow {
        id,
        workspace_id,
        provider_type,
        config,
        is_active,
        created_at,
        updated_at,
    } = row;
    let corrupt =
        |reason: String| corrupt_record("provider config", id, reason);

    let data = PersistedProviderConfigData {
        id: ProviderConfigId::from_uuid(id),
        workspace_id: WorkspaceId::new(workspace_id).map_err(|err| corrupt(err.to_string()))?,
        provider_type: ProviderType::try_from(provider_type.as_str())
            .map_err(|err| corrupt(err.to_string()))?,
        settings: serde_json::from_value(config).map_err(|err| corrupt(err.to_string()))?,
        is_active,
        created_at,
        updated_at,
    };
    Ok(WorkspaceProviderConfig::from_persisted(data))
}
