//! `PostgreSQL` pipeline repository behaviour.

use super::helpers::{PgContext, pipeline, project, setup, workspace};
use chrono::Duration;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use mockable::{Clock, DefaultClock};
use pg_embedded_setup_unpriv::TestCluster;
use pg_embedded_setup_unpriv::test_support::shared_test_cluster;
use pipeline_control::pipeline::{
    domain::{
        ErrorKind, ParameterDefinition, ParameterType, PipelineRun, PipelineTemplate,
        ProviderType, RunHandle, RunId, RunStatus, StageTemplate, TaskTemplate,
        TemplateDefinition, TemplateId, WorkspaceProviderConfig,
    },
    ports::{PipelineRepository, PipelineRepositoryError},
};
use rstest::{fixture, rstest};
use serde_json::json;
use std::collections::BTreeMap;

#[fixture]
fn ctx(shared_test_cluster: &'static TestCluster) -> PgContext {
    setup(shared_test_cluster).expect("postgres test setup")
}

fn submitted_run(run: &mut PipelineRun, name: &str) {
    run.attach_handle(
        &RunHandle {
            run_id: run.id(),
            provider_run_name: name.to_owned(),
            started_at: DefaultClock.utc(),
        },
        &DefaultClock,
    );
}

#[rstest]
fn pipeline_round_trip_and_unique_name(ctx: PgContext) {
    let stored = pipeline("web");

    ctx.rt
        .block_on(ctx.repo.create_pipeline(&stored))
        .expect("create pipeline");
    let found = ctx
        .rt
        .block_on(ctx.repo.find_pipeline_by_name(&workspace(), &project(), "web"))
        .expect("lookup")
        .expect("pipeline exists");
    assert_eq!(found.id(), stored.id());
    assert_eq!(found.source_config(), stored.source_config());

    let duplicate = ctx.rt.block_on(ctx.repo.create_pipeline(&pipeline("web")));
    assert!(matches!(
        duplicate,
        Err(PipelineRepositoryError::DuplicatePipeline { .. })
    ));
}

#[rstest]
fn run_is_found_by_id_and_backend_name(ctx: PgContext) {
    let owner = pipeline("web");
    ctx.rt
        .block_on(ctx.repo.create_pipeline(&owner))
        .expect("create pipeline");
    let mut run = PipelineRun::new(RunId::new(), owner.id(), owner.source_config(), &DefaultClock);
    ctx.rt
        .block_on(ctx.repo.create_pipeline_run(&run))
        .expect("create run");

    submitted_run(&mut run, "web-abc123");
    ctx.rt
        .block_on(ctx.repo.update_pipeline_run(&run))
        .expect("attach handle");

    let by_id = ctx
        .rt
        .block_on(ctx.repo.get_pipeline_run(&run.id().to_string()))
        .expect("lookup by id")
        .expect("run exists");
    let by_name = ctx
        .rt
        .block_on(ctx.repo.get_pipeline_run("web-abc123"))
        .expect("lookup by name")
        .expect("run exists");
    assert_eq!(by_id.id(), run.id());
    assert_eq!(by_name.id(), run.id());
    assert_eq!(by_name.provider_run_name(), Some("web-abc123"));
}

#[rstest]
fn run_updates_never_move_backwards(ctx: PgContext) {
    let owner = pipeline("web");
    ctx.rt
        .block_on(ctx.repo.create_pipeline(&owner))
        .expect("create pipeline");
    let mut run = PipelineRun::new(RunId::new(), owner.id(), owner.source_config(), &DefaultClock);
    ctx.rt
        .block_on(ctx.repo.create_pipeline_run(&run))
        .expect("create run");
    let stale = run.clone();

    run.transition_to(RunStatus::Succeeded, &DefaultClock)
        .expect("pending to succeeded");
    let advanced = ctx
        .rt
        .block_on(ctx.repo.update_pipeline_run(&run))
        .expect("advance");
    assert_eq!(advanced.status(), RunStatus::Succeeded);

    let kept = ctx
        .rt
        .block_on(ctx.repo.update_pipeline_run(&stale))
        .expect("stale write tolerated");
    assert_eq!(kept.status(), RunStatus::Succeeded);
}

#[rstest]
fn list_runs_is_newest_first_and_bounded(ctx: PgContext) {
    let owner = pipeline("web");
    ctx.rt
        .block_on(ctx.repo.create_pipeline(&owner))
        .expect("create pipeline");
    let base = DefaultClock.utc();
    let mut ids = Vec::new();
    for offset in 0..3 {
        let mut run =
            PipelineRun::new(RunId::new(), owner.id(), owner.source_config(), &DefaultClock);
        run.attach_handle(
            &RunHandle {
                run_id: run.id(),
                provider_run_name: format!("web-{offset}"),
                started_at: base + Duration::seconds(offset),
            },
            &DefaultClock,
        );
        ctx.rt
            .block_on(ctx.repo.create_pipeline_run(&run))
            .expect("create run");
        ids.push(run.id());
    }

    let listed = ctx
        .rt
        .block_on(ctx.repo.list_pipeline_runs(&workspace(), &project(), 2))
        .expect("list runs");

    let listed_ids: Vec<RunId> = listed.iter().map(PipelineRun::id).collect();
    let newest: Vec<RunId> = ids.iter().rev().take(2).copied().collect();
    assert_eq!(listed_ids, newest);
}

#[rstest]
fn deleting_a_pipeline_removes_its_runs(ctx: PgContext) {
    let owner = pipeline("web");
    ctx.rt
        .block_on(ctx.repo.create_pipeline(&owner))
        .expect("create pipeline");
    let run = PipelineRun::new(RunId::new(), owner.id(), owner.source_config(), &DefaultClock);
    ctx.rt
        .block_on(ctx.repo.create_pipeline_run(&run))
        .expect("create run");

    ctx.rt
        .block_on(ctx.repo.delete_pipeline(owner.id()))
        .expect("delete pipeline");

    let gone = ctx
        .rt
        .block_on(ctx.repo.get_pipeline_run(&run.id().to_string()))
        .expect("lookup");
    assert!(gone.is_none());
    let missing = ctx.rt.block_on(ctx.repo.delete_pipeline(owner.id()));
    assert!(matches!(
        missing,
        Err(PipelineRepositoryError::PipelineNotFound(_))
    ));
}

#[rstest]
fn template_crud_and_duplicates(ctx: PgContext) {
    let id = TemplateId::new("lint-only").expect("valid template id");
    let definition = TemplateDefinition::new(id.clone(), "Lint", ProviderType::Tekton)
        .with_stage(StageTemplate::new("lint"));
    let template = PipelineTemplate::new(definition.clone(), &DefaultClock);

    ctx.rt
        .block_on(ctx.repo.create_template(&template))
        .expect("create template");
    let duplicate = ctx.rt.block_on(ctx.repo.create_template(&template));
    assert!(matches!(
        duplicate,
        Err(PipelineRepositoryError::DuplicateTemplate(_))
    ));

    let mut revised = template.clone();
    revised.revise(definition.with_description("Strict"), &DefaultClock);
    ctx.rt
        .block_on(ctx.repo.update_template(&revised))
        .expect("update template");
    let found = ctx
        .rt
        .block_on(ctx.repo.get_template(&id))
        .expect("lookup")
        .expect("template exists");
    assert_eq!(found.description(), "Strict");
    assert_eq!(found.stages(), template.stages());

    ctx.rt
        .block_on(ctx.repo.delete_template(&id))
        .expect("delete template");
    let listed = ctx
        .rt
        .block_on(ctx.repo.list_templates(None))
        .expect("list templates");
    assert!(listed.is_empty());
}

#[rstest]
fn only_latest_provider_config_is_active(ctx: PgContext) {
    let first = WorkspaceProviderConfig::new(
        workspace(),
        ProviderType::Tekton,
        BTreeMap::new(),
        &DefaultClock,
    );
    let second = WorkspaceProviderConfig::new(
        workspace(),
        ProviderType::Tekton,
        BTreeMap::from([("namespace".to_owned(), "ci".to_owned())]),
        &DefaultClock,
    );

    ctx.rt
        .block_on(ctx.repo.set_provider_config(&first))
        .expect("first config");
    ctx.rt
        .block_on(ctx.repo.set_provider_config(&second))
        .expect("second config");

    let active = ctx
        .rt
        .block_on(ctx.repo.get_provider_config(&workspace()))
        .expect("lookup")
        .expect("active config");
    assert_eq!(active.id(), second.id());
    assert_eq!(active.settings().get("namespace").map(String::as_str), Some("ci"));
}

#[rstest]
fn template_round_trip_keeps_the_stage_graph_and_parameters(ctx: PgContext) {
    let id = TemplateId::new("build-and-ship").expect("valid template id");
    let definition = TemplateDefinition::new(id.clone(), "Build and ship", ProviderType::Tekton)
        .with_description("Builds an image and rolls it out")
        .with_parameter(
            ParameterDefinition::new("image")
                .with_type(ParameterType::String)
                .required(),
        )
        .with_parameter(
            ParameterDefinition::new("replicas")
                .with_type(ParameterType::Number)
                .with_default(json!(2))
                .with_allowed_values([json!(1), json!(2), json!(3)]),
        )
        .with_stage(StageTemplate::new("clone").with_task(
            TaskTemplate::new("fetch", "git-clone").with_parameter("depth", json!(1)),
        ))
        .with_stage(
            StageTemplate::new("build")
                .depends_on("clone")
                .with_task(
                    TaskTemplate::new("kaniko", "image-build")
                        .with_parameter("image", json!("{{ image }}")),
                )
                .with_task(TaskTemplate::new("scan", "image-scan")),
        )
        .with_stage(
            StageTemplate::new("deploy")
                .depends_on("build")
                .with_task(
                    TaskTemplate::new("rollout", "kubectl-apply")
                        .with_parameter("replicas", json!("{{ replicas }}")),
                ),
        )
        .with_binding("build.image", "{{ image }}");
    let template = PipelineTemplate::new(definition, &DefaultClock);

    ctx.rt
        .block_on(ctx.repo.create_template(&template))
        .expect("create template");
    let found = ctx
        .rt
        .block_on(ctx.repo.get_template(&id))
        .expect("lookup")
        .expect("template exists");

    assert_eq!(found.definition(), template.definition());
    assert_eq!(found.provenance(), template.provenance());
    let build = found
        .stages()
        .iter()
        .find(|stage| stage.name == "build")
        .expect("build stage kept");
    assert_eq!(build.depends_on, ["clone"]);
    assert_eq!(build.tasks.len(), 2);
}

#[rstest]
fn malformed_template_json_is_reported_as_corrupt(ctx: PgContext) {
    let mut conn = ctx.raw_connection().expect("raw connection");
    diesel::sql_query(
        "INSERT INTO pipeline_templates \
         (id, name, description, provider, stages, parameters, bindings, provenance, \
          created_at, updated_at) \
         VALUES ($1, 'Broken', '', 'tekton', '\"not-a-stage-list\"'::jsonb, '[]'::jsonb, \
                 '{}'::jsonb, '\"custom\"'::jsonb, now(), now())",
    )
    .bind::<Text, _>("broken")
    .execute(&mut conn)
    .expect("insert malformed template");

    let id = TemplateId::new("broken").expect("valid template id");
    let err = ctx
        .rt
        .block_on(ctx.repo.get_template(&id))
        .expect_err("stages cannot decode");

    assert_eq!(err.kind(), ErrorKind::CorruptState);
    assert!(matches!(err, PipelineRepositoryError::CorruptState { .. }));
    let listed = ctx.rt.block_on(ctx.repo.list_templates(None));
    assert!(listed.is_err_and(|listing| listing.kind() == ErrorKind::CorruptState));
}

#[rstest]
fn malformed_run_metadata_is_reported_as_corrupt(ctx: PgContext) {
    let owner = pipeline("web");
    ctx.rt
        .block_on(ctx.repo.create_pipeline(&owner))
        .expect("create pipeline");
    let run_id = RunId::new();
    let mut conn = ctx.raw_connection().expect("raw connection");
    diesel::sql_query(
        "INSERT INTO pipeline_runs \
         (id, pipeline_id, workspace_id, project_id, name, status, started_at, \
          stages, metadata, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, 'web', 'pending', now(), '[]'::jsonb, \
                 '[1, 2]'::jsonb, now(), now())",
    )
    .bind::<diesel::sql_types::Uuid, _>(run_id.into_inner())
    .bind::<diesel::sql_types::Uuid, _>(owner.id().into_inner())
    .bind::<Text, _>(workspace().as_str())
    .bind::<Text, _>(project().as_str())
    .execute(&mut conn)
    .expect("insert malformed run");

    let err = ctx
        .rt
        .block_on(ctx.repo.get_pipeline_run(&run_id.to_string()))
        .expect_err("metadata cannot decode");

    assert_eq!(err.kind(), ErrorKind::CorruptState);
}

#[rstest]
fn terminal_run_rows_are_not_overwritten(ctx: PgContext) {
    let owner = pipeline("web");
    ctx.rt
        .block_on(ctx.repo.create_pipeline(&owner))
        .expect("create pipeline");
    let mut run = PipelineRun::new(RunId::new(), owner.id(), owner.source_config(), &DefaultClock);
    ctx.rt
        .block_on(ctx.repo.create_pipeline_run(&run))
        .expect("create run");
    let mut racing = run.clone();

    run.transition_to(RunStatus::Cancelled, &DefaultClock)
        .expect("pending to cancelled");
    ctx.rt
        .block_on(ctx.repo.update_pipeline_run(&run))
        .expect("cancel stored");
    racing
        .transition_to(RunStatus::Succeeded, &DefaultClock)
        .expect("pending to succeeded");
    let kept = ctx
        .rt
        .block_on(ctx.repo.update_pipeline_run(&racing))
        .expect("late report tolerated");

    assert_eq!(kept.status(), RunStatus::Cancelled);
    let stored = ctx
        .rt
        .block_on(ctx.repo.get_pipeline_run(&run.id().to_string()))
        .expect("lookup")
        .expect("run exists");
    assert_eq!(stored.status(), RunStatus::Cancelled);
}

#[derive(QueryableByName)]
struct ActiveCount {
    #[diesel(sql_type = BigInt)]
    active: i64,
}

#[rstest]
fn concurrent_activations_leave_one_active_row(ctx: PgContext) {
    let configs: Vec<WorkspaceProviderConfig> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|namespace| {
            WorkspaceProviderConfig::new(
                workspace(),
                ProviderType::Tekton,
                BTreeMap::from([("namespace".to_owned(), namespace.to_owned())]),
                &DefaultClock,
            )
        })
        .collect();

    let results = ctx.rt.block_on(futures::future::join_all(
        configs.iter().map(|config| ctx.repo.set_provider_config(config)),
    ));
    assert!(results.iter().all(Result::is_ok), "{results:?}");

    let mut conn = ctx.raw_connection().expect("raw connection");
    let count = diesel::sql_query(
        "SELECT COUNT(*) AS active FROM workspace_provider_configs \
         WHERE workspace_id = $1 AND is_active",
    )
    .bind::<Text, _>(workspace().as_str())
    .get_result::<ActiveCount>(&mut conn)
    .expect("count active rows");
    assert_eq!(count.active, 1);

    let active = ctx
        .rt
        .block_on(ctx.repo.get_provider_config(&workspace()))
        .expect("lookup")
        .expect("active config");
    assert!(configs.iter().any(|config| config.id() == active.id()));
}
