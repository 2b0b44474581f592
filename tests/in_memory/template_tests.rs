//! Template catalogue, stored templates, and expansion into runs.

use super::helpers::{Stack, project, stack, workspace};
use pipeline_control::pipeline::{
    domain::{
        ErrorKind, ParameterDefinition, ProviderType, RunStatus, StageTemplate, TaskTemplate,
        TemplateDefinition, TemplateId,
    },
    ports::TemplateRequest,
    services::{PipelineServiceError, TEMPLATE_ID_METADATA_KEY},
};
use rstest::rstest;
use serde_json::json;

fn template_id(value: &str) -> TemplateId {
    TemplateId::new(value).expect("valid template id")
}

fn custom_definition(id: &str) -> TemplateDefinition {
    TemplateDefinition::new(template_id(id), "Lint only", ProviderType::Tekton)
        .with_description("Runs the linter")
        .with_stage(
            StageTemplate::new("lint").with_task(
                TaskTemplate::new("cargo-clippy", "shell")
                    .with_parameter("args", json!("{{ params[\"args\"] }}")),
            ),
        )
        .with_parameter(ParameterDefinition::new("args").with_default(json!("--all-targets")))
        .with_parameter(ParameterDefinition::new("repo").required())
        .with_binding("name", "lint")
        .with_binding("git_repo.url", "{{ params[\"repo\"] }}")
        .with_binding("service_account", "pipeline")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn builtin_template_expands_and_runs(stack: Stack) {
    let request = TemplateRequest::new(template_id("docker-build-push"), workspace(), project())
        .with_param("git-url", "https://git.example.com/web.git")
        .with_param("image-name", "web");

    let config = stack
        .service
        .create_from_template(&request)
        .await
        .expect("expansion succeeds");
    assert_eq!(config.name, "web");
    assert_eq!(
        config.metadata.get(TEMPLATE_ID_METADATA_KEY),
        Some(&json!("docker-build-push"))
    );

    let run = stack
        .service
        .run_pipeline(config)
        .await
        .expect("expanded config runs");
    assert_eq!(run.status(), RunStatus::Pending);
    let stages: Vec<&str> = run.stages().iter().map(|stage| stage.name.as_str()).collect();
    assert_eq!(stages, ["clone", "build"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_template_is_not_found(stack: Stack) {
    let request = TemplateRequest::new(template_id("nope"), workspace(), project());

    let err = stack
        .service
        .create_from_template(&request)
        .await
        .expect_err("no such template");

    assert!(matches!(err, PipelineServiceError::TemplateNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_parameter_is_a_validation_error(stack: Stack) {
    let request = TemplateRequest::new(template_id("docker-build-push"), workspace(), project())
        .with_param("git-url", "https://git.example.com/web.git");

    let err = stack
        .service
        .create_from_template(&request)
        .await
        .expect_err("image-name missing");

    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn custom_template_lifecycle(stack: Stack) {
    let created = stack
        .service
        .create_template(custom_definition("lint-only"))
        .await
        .expect("template stored");
    assert!(!created.is_builtin());

    let request = TemplateRequest::new(template_id("lint-only"), workspace(), project())
        .with_param("repo", "https://git.example.com/lib.git");
    let config = stack
        .service
        .create_from_template(&request)
        .await
        .expect("expansion succeeds");
    assert_eq!(config.name, "lint");
    assert_eq!(config.git_repo.url, "https://git.example.com/lib.git");

    let updated = stack
        .service
        .update_template(custom_definition("lint-only").with_description("Strict lint"))
        .await
        .expect("template updated");
    assert_eq!(updated.description(), "Strict lint");
    assert_eq!(updated.created_at(), created.created_at());

    stack
        .service
        .delete_template(&template_id("lint-only"))
        .await
        .expect("template deleted");
    let err = stack
        .service
        .get_template(&template_id("lint-only"))
        .await
        .expect_err("template removed");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn builtin_templates_are_read_only(stack: Stack) {
    let shadow = TemplateDefinition::new(
        template_id("docker-build-push"),
        "Shadow",
        ProviderType::Tekton,
    );

    let created = stack.service.create_template(shadow.clone()).await;
    let updated = stack.service.update_template(shadow).await;
    let deleted = stack
        .service
        .delete_template(&template_id("docker-build-push"))
        .await;

    assert!(matches!(created, Err(PipelineServiceError::BuiltInTemplate(_))));
    assert!(matches!(updated, Err(PipelineServiceError::BuiltInTemplate(_))));
    assert!(matches!(deleted, Err(PipelineServiceError::BuiltInTemplate(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cyclic_template_is_rejected(stack: Stack) {
    let cyclic = TemplateDefinition::new(template_id("loop"), "Loop", ProviderType::Tekton)
        .with_stage(StageTemplate::new("a").depends_on("b"))
        .with_stage(StageTemplate::new("b").depends_on("a"));

    let err = stack
        .service
        .create_template(cyclic)
        .await
        .expect_err("cycle rejected");

    assert!(matches!(err, PipelineServiceError::Template(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn listing_merges_builtin_and_stored_templates(stack: Stack) {
    stack
        .service
        .create_template(custom_definition("lint-only"))
        .await
        .expect("template stored");

    let all = stack
        .service
        .list_templates(&workspace(), None)
        .await
        .expect("list succeeds");
    let ids: Vec<&str> = all.iter().map(|template| template.id().as_str()).collect();
    assert!(ids.contains(&"docker-build-push"));
    assert!(ids.contains(&"lint-only"));
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
    assert_eq!(
        ids.iter().filter(|id| **id == "docker-build-push").count(),
        1
    );

    let gitlab = stack
        .service
        .list_templates(&workspace(), Some(ProviderType::GitlabCi))
        .await
        .expect("list succeeds");
    assert!(gitlab.is_empty());
}
