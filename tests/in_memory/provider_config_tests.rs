//! Workspace provider configuration and capability discovery.

use super::helpers::{Stack, stack, workspace};
use pipeline_control::pipeline::domain::{
    ErrorKind, ProviderAvailability, ProviderSettings, ProviderType,
};
use rstest::rstest;

fn settings(namespace: &str) -> ProviderSettings {
    ProviderSettings::from([("namespace".to_owned(), namespace.to_owned())])
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn only_the_latest_config_is_active(stack: Stack) {
    let first = stack
        .service
        .set_provider_config(&workspace(), ProviderType::Tekton, settings("ci"))
        .await
        .expect("first config");
    let second = stack
        .service
        .set_provider_config(&workspace(), ProviderType::Tekton, settings("builds"))
        .await
        .expect("second config");

    let active = stack
        .service
        .get_provider_config(&workspace())
        .await
        .expect("lookup succeeds")
        .expect("active config");
    assert_eq!(active.id(), second.id());
    assert_eq!(active.settings().get("namespace").map(String::as_str), Some("builds"));

    let history = stack
        .repository
        .provider_config_history(&workspace())
        .expect("history readable");
    assert_eq!(history.len(), 2);
    assert_eq!(history.iter().filter(|config| config.is_active()).count(), 1);
    let superseded = history
        .iter()
        .find(|config| config.id() == first.id())
        .expect("first config kept");
    assert!(!superseded.is_active());
    assert_eq!(superseded.updated_at(), second.updated_at());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_activation_leaves_one_active_config(stack: Stack) {
    let ws = workspace();
    let (left, right) = tokio::join!(
        stack
            .service
            .set_provider_config(&ws, ProviderType::Tekton, settings("a")),
        stack
            .service
            .set_provider_config(&ws, ProviderType::Tekton, settings("b")),
    );
    left.expect("first activation");
    right.expect("second activation");

    let history = stack
        .repository
        .provider_config_history(&ws)
        .expect("history readable");
    assert_eq!(history.iter().filter(|config| config.is_active()).count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unimplemented_provider_is_rejected_before_storage(stack: Stack) {
    let err = stack
        .service
        .set_provider_config(&workspace(), ProviderType::GitlabCi, settings("ci"))
        .await
        .expect_err("no GitLab adapter");

    assert_eq!(err.kind(), ErrorKind::NotImplemented);
    assert!(
        stack
            .service
            .get_provider_config(&workspace())
            .await
            .expect("lookup succeeds")
            .is_none()
    );
}

#[rstest]
fn every_recognised_provider_is_listed(stack: Stack) {
    let providers = stack.service.list_providers();

    let types: Vec<ProviderType> = providers.iter().map(|info| info.provider_type).collect();
    assert_eq!(types, ProviderType::ALL.to_vec());
    let tekton = providers
        .iter()
        .find(|info| info.provider_type == ProviderType::Tekton)
        .expect("tekton listed");
    assert_eq!(tekton.availability, ProviderAvailability::Available);
    assert!(!tekton.features.is_empty());
}
