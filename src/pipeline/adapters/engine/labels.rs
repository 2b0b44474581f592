//! Labels stamped on engine execution objects.

use crate::pipeline::domain::{PipelineConfig, RunId, WorkspaceId};
use std::collections::BTreeMap;

/// Marks objects owned by the control plane.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
/// Value of [`MANAGED_BY_LABEL`].
pub const MANAGED_BY_VALUE: &str = "pipeline-control";
/// Platform run identifier.
pub const RUN_ID_LABEL: &str = "pipeline-control.io/run-id";
/// Owning workspace.
pub const WORKSPACE_ID_LABEL: &str = "pipeline-control.io/workspace-id";
/// Owning project.
pub const PROJECT_ID_LABEL: &str = "pipeline-control.io/project-id";

/// Builds the label set for a new execution object.
#[must_use]
pub fn run_labels(run_id: RunId, config: &PipelineConfig) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_owned(), MANAGED_BY_VALUE.to_owned()),
        (RUN_ID_LABEL.to_owned(), run_id.to_string()),
        (
            WORKSPACE_ID_LABEL.to_owned(),
            config.workspace_id.to_string(),
        ),
        (PROJECT_ID_LABEL.to_owned(), config.project_id.to_string()),
    ])
}

/// Returns `true` when `labels` select the run in the workspace.
#[must_use]
pub fn selects_run(
    labels: &BTreeMap<String, String>,
    workspace_id: &WorkspaceId,
    run_id: RunId,
) -> bool {
    label_is(labels, WORKSPACE_ID_LABEL, workspace_id.as_str())
        && label_is(labels, RUN_ID_LABEL, &run_id.to_string())
}

/// Returns `true` when `labels[key] == value`.
#[must_use]
pub fn label_is(labels: &BTreeMap<String, String>, key: &str, value: &str) -> bool {
    labels.get(key).is_some_and(|actual| actual == value)
}

/// Derives a DNS-label-safe run name from the pipeline name and run id.
#[must_use]
pub fn run_name(pipeline_name: &str, run_id: RunId) -> String {
    let sanitized: String = pipeline_name
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .take(54)
        .collect();
    let trimmed = sanitized.trim_matches('-');
    let base = if trimmed.is_empty() { "pipeline" } else { trimmed };
    format!("{base}-{}", run_id.short())
}
