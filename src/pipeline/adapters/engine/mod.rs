//! Simulated Kubernetes-native execution engine.

mod condition;
mod labels;
mod provider;

pub use condition::{CANCELLED_REASONS, ConditionStatus, EngineCondition, map_condition};
pub use labels::{
    MANAGED_BY_LABEL, MANAGED_BY_VALUE, PROJECT_ID_LABEL, RUN_ID_LABEL, WORKSPACE_ID_LABEL,
    run_name,
};
pub use provider::{ENGINE_VERSION, InMemoryEngineProvider, pod_name};
