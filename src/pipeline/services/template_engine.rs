//! Template expansion: stage DAG validation, parameter resolution, and
//! placeholder rendering.

use crate::pipeline::{
    domain::{
        BuildConfig, DeployConfig, ErrorKind, ParameterType, PipelineConfig, PipelineTemplate,
        RegistryConfig, StagePlan, TaskPlan, TemplateDefinition,
    },
    ports::TemplateRequest,
};
use minijinja::{Environment, UndefinedBehavior};
use mockable::Clock;
use petgraph::{
    Direction::Outgoing,
    algo::toposort,
    graph::{DiGraph, NodeIndex},
};
use serde_json::{Map, Value};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use thiserror::Error;
use tracing::debug;

/// Metadata key holding the source template identifier.
pub const TEMPLATE_ID_METADATA_KEY: &str = "template_id";
/// Metadata key holding the resolved template parameters.
pub const TEMPLATE_PARAMS_METADATA_KEY: &str = "template_params";

/// Errors raised while validating or expanding templates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// Two stages share a name.
    #[error("template '{template}' declares stage '{stage}' more than once")]
    DuplicateStage {
        /// Template identifier.
        template: String,
        /// Stage name.
        stage: String,
    },

    /// A stage depends on an undeclared stage.
    #[error("stage '{stage}' of template '{template}' depends on unknown stage '{dependency}'")]
    UnknownDependency {
        /// Template identifier.
        template: String,
        /// Dependent stage.
        stage: String,
        /// Missing dependency.
        dependency: String,
    },

    /// The stage dependencies form a cycle.
    #[error("template '{template}' has a dependency cycle through stage '{stage}'")]
    Cycle {
        /// Template identifier.
        template: String,
        /// A stage on the cycle.
        stage: String,
    },

    /// A required parameter has neither a value nor a default.
    #[error("template '{template}' requires parameter '{parameter}'")]
    MissingParameter {
        /// Template identifier.
        template: String,
        /// Parameter name.
        parameter: String,
    },

    /// A parameter value has the wrong type.
    #[error("parameter '{parameter}' must be of type {expected}")]
    InvalidParameterType {
        /// Parameter name.
        parameter: String,
        /// Declared type name.
        expected: &'static str,
    },

    /// A parameter value is outside its allowed set.
    #[error("parameter '{parameter}' does not allow value {value}")]
    DisallowedValue {
        /// Parameter name.
        parameter: String,
        /// Rejected value rendered as JSON.
        value: String,
    },

    /// A binding targets an unknown config field.
    #[error("template '{template}' binds unknown config field '{field}'")]
    UnknownBinding {
        /// Template identifier.
        template: String,
        /// Field path.
        field: String,
    },

    /// A placeholder could not be rendered.
    #[error("cannot render {location} of template '{template}': {reason}")]
    Render {
        /// Template identifier.
        template: String,
        /// Where the placeholder sits.
        location: String,
        /// Renderer message.
        reason: String,
    },

    /// Embedded template data could not be decoded.
    #[error("invalid template catalogue: {0}")]
    InvalidCatalog(String),
}

impl TemplateError {
    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCatalog(_) => ErrorKind::CorruptState,
            _ => ErrorKind::Validation,
        }
    }
}

const BINDABLE_FIELDS: [&str; 14] = [
    "name",
    "namespace",
    "service_account",
    "git_repo.url",
    "git_repo.branch",
    "git_repo.ssh_key_ref",
    "build.image",
    "build.dockerfile",
    "build.context",
    "deploy.manifest_path",
    "deploy.namespace",
    "deploy.helm_chart",
    "registry.url",
    "registry.cred_ref",
];

/// Expands templates into backend-agnostic pipeline configurations.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEngine;

impl TemplateEngine {
    /// Creates a template engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Checks a template's structure without expanding it.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] for duplicate stages, unknown or cyclic
    /// dependencies, unknown bindings, and defaults of the wrong type.
    pub fn validate(&self, definition: &TemplateDefinition) -> Result<(), TemplateError> {
        stage_order(definition)?;
        for field in definition.bindings.keys() {
            if !BINDABLE_FIELDS.contains(&field.as_str()) {
                return Err(TemplateError::UnknownBinding {
                    template: definition.id.to_string(),
                    field: field.clone(),
                });
            }
        }
        for parameter in &definition.parameters {
            if let Some(default) = &parameter.default {
                check_value(
                    &parameter.name,
                    parameter.param_type,
                    &parameter.allowed_values,
                    default,
                )?;
            }
        }
        Ok(())
    }

    /// Expands `template` with the parameters in `request`.
    ///
    /// Stages are emitted in a topological order that keeps declaration
    /// order between independent stages. Dependencies stay explicit on each
    /// [`StagePlan`]. Parameters not declared by the template are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the stage graph is invalid, a required
    /// parameter is missing, a value has the wrong type, or a placeholder
    /// cannot be resolved.
    pub fn expand(
        &self,
        template: &PipelineTemplate,
        request: &TemplateRequest,
        clock: &impl Clock,
    ) -> Result<PipelineConfig, TemplateError> {
        let definition = template.definition();
        self.validate(definition)?;
        let order = stage_order(definition)?;
        let params = resolve_parameters(definition, &request.params)?;
        let renderer = Renderer::new(definition.id.to_string(), &params);

        let stages = order
            .into_iter()
            .filter_map(|position| definition.stages.get(position))
            .map(|stage| -> Result<StagePlan, TemplateError> {
                let tasks = stage
                    .tasks
                    .iter()
                    .map(|task| -> Result<TaskPlan, TemplateError> {
                        let parameters = task
                            .parameters
                            .iter()
                            .map(|(key, value)| {
                                let location = format!("parameter '{key}' of task '{}'", task.name);
                                renderer.render_value(&location, value).map(|v| (key.clone(), v))
                            })
                            .collect::<Result<BTreeMap<_, _>, _>>()?;
                        Ok(TaskPlan {
                            name: task.name.clone(),
                            task_type: task.task_type.clone(),
                            parameters,
                            resources: task.resources.clone(),
                            timeout_seconds: task.timeout_seconds,
                        })
                    })
                    .collect::<Result<Vec<_>, TemplateError>>()?;
                let mut depends_on: Vec<String> = Vec::with_capacity(stage.depends_on.len());
                for dependency in &stage.depends_on {
                    if !depends_on.contains(dependency) {
                        depends_on.push(dependency.clone());
                    }
                }
                Ok(StagePlan {
                    name: stage.name.clone(),
                    depends_on,
                    tasks,
                })
            })
            .collect::<Result<Vec<_>, TemplateError>>()?;

        let default_name = format!("{}-{}", definition.id, clock.utc().timestamp());
        let mut config = PipelineConfig::new(
            request.workspace_id.clone(),
            request.project_id.clone(),
            default_name,
        );
        for (field, expression) in &definition.bindings {
            let rendered = renderer.render_str(&format!("binding '{field}'"), expression)?;
            apply_binding(&mut config, field, rendered);
        }
        config.stages = stages;
        config.metadata.insert(
            TEMPLATE_ID_METADATA_KEY.to_owned(),
            Value::String(definition.id.to_string()),
        );
        config.metadata.insert(
            TEMPLATE_PARAMS_METADATA_KEY.to_owned(),
            Value::Object(params.into_iter().collect()),
        );
        Ok(config)
    }
}

/// Returns stage positions in dependency order, declaration order breaking
/// ties between independent stages.
fn stage_order(definition: &TemplateDefinition) -> Result<Vec<usize>, TemplateError> {
    let template = definition.id.to_string();
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(definition.stages.len(), 0);
    let mut node_by_name: HashMap<&str, NodeIndex> = HashMap::new();

    for (position, stage) in definition.stages.iter().enumerate() {
        let node = graph.add_node(position);
        if node_by_name.insert(stage.name.as_str(), node).is_some() {
            return Err(TemplateError::DuplicateStage {
                template,
                stage: stage.name.clone(),
            });
        }
    }

    for stage in &definition.stages {
        let Some(&to) = node_by_name.get(stage.name.as_str()) else {
            continue;
        };
        for dependency in &stage.depends_on {
            let from = node_by_name.get(dependency.as_str()).ok_or_else(|| {
                TemplateError::UnknownDependency {
                    template: template.clone(),
                    stage: stage.name.clone(),
                    dependency: dependency.clone(),
                }
            })?;
            graph.update_edge(*from, to, ());
        }
    }

    if let Err(cycle) = toposort(&graph, None) {
        let stage = graph
            .node_weight(cycle.node_id())
            .and_then(|position| definition.stages.get(*position))
            .map(|stage| stage.name.clone())
            .unwrap_or_default();
        return Err(TemplateError::Cycle { template, stage });
    }

    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|node| graph.neighbors_directed(node, petgraph::Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(position, _)| Reverse(position))
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(Reverse(position)) = ready.pop() {
        order.push(position);
        for next in graph.neighbors_directed(NodeIndex::new(position), Outgoing) {
            if let Some(degree) = in_degree.get_mut(next.index()) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.push(Reverse(next.index()));
                }
            }
        }
    }
    Ok(order)
}

fn resolve_parameters(
    definition: &TemplateDefinition,
    supplied: &BTreeMap<String, Value>,
) -> Result<BTreeMap<String, Value>, TemplateError> {
    let mut resolved = BTreeMap::new();
    for parameter in &definition.parameters {
        let value = supplied
            .get(&parameter.name)
            .cloned()
            .or_else(|| parameter.default.clone());
        match value {
            Some(value) => {
                check_value(
                    &parameter.name,
                    parameter.param_type,
                    &parameter.allowed_values,
                    &value,
                )?;
                resolved.insert(parameter.name.clone(), value);
            }
            None if parameter.required => {
                return Err(TemplateError::MissingParameter {
                    template: definition.id.to_string(),
                    parameter: parameter.name.clone(),
                });
            }
            None => {}
        }
    }
    for name in supplied.keys() {
        if !definition.parameters.iter().any(|p| &p.name == name) {
            debug!(template = %definition.id, parameter = %name, "ignoring undeclared template parameter");
        }
    }
    Ok(resolved)
}

fn check_value(
    name: &str,
    param_type: ParameterType,
    allowed_values: &[Value],
    value: &Value,
) -> Result<(), TemplateError> {
    if !param_type.accepts(value) {
        return Err(TemplateError::InvalidParameterType {
            parameter: name.to_owned(),
            expected: param_type.as_str(),
        });
    }
    if !allowed_values.is_empty() && !allowed_values.contains(value) {
        return Err(TemplateError::DisallowedValue {
            parameter: name.to_owned(),
            value: value.to_string(),
        });
    }
    Ok(())
}

struct Renderer {
    template: String,
    environment: Environment<'static>,
    context: Map<String, Value>,
}

impl Renderer {
    fn new(template: String, params: &BTreeMap<String, Value>) -> Self {
        let mut environment = Environment::new();
        environment.set_undefined_behavior(UndefinedBehavior::Strict);
        let mut context = Map::new();
        context.insert(
            "params".to_owned(),
            Value::Object(params.clone().into_iter().collect()),
        );
        Self {
            template,
            environment,
            context,
        }
    }

    fn render_str(&self, location: &str, source: &str) -> Result<String, TemplateError> {
        self.environment
            .render_str(source, &self.context)
            .map_err(|error| TemplateError::Render {
                template: self.template.clone(),
                location: location.to_owned(),
                reason: error.to_string(),
            })
    }

    fn render_value(&self, location: &str, value: &Value) -> Result<Value, TemplateError> {
        match value {
            Value::String(source) => self.render_str(location, source).map(Value::String),
            Value::Array(items) => items
                .iter()
                .map(|item| self.render_value(location, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(entries) => entries
                .iter()
                .map(|(key, item)| self.render_value(location, item).map(|v| (key.clone(), v)))
                .collect::<Result<Map<_, _>, _>>()
                .map(Value::Object),
            other => Ok(other.clone()),
        }
    }
}

fn apply_binding(config: &mut PipelineConfig, field: &str, rendered: String) {
    let value = rendered.trim().to_owned();
    if value.is_empty() {
        return;
    }
    match field {
        "name" => config.name = value,
        "namespace" => config.namespace = Some(value),
        "service_account" => config.service_account = value,
        "git_repo.url" => config.git_repo.url = value,
        "git_repo.branch" => config.git_repo.branch = Some(value),
        "git_repo.ssh_key_ref" => config.git_repo.ssh_key_ref = Some(value),
        "build.image" => config.build.get_or_insert_with(BuildConfig::default).image = Some(value),
        "build.dockerfile" => {
            config.build.get_or_insert_with(BuildConfig::default).dockerfile = Some(value);
        }
        "build.context" => {
            config.build.get_or_insert_with(BuildConfig::default).context = Some(value);
        }
        "deploy.manifest_path" => {
            config.deploy.get_or_insert_with(DeployConfig::default).manifest_path = Some(value);
        }
        "deploy.namespace" => {
            config.deploy.get_or_insert_with(DeployConfig::default).namespace = Some(value);
        }
        "deploy.helm_chart" => {
            config.deploy.get_or_insert_with(DeployConfig::default).helm_chart = Some(value);
        }
        "registry.url" => config.registry.get_or_insert_with(RegistryConfig::default).url = value,
        "registry.cred_ref" => {
            config.registry.get_or_insert_with(RegistryConfig::default).cred_ref = Some(value);
        }
        _ => {}
    }
}
