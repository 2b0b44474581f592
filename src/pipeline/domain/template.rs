//! Parameterised pipeline templates.

use super::{ProviderType, ResourceRequests, TemplateId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Declared type of a template parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    /// UTF-8 string.
    #[default]
    String,
    /// JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
}

impl ParameterType {
    /// Returns `true` when `value` has this type.
    #[must_use]
    pub const fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::String, Value::String(_))
                | (Self::Number, Value::Number(_))
                | (Self::Boolean, Value::Bool(_))
                | (Self::Array, Value::Array(_))
                | (Self::Object, Value::Object(_))
        )
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// Declared template parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    /// Parameter name, referenced as `params["name"]` in placeholders.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type", default)]
    pub param_type: ParameterType,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Value used when the caller supplies none.
    #[serde(default)]
    pub default: Option<Value>,
    /// Whether a value must be available after defaults apply.
    #[serde(default)]
    pub required: bool,
    /// Permitted values; empty means unrestricted.
    #[serde(default)]
    pub allowed_values: Vec<Value>,
}

impl ParameterDefinition {
    /// Creates an optional string parameter.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::String,
            description: None,
            default: None,
            required: false,
            allowed_values: Vec::new(),
        }
    }

    /// Marks the parameter as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the declared type.
    #[must_use]
    pub const fn with_type(mut self, param_type: ParameterType) -> Self {
        self.param_type = param_type;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Restricts the parameter to the given values.
    #[must_use]
    pub fn with_allowed_values(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.allowed_values = values.into_iter().collect();
        self
    }
}

/// Task blueprint inside a stage template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    /// Task name.
    pub name: String,
    /// Engine task type.
    #[serde(rename = "type")]
    pub task_type: String,
    /// Parameters; string values may hold placeholders.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    /// Resource requests.
    #[serde(default)]
    pub resources: Option<ResourceRequests>,
    /// Task timeout in seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl TaskTemplate {
    /// Creates a task template with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_type: task_type.into(),
            parameters: BTreeMap::new(),
            resources: None,
            timeout_seconds: None,
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// Stage blueprint; `depends_on` names are the edges of the stage DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTemplate {
    /// Stage name.
    pub name: String,
    /// Stages that must finish first.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Tasks in declaration order.
    #[serde(default)]
    pub tasks: Vec<TaskTemplate>,
}

impl StageTemplate {
    /// Creates a stage with no dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Adds a dependency edge.
    #[must_use]
    pub fn depends_on(mut self, stage: impl Into<String>) -> Self {
        self.depends_on.push(stage.into());
        self
    }

    /// Adds a task.
    #[must_use]
    pub fn with_task(mut self, task: TaskTemplate) -> Self {
        self.tasks.push(task);
        self
    }
}

/// Where a template came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateProvenance {
    /// Shipped with the control plane as embedded data.
    BuiltIn {
        /// SHA-256 of the embedded asset, hex encoded.
        digest: String,
    },
    /// Created by a tenant or operator.
    Custom,
}

/// Serialisable template content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    /// Template identifier.
    pub id: TemplateId,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Provider the template targets.
    pub provider: ProviderType,
    /// Stages in declaration order.
    #[serde(default)]
    pub stages: Vec<StageTemplate>,
    /// Declared parameters.
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
    /// Config field paths mapped to placeholder expressions.
    #[serde(default)]
    pub bindings: BTreeMap<String, String>,
}

impl TemplateDefinition {
    /// Creates an empty definition.
    #[must_use]
    pub fn new(id: TemplateId, name: impl Into<String>, provider: ProviderType) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            provider,
            stages: Vec::new(),
            parameters: Vec::new(),
            bindings: BTreeMap::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: StageTemplate) -> Self {
        self.stages.push(stage);
        self
    }

    /// Adds a parameter definition.
    #[must_use]
    pub fn with_parameter(mut self, parameter: ParameterDefinition) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Binds a config field path to a placeholder expression.
    #[must_use]
    pub fn with_binding(mut self, field: impl Into<String>, expression: impl Into<String>) -> Self {
        self.bindings.insert(field.into(), expression.into());
        self
    }
}

/// Reusable, parameterised pipeline blueprint.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineTemplate {
    definition: TemplateDefinition,
    provenance: TemplateProvenance,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted template.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedTemplateData {
    /// Template content.
    pub definition: TemplateDefinition,
    /// Provenance.
    pub provenance: TemplateProvenance,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl PipelineTemplate {
    /// Creates a custom template.
    #[must_use]
    pub fn new(definition: TemplateDefinition, clock: &impl Clock) -> Self {
        Self::with_provenance(definition, TemplateProvenance::Custom, clock)
    }

    /// Creates a template with explicit provenance.
    #[must_use]
    pub fn with_provenance(
        definition: TemplateDefinition,
        provenance: TemplateProvenance,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            definition,
            provenance,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a template from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTemplateData) -> Self {
        Self {
            definition: data.definition,
            provenance: data.provenance,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the template identifier.
    #[must_use]
    pub const fn id(&self) -> &TemplateId {
        &self.definition.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.definition.description
    }

    /// Returns the target provider.
    #[must_use]
    pub const fn provider(&self) -> ProviderType {
        self.definition.provider
    }

    /// Returns the stages in declaration order.
    #[must_use]
    pub fn stages(&self) -> &[StageTemplate] {
        &self.definition.stages
    }

    /// Returns the declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterDefinition] {
        &self.definition.parameters
    }

    /// Returns the config bindings.
    #[must_use]
    pub const fn bindings(&self) -> &BTreeMap<String, String> {
        &self.definition.bindings
    }

    /// Returns the full definition.
    #[must_use]
    pub const fn definition(&self) -> &TemplateDefinition {
        &self.definition
    }

    /// Returns the provenance.
    #[must_use]
    pub const fn provenance(&self) -> &TemplateProvenance {
        &self.provenance
    }

    /// Returns `true` for templates shipped with the control plane.
    #[must_use]
    pub const fn is_builtin(&self) -> bool {
        matches!(self.provenance, TemplateProvenance::BuiltIn { .. })
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Replaces the template content, keeping its identifier.
    pub fn revise(&mut self, mut definition: TemplateDefinition, clock: &impl Clock) {
        definition.id = self.definition.id.clone();
        self.definition = definition;
        self.updated_at = clock.utc();
    }
}
