//! Built-in template catalogue loaded from embedded data.

use super::template_engine::{TemplateEngine, TemplateError};
use crate::pipeline::domain::{
    PipelineTemplate, ProviderType, TemplateDefinition, TemplateId, TemplateProvenance,
};
use mockable::Clock;
use sha2::{Digest, Sha256};

const BUILTIN_TEMPLATES: &str = include_str!("../../../assets/builtin_templates.json");

/// Immutable set of templates shipped with the control plane.
///
/// Built-in templates use the same [`PipelineTemplate`] structure as stored
/// ones and differ only in their provenance.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: Vec<PipelineTemplate>,
}

impl TemplateCatalog {
    /// Loads the embedded built-in templates.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::InvalidCatalog`] when the asset cannot be
    /// decoded, or the validation error of the first malformed template.
    pub fn builtin(clock: &impl Clock) -> Result<Self, TemplateError> {
        Self::from_json(BUILTIN_TEMPLATES, clock)
    }

    /// Loads templates from a JSON array of template definitions.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::InvalidCatalog`] when `source` cannot be
    /// decoded, or the validation error of the first malformed template.
    pub fn from_json(source: &str, clock: &impl Clock) -> Result<Self, TemplateError> {
        let definitions: Vec<TemplateDefinition> = serde_json::from_str(source)
            .map_err(|err| TemplateError::InvalidCatalog(err.to_string()))?;
        let digest = hex_digest(source);
        let engine = TemplateEngine::new();
        let templates = definitions
            .into_iter()
            .map(|definition| -> Result<PipelineTemplate, TemplateError> {
                engine.validate(&definition)?;
                Ok(PipelineTemplate::with_provenance(
                    definition,
                    TemplateProvenance::BuiltIn {
                        digest: digest.clone(),
                    },
                    clock,
                ))
            })
            .collect::<Result<Vec<_>, TemplateError>>()?;
        Ok(Self { templates })
    }

    /// Finds a template by identifier.
    #[must_use]
    pub fn get(&self, id: &TemplateId) -> Option<&PipelineTemplate> {
        self.templates.iter().find(|template| template.id() == id)
    }

    /// Returns the templates targeting `provider`.
    #[must_use]
    pub fn for_provider(&self, provider: ProviderType) -> Vec<PipelineTemplate> {
        self.templates
            .iter()
            .filter(|template| template.provider() == provider)
            .cloned()
            .collect()
    }

    /// Returns every template.
    #[must_use]
    pub fn templates(&self) -> &[PipelineTemplate] {
        &self.templates
    }
}

fn hex_digest(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    digest
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            out.push_str(&format!("{byte:02x}"));
            out
        })
}
