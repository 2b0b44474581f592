//! Application services for pipeline orchestration.

mod catalog;
mod error;
mod logs;
mod orchestration;
mod resolver;
mod settings;
mod template_engine;

pub use catalog::TemplateCatalog;
pub use error::{INTERNAL_ERROR_MESSAGE, PipelineServiceError, PipelineServiceResult};
pub use logs::LogAccessService;
pub use orchestration::{PipelineOrchestrationService, ProviderStatus};
pub use resolver::ProviderResolver;
pub use settings::{DEFAULT_LIST_LIMIT, DEFAULT_MAX_LOG_ENTRIES, DEFAULT_NAMESPACE, ServiceSettings};
pub use template_engine::{
    TEMPLATE_ID_METADATA_KEY, TEMPLATE_PARAMS_METADATA_KEY, TemplateEngine, TemplateError,
};
