//! Default template provider
//!
//! Resolvers that splice a nested artifact into their output (an item's
//! details inside an NPC's inventory, a dialog function, a field listing)
//! fetch the canonical template for that artifact's kind from a
//! [`TemplateProvider`]. The crate ships built-in defaults for every kind;
//! projects override them through configuration.

mod cache;
mod defaults;
mod registry;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::kind::TemplateKind;

pub use cache::CachedTemplateProvider;
pub use defaults::builtin_template;
pub use registry::TemplateRegistry;

/// Rendering-engine tag of templates this crate can resolve
pub const PLACEHOLDER_ENGINE: &str = "placeholder";

/// A default template together with the engine that renders it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultTemplate {
    pub text: String,
    pub engine_tag: String,
}

impl DefaultTemplate {
    /// A template for the placeholder engine
    pub fn placeholder(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            engine_tag: PLACEHOLDER_ENGINE.to_string(),
        }
    }
}

#[async_trait]
pub trait TemplateProvider: Send + Sync {
    async fn default_template(
        &self,
        project_id: &str,
        kind: TemplateKind,
    ) -> Result<DefaultTemplate, ServiceError>;
}
