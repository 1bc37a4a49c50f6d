//! Template registry: built-in defaults plus per-kind overrides

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use super::{builtin_template, DefaultTemplate, TemplateProvider};
use crate::config::ExportConfig;
use crate::error::ServiceError;
use crate::kind::TemplateKind;

/// Registry answering default-template lookups
///
/// Overrides win over the built-in templates. The registry serves every
/// project id the same way.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    overrides: HashMap<TemplateKind, DefaultTemplate>,
}

impl TemplateRegistry {
    /// Create a registry serving only the built-in templates
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the overrides from a configuration
    pub fn from_config(config: &ExportConfig) -> Self {
        let mut registry = Self::new();
        for (kind, text) in &config.templates {
            registry.set(*kind, text.clone());
        }
        registry
    }

    /// Override the template of one kind
    pub fn set(&mut self, kind: TemplateKind, text: impl Into<String>) {
        self.overrides.insert(kind, DefaultTemplate::placeholder(text));
    }

    /// Override the template of one kind with a file's contents
    pub fn load_file(&mut self, kind: TemplateKind, path: &Path) -> Result<(), ServiceError> {
        let text = std::fs::read_to_string(path)?;
        self.set(kind, text);
        Ok(())
    }

    /// Get the effective template of a kind
    pub fn get(&self, kind: TemplateKind) -> DefaultTemplate {
        self.overrides
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| DefaultTemplate::placeholder(builtin_template(kind)))
    }
}

#[async_trait]
impl TemplateProvider for TemplateRegistry {
    async fn default_template(
        &self,
        _project_id: &str,
        kind: TemplateKind,
    ) -> Result<DefaultTemplate, ServiceError> {
        Ok(self.get(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::PLACEHOLDER_ENGINE;

    #[test]
    fn test_registry_falls_back_to_builtin() {
        let registry = TemplateRegistry::new();
        let template = registry.get(TemplateKind::TaleFunctionCall);
        assert_eq!(template.text, builtin_template(TemplateKind::TaleFunctionCall));
        assert_eq!(template.engine_tag, PLACEHOLDER_ENGINE);
    }

    #[test]
    fn test_registry_override() {
        let mut registry = TemplateRegistry::new();
        registry.set(TemplateKind::ObjectItem, "{{Item_Name}}");
        assert_eq!(registry.get(TemplateKind::ObjectItem).text, "{{Item_Name}}");
        assert_eq!(
            registry.get(TemplateKind::ObjectNpc).text,
            builtin_template(TemplateKind::ObjectNpc)
        );
    }

    #[test]
    fn test_registry_from_config() {
        let config = ExportConfig::new().with_template(TemplateKind::ObjectSkill, "{{Skill_Id}}");
        let registry = TemplateRegistry::from_config(&config);
        assert_eq!(registry.get(TemplateKind::ObjectSkill).text, "{{Skill_Id}}");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let mut registry = TemplateRegistry::new();
        let result = registry.load_file(TemplateKind::ObjectNpc, Path::new("/nonexistent/npc.tpl"));
        assert!(matches!(result, Err(ServiceError::Io(_))));
    }

    #[tokio::test]
    async fn test_provider_serves_any_project() {
        let registry = TemplateRegistry::new();
        let a = registry.default_template("a", TemplateKind::ObjectNpc).await.unwrap();
        let b = registry.default_template("b", TemplateKind::ObjectNpc).await.unwrap();
        assert_eq!(a, b);
    }
}
