//! Export configuration
//!
//! Loaded from TOML. Every section is optional; missing keys fall back to
//! the defaults below.
//!
//! ```toml
//! [export]
//! project_id = "my-game"
//! fail_on_diagnostics = true
//! max_render_depth = 16
//!
//! [escape]
//! escape_character = "\\"
//! characters_needing_escaping = "\"\\"
//! newline_character = "\\n"
//!
//! [templates]
//! object-npc = "-- {{Npc_Name}}"
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::kind::TemplateKind;

/// Errors that can occur when loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Default nesting limit for recursive renders
pub const DEFAULT_MAX_RENDER_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub project_id: String,
    /// Treat any diagnostic as a failed export
    pub fail_on_diagnostics: bool,
    pub max_render_depth: usize,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            project_id: "default".to_string(),
            fail_on_diagnostics: false,
            max_render_depth: DEFAULT_MAX_RENDER_DEPTH,
        }
    }
}

/// How text values are escaped for the target language's string literals
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EscapeSettings {
    pub escape_character: String,
    pub characters_needing_escaping: String,
    /// Replacement for line breaks inside a value
    pub newline_character: String,
}

impl Default for EscapeSettings {
    fn default() -> Self {
        Self {
            escape_character: "\\".to_string(),
            characters_needing_escaping: "\"\\".to_string(),
            newline_character: "\\n".to_string(),
        }
    }
}

impl EscapeSettings {
    pub fn escape(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for c in value.chars() {
            match c {
                '\r' => {}
                '\n' => out.push_str(&self.newline_character),
                c if self.characters_needing_escaping.contains(c) => {
                    out.push_str(&self.escape_character);
                    out.push(c);
                }
                c => out.push(c),
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub export: ExportSettings,
    pub escape: EscapeSettings,
    /// Default-template overrides keyed by template kind
    pub templates: HashMap<TemplateKind, String>,
}

impl ExportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.export.project_id = project_id.into();
        self
    }

    pub fn with_max_render_depth(mut self, depth: usize) -> Self {
        self.export.max_render_depth = depth;
        self
    }

    /// Override the default template of one kind
    pub fn with_template(mut self, kind: TemplateKind, text: impl Into<String>) -> Self {
        self.templates.insert(kind, text.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ExportConfig::from_str("").unwrap();
        assert_eq!(config, ExportConfig::default());
        assert_eq!(config.export.max_render_depth, DEFAULT_MAX_RENDER_DEPTH);
    }

    #[test]
    fn test_parse_full_config() {
        let config = ExportConfig::from_str(
            r#"
[export]
project_id = "my-game"
fail_on_diagnostics = true

[escape]
escape_character = "%"
characters_needing_escaping = "'"

[templates]
object-npc = "-- {{Npc_Name}}"
"#,
        )
        .unwrap();

        assert_eq!(config.export.project_id, "my-game");
        assert!(config.export.fail_on_diagnostics);
        assert_eq!(config.export.max_render_depth, DEFAULT_MAX_RENDER_DEPTH);
        assert_eq!(config.escape.escape_character, "%");
        assert_eq!(config.escape.newline_character, "\\n");
        assert_eq!(
            config.templates.get(&TemplateKind::ObjectNpc).map(String::as_str),
            Some("-- {{Npc_Name}}")
        );
    }

    #[test]
    fn test_unknown_template_kind_is_rejected() {
        let result = ExportConfig::from_str("[templates]\nobject-dragon = \"x\"\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_escape_default() {
        let escape = EscapeSettings::default();
        assert_eq!(escape.escape("say \"hi\"\r\nnow"), "say \\\"hi\\\"\\nnow");
        assert_eq!(escape.escape("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_builder_setters() {
        let config = ExportConfig::new()
            .with_project_id("p")
            .with_max_render_depth(3)
            .with_template(TemplateKind::ObjectItem, "{{Item_Name}}");
        assert_eq!(config.export.project_id, "p");
        assert_eq!(config.export.max_render_depth, 3);
        assert_eq!(config.templates.len(), 1);
    }
}
