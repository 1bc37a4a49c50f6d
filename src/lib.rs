//! Content Export - placeholder template resolution for game-design exports
//!
//! This library renders domain records (NPCs, items, skills, dialogs, daily
//! routines, localized texts) into arbitrary target-language files using
//! user-authored templates with `{{Placeholder}}` markers.
//!
//! A render runs an ordered pipeline of topic resolvers over the template.
//! Resolvers may re-enter the pipeline to render nested default templates;
//! every problem on the way is collected as a diagnostic instead of aborting.
//!
//! # Example
//!
//! ```rust,no_run
//! use content_export::{
//!     render, FlexFieldObject, InMemoryRecordStore, ObjectType, RenderContext, Services,
//!     TemplateKind,
//! };
//!
//! # async fn example() -> Result<(), content_export::RenderError> {
//! let goblin = FlexFieldObject::new("npc-1", "Goblin", ObjectType::Npc);
//! let services = Services::in_memory(InMemoryRecordStore::new().with_object(goblin.clone()));
//!
//! let output = render(
//!     services,
//!     TemplateKind::ObjectNpc,
//!     "name = \"{{Npc_Name}}\"",
//!     &RenderContext::for_object(goblin),
//! )
//! .await?;
//! assert_eq!(output.text, "name = \"Goblin\"");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod kind;
pub mod model;
pub mod parser;
pub mod resolvers;
pub mod services;
pub mod template;

pub use config::{ConfigError, EscapeSettings, ExportConfig, ExportSettings};
pub use context::{DialogStep, EventFunction, RenderContext, Subject};
pub use diagnostics::{Diagnostic, DiagnosticKind, ErrorCollection};
pub use engine::{Engine, EngineBuilder, RenderOutput, RenderRequest, RenderSession};
pub use error::{RenderError, ServiceError, ValidationIssue};
pub use kind::TemplateKind;
pub use model::{
    Dialog, DialogNode, DialogNodeKind, ExportSnippet, FieldType, FlexField, FlexFieldObject,
    InventoryEntry, LanguageKey, ObjectType, ScheduleEvent, Script, ScriptFunction, TimeOfDay,
};
pub use parser::ValidationReport;
pub use resolvers::{PlaceholderInfo, TopicResolver};
pub use services::{
    InMemoryLanguageKeys, InMemoryRecordStore, KeyRequest, LanguageKeyGenerator, ProjectData,
    RecordStore, ScriptFunctionGenerator, SectionScriptGenerator, Services,
};
pub use template::{CachedTemplateProvider, DefaultTemplate, TemplateProvider, TemplateRegistry};

/// Render a template with the standard resolver pipeline
///
/// Builds a fresh [`Engine`] over `services`. Callers rendering many
/// templates should build the engine once and reuse it.
pub async fn render(
    services: Services,
    kind: TemplateKind,
    text: &str,
    context: &RenderContext,
) -> Result<RenderOutput, RenderError> {
    let engine = Engine::standard(services)?;
    engine.render(kind, text, context).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_render_simple_object() {
        let goblin = FlexFieldObject::new("npc-1", "Goblin", ObjectType::Npc);
        let services = Services::in_memory(InMemoryRecordStore::new());
        let output = render(
            services,
            TemplateKind::ObjectNpc,
            "{{Npc_Id}}: {{Npc_Name}}",
            &RenderContext::for_object(goblin),
        )
        .await
        .unwrap();
        assert_eq!(output.text, "npc-1: Goblin");
        assert!(!output.has_diagnostics());
    }

    #[tokio::test]
    async fn test_render_reports_subject_mismatch() {
        let services = Services::in_memory(InMemoryRecordStore::new());
        let context = RenderContext::new(Subject::Objects(Vec::new()), ObjectType::Npc);
        let output = render(services, TemplateKind::ObjectNpc, "{{Npc_Name}}", &context)
            .await
            .unwrap();
        assert_eq!(output.text, "{{Npc_Name}}");
        assert!(output.count(DiagnosticKind::MalformedTemplate) > 0);
    }
}
