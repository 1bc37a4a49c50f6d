//! Integration tests for the render pipeline: catalogs, gating, lists,
//! diagnostics, nesting, cancellation and concurrency

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use content_export::{
    DefaultTemplate, DiagnosticKind, Engine, FieldType, FlexField, FlexFieldObject,
    InMemoryRecordStore, ObjectType, PlaceholderInfo, RenderContext, RenderError, RenderRequest,
    RenderSession, ServiceError, Services, TemplateKind, TemplateProvider, TemplateRegistry,
    TopicResolver,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

fn goblin() -> FlexFieldObject {
    FlexFieldObject::new("npc-1", "Goblin", ObjectType::Npc)
        .with_field(FlexField::new("f1", "Health", FieldType::Number, "10"))
        .with_field(FlexField::new("f2", "Mood", FieldType::Text, "grumpy"))
}

fn engine() -> Engine {
    Engine::standard(Services::in_memory(InMemoryRecordStore::new())).expect("standard engine")
}

async fn render_npc(engine: &Engine, object: FlexFieldObject, text: &str) -> content_export::RenderOutput {
    engine
        .render(TemplateKind::ObjectNpc, text, &RenderContext::for_object(object))
        .await
        .expect("render should not be cancelled")
}

// ============================================================================
// Catalogs
// ============================================================================

#[test]
fn test_catalog_is_stable_and_unique() {
    let engine = engine();
    for kind in TemplateKind::ALL {
        let first = engine.placeholder_catalog(kind);
        let second = engine.placeholder_catalog(kind);
        assert_eq!(first, second, "catalog of {} changed between calls", kind);

        let mut names = HashSet::new();
        for info in &first {
            assert!(names.insert(info.name.clone()), "{} lists {} twice", kind, info.name);
        }
    }
}

#[test]
fn test_catalog_of_step_kinds() {
    let engine = engine();
    let names = |kind| {
        engine
            .placeholder_catalog(kind)
            .into_iter()
            .map(|info| info.name)
            .collect::<Vec<_>>()
            .join("\n")
    };

    insta::assert_snapshot!(names(TemplateKind::TaleFunctionCall), @"Tale_Call_Function");
    insta::assert_snapshot!(names(TemplateKind::TaleAction), @r"
    Tale_Action_Name
    Tale_Action_Value
    ");
}

#[test]
fn test_pipeline_order() {
    let engine = engine();
    assert_eq!(
        engine.pipeline(TemplateKind::ObjectNpc),
        vec!["snippets", "dialog", "daily-routine", "inventory", "skills", "flex-field"]
    );
    assert_eq!(engine.pipeline(TemplateKind::ObjectFieldList), vec!["field-list"]);
    assert_eq!(engine.pipeline(TemplateKind::LanguageFile), vec!["language"]);
}

// ============================================================================
// Object placeholders
// ============================================================================

#[tokio::test]
async fn test_missing_field_marker() {
    let output = render_npc(&engine(), goblin(), "speed = {{Npc_Value_Speed}}").await;
    assert_eq!(output.text, "speed = <<Goblin[Speed] MISSING>>");
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.count(DiagnosticKind::MissingReference), 1);
}

#[tokio::test]
async fn test_field_names_fold_non_ascii_case() {
    let npc = goblin().with_field(FlexField::new("f3", "Ärger", FieldType::Text, "hoch"));
    let output = render_npc(
        &engine(),
        npc,
        "{{Npc_HasField_ÄRGER_Start}}anger = {{Npc_Value_ärger}}{{Npc_HasField_End}}",
    )
    .await;
    assert_eq!(output.text, "anger = hoch");
    assert!(!output.has_diagnostics());
}

#[tokio::test]
async fn test_field_conditionals() {
    let template = "{{Npc_HasField_Health_Start}}hp{{Npc_HasField_End}}\
                    {{Npc_HasNotField_Mana_Start}} no mana{{Npc_HasNotField_End}}\
                    {{Npc_Value_Health_Equals_10.0_Start}} ten{{Npc_Value_Equals_End}}\
                    {{Npc_Value_Mood_NotEquals_grumpy_Start}} happy{{Npc_Value_NotEquals_End}}";
    let output = render_npc(&engine(), goblin(), template).await;
    assert_eq!(output.text, "hp no mana ten");
    assert!(!output.has_diagnostics());
}

#[tokio::test]
async fn test_all_fields_keeps_indentation() {
    let npc = FlexFieldObject::new("npc-1", "Goblin", ObjectType::Npc)
        .with_field(FlexField::new("f1", "A", FieldType::Number, "1"))
        .with_field(FlexField::new("f2", "B", FieldType::Text, "x"));
    let output = render_npc(&engine(), npc, "fields = {\n  {{Npc_AllFields}}\n}\n").await;
    assert_eq!(output.text, "fields = {\n  [\"A\"] = 1,\n  [\"B\"] = \"x\"\n}\n");
    assert!(!output.has_diagnostics());
}

#[tokio::test]
async fn test_unused_fields_ignore_placeholder_order() {
    let npc = || {
        FlexFieldObject::new("npc-1", "Goblin", ObjectType::Npc)
            .with_field(FlexField::new("f1", "A", FieldType::Text, "a"))
            .with_field(FlexField::new("f2", "B", FieldType::Text, "b"))
    };
    let engine = engine();

    let value_first = render_npc(
        &engine,
        npc(),
        "{{Npc_Value_A}}|{{Npc_HasUnusedFields_Start}}yes{{Npc_HasUnusedFields_End}}|{{Npc_UnusedFields}}",
    )
    .await;
    assert_eq!(value_first.text, "a|yes|[\"B\"] = \"b\"");

    let aggregate_first = render_npc(
        &engine,
        npc(),
        "{{Npc_UnusedFields}}|{{Npc_HasUnusedFields_Start}}yes{{Npc_HasUnusedFields_End}}|{{Npc_Value_A}}",
    )
    .await;
    assert_eq!(aggregate_first.text, "[\"B\"] = \"b\"|yes|a");

    let all_used = render_npc(
        &engine,
        npc(),
        "{{Npc_Value_A}}{{Npc_Value_B}}{{Npc_HasUnusedFields_Start}}yes{{Npc_HasUnusedFields_End}}",
    )
    .await;
    assert_eq!(all_used.text, "ab");
}

/// Serves every kind in a foreign template language
struct ForeignTemplates;

#[async_trait]
impl TemplateProvider for ForeignTemplates {
    async fn default_template(&self, _project_id: &str, _kind: TemplateKind) -> Result<DefaultTemplate, ServiceError> {
        Ok(DefaultTemplate {
            text: "{{ for f in fields }}".to_string(),
            engine_tag: "scriban".to_string(),
        })
    }
}

#[tokio::test]
async fn test_unsupported_template_engine() {
    let services = Services::in_memory(InMemoryRecordStore::new()).with_templates(Arc::new(ForeignTemplates));
    let engine = Engine::standard(services).expect("standard engine");

    let output = render_npc(&engine, goblin(), "{{Npc_AllFields}}").await;
    assert_eq!(output.text, "");
    assert_eq!(output.count(DiagnosticKind::UpstreamFailure), 1);
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_malformed_block_left_verbatim() {
    let engine = engine();
    let report = engine.validate("{{Npc_HasField_A_Start}}x");
    assert!(!report.valid);
    assert_eq!(report.issues.len(), 1);

    let output = render_npc(&engine, goblin(), "{{Npc_HasField_A_Start}}x").await;
    assert_eq!(output.text, "{{Npc_HasField_A_Start}}x");
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.count(DiagnosticKind::MalformedTemplate), 1);
}

#[tokio::test]
async fn test_nested_tables_are_not_placeholders() {
    let engine = engine();
    let template = "local grid = {{1, 2}, {3, 4}}\nname = \"{{Npc_Name}}\"";
    assert!(engine.validate(template).valid);

    let output = render_npc(&engine, goblin(), template).await;
    assert_eq!(output.text, "local grid = {{1, 2}, {3, 4}}\nname = \"Goblin\"");
    assert!(!output.has_diagnostics());
}

#[test]
fn test_default_templates_validate() {
    let engine = engine();
    for kind in TemplateKind::ALL {
        let registry = TemplateRegistry::new();
        let report = engine.validate(&registry.get(kind).text);
        assert!(report.valid, "default template of {} is malformed: {:?}", kind, report.issues);
    }
}

// ============================================================================
// Nested renders
// ============================================================================

/// Re-renders `{{Recurse}}` inside itself until the depth limit stops it
struct Recurse {
    breadcrumbs: Arc<Mutex<Vec<(Vec<String>, Vec<String>)>>>,
}

#[async_trait]
impl TopicResolver for Recurse {
    fn name(&self) -> &'static str {
        "recurse"
    }

    fn is_applicable(&self, _kind: TemplateKind) -> bool {
        true
    }

    async fn resolve(
        &self,
        kind: TemplateKind,
        text: String,
        context: &RenderContext,
        session: &mut RenderSession,
    ) -> Result<String, RenderError> {
        let scope = session.errors_mut().push_context("resolving");
        let before = session.errors().breadcrumb().to_vec();
        let label = format!("level {}", session.depth());
        let nested = session
            .render(RenderRequest::new(kind, "{{Recurse}}", context.clone()).with_label(label))
            .await;
        let after = session.errors().breadcrumb().to_vec();
        self.breadcrumbs.lock().unwrap().push((before, after));
        let nested = session.recover(nested);
        session.errors_mut().restore(scope);
        Ok(text.replace("{{Recurse}}", &format!("({})", nested?)))
    }

    fn placeholder_catalog(&self, _kind: TemplateKind) -> Vec<PlaceholderInfo> {
        vec![PlaceholderInfo::new("Recurse", "Renders itself again")]
    }
}

#[tokio::test]
async fn test_recursion_limit_and_breadcrumbs() {
    let breadcrumbs = Arc::new(Mutex::new(Vec::new()));
    let engine = Engine::builder(Services::in_memory(InMemoryRecordStore::new()))
        .register(0, Recurse { breadcrumbs: Arc::clone(&breadcrumbs) })
        .with_max_render_depth(3)
        .build()
        .expect("engine");

    let context = RenderContext::for_object(goblin());
    let output = engine
        .render(TemplateKind::TaleAction, "{{Recurse}}", &context)
        .await
        .expect("render should not be cancelled");

    assert_eq!(output.text, "(((())))");
    assert_eq!(output.diagnostics.len(), 1);
    let diagnostic = &output.diagnostics[0];
    assert_eq!(diagnostic.kind, DiagnosticKind::MalformedTemplate);
    assert_eq!(
        diagnostic.breadcrumb,
        vec!["resolving", "level 0", "resolving", "level 1", "resolving", "level 2", "resolving"]
    );

    let breadcrumbs = breadcrumbs.lock().unwrap();
    assert_eq!(breadcrumbs.len(), 4);
    for (before, after) in breadcrumbs.iter() {
        assert_eq!(before, after);
    }
}

// ============================================================================
// Cancellation and concurrency
// ============================================================================

/// Cancels the render it runs in
struct CancelNow;

#[async_trait]
impl TopicResolver for CancelNow {
    fn name(&self) -> &'static str {
        "cancel"
    }

    fn is_applicable(&self, _kind: TemplateKind) -> bool {
        true
    }

    async fn resolve(
        &self,
        _kind: TemplateKind,
        text: String,
        _context: &RenderContext,
        session: &mut RenderSession,
    ) -> Result<String, RenderError> {
        session.cancellation().cancel();
        Ok(text)
    }

    fn placeholder_catalog(&self, _kind: TemplateKind) -> Vec<PlaceholderInfo> {
        Vec::new()
    }
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = engine()
        .render_with_cancellation(
            TemplateKind::ObjectNpc,
            "{{Npc_Name}}",
            &RenderContext::for_object(goblin()),
            cancel,
        )
        .await;
    assert!(matches!(result, Err(RenderError::Cancelled)));
}

#[tokio::test]
async fn test_cancelled_between_resolvers() {
    let engine = Engine::standard_builder(Services::in_memory(InMemoryRecordStore::new()))
        .register(0, CancelNow)
        .build()
        .expect("engine");
    let result = engine
        .render(TemplateKind::ObjectNpc, "{{Npc_Name}}", &RenderContext::for_object(goblin()))
        .await;
    assert!(matches!(result, Err(RenderError::Cancelled)));
}

#[tokio::test]
async fn test_concurrent_renders_are_isolated() {
    let engine = engine();
    let orc = FlexFieldObject::new("npc-2", "Orc", ObjectType::Npc)
        .with_field(FlexField::new("f1", "Speed", FieldType::Number, "4"));

    let (goblin_output, orc_output) = tokio::join!(
        render_npc(&engine, goblin(), "{{Npc_Name}} {{Npc_Value_Speed}}"),
        render_npc(&engine, orc, "{{Npc_Name}} {{Npc_Value_Speed}}"),
    );

    assert_eq!(goblin_output.text, "Goblin <<Goblin[Speed] MISSING>>");
    assert_eq!(goblin_output.count(DiagnosticKind::MissingReference), 1);
    assert_eq!(orc_output.text, "Orc 4");
    assert!(!orc_output.has_diagnostics());
}
