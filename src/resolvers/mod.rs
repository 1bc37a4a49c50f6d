//! Topic resolvers
//!
//! Each resolver owns one placeholder family. The engine runs every
//! applicable resolver over the template text in registration order; a
//! resolver rewrites the placeholders it knows and leaves everything else
//! untouched for the resolvers after it.

mod daily_routine;
mod dialog;
mod field_list;
mod flex_field;
mod inventory;
mod language;
mod skills;
mod snippets;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::context::{RenderContext, Subject};
use crate::engine::RenderSession;
use crate::error::RenderError;
use crate::kind::TemplateKind;
use crate::model::{FlexFieldObject, ObjectType, ScriptFunction};
use crate::parser::{
    render_conditional, replace_scalar, tokenize, trim_blank_lines, BlockFamily, Indent,
    ListPosition, Pattern, ScalarCursor,
};
use crate::services::KeyRequest;

pub use daily_routine::DailyRoutineResolver;
pub use dialog::DialogResolver;
pub use field_list::FieldListResolver;
pub use flex_field::{resolve_object, FlexFieldResolver};
pub use inventory::InventoryResolver;
pub use language::LanguageResolver;
pub use skills::SkillsResolver;
pub use snippets::SnippetResolver;

/// Name and description of one placeholder, for authoring tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceholderInfo {
    pub name: String,
    pub description: String,
}

impl PlaceholderInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

#[async_trait]
pub trait TopicResolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_applicable(&self, kind: TemplateKind) -> bool;

    /// Resolve this resolver's placeholders in `text`
    async fn resolve(
        &self,
        kind: TemplateKind,
        text: String,
        context: &RenderContext,
        session: &mut RenderSession,
    ) -> Result<String, RenderError>;

    fn placeholder_catalog(&self, kind: TemplateKind) -> Vec<PlaceholderInfo>;

    /// Block families closed by a shared `_End` sentinel
    fn block_families(&self) -> Result<Vec<BlockFamily>, regex::Error> {
        Ok(Vec::new())
    }
}

/// Check if any placeholder in `text` starts with `prefix`
pub(crate) fn mentions(text: &str, prefix: &str) -> bool {
    tokenize(text)
        .iter()
        .any(|t| t.is_placeholder() && t.name.starts_with(prefix))
}

/// Replace every `{{name}}` with a fixed value
pub(crate) fn fill(text: &str, name: &str, indent: Indent, value: &str) -> Result<String, RenderError> {
    let pattern = Pattern::literal(name)?;
    Ok(replace_scalar(text, &pattern, indent, |_| value.to_string()))
}

/// Keep or drop every `{{name_Start}} ... {{name_End}}` block
pub(crate) fn gate(text: &str, name: &str, keep: bool) -> Result<String, RenderError> {
    let start = Pattern::literal(&format!("{}_Start", name))?;
    let end = Pattern::literal(&format!("{}_End", name))?;
    Ok(render_conditional(text, &start, &end, |_| keep))
}

/// Resolve the position placeholders of one list item
///
/// Fills `{prefix}_Index` and gates `{prefix}_IsFirst`, `{prefix}_IsNotFirst`,
/// `{prefix}_IsLast` and `{prefix}_IsNotLast`.
pub(crate) fn fill_position(text: &str, prefix: &str, position: ListPosition) -> Result<String, RenderError> {
    let text = gate(text, &format!("{}_IsFirst", prefix), position.is_first)?;
    let text = gate(&text, &format!("{}_IsNotFirst", prefix), !position.is_first)?;
    let text = gate(&text, &format!("{}_IsLast", prefix), position.is_last)?;
    let text = gate(&text, &format!("{}_IsNotLast", prefix), !position.is_last)?;
    fill(&text, &format!("{}_Index", prefix), Indent::Inline, &position.index.to_string())
}

pub(crate) fn position_catalog(prefix: &str, item: &str) -> Vec<PlaceholderInfo> {
    vec![
        PlaceholderInfo::new(format!("{}_Index", prefix), format!("Zero-based index of the {}", item)),
        PlaceholderInfo::new(
            format!("{}_IsFirst_Start/{}_IsFirst_End", prefix, prefix),
            format!("Kept for the first {}", item),
        ),
        PlaceholderInfo::new(
            format!("{}_IsNotFirst_Start/{}_IsNotFirst_End", prefix, prefix),
            format!("Kept for every {} but the first", item),
        ),
        PlaceholderInfo::new(
            format!("{}_IsLast_Start/{}_IsLast_End", prefix, prefix),
            format!("Kept for the last {}", item),
        ),
        PlaceholderInfo::new(
            format!("{}_IsNotLast_Start/{}_IsNotLast_End", prefix, prefix),
            format!("Kept for every {} but the last", item),
        ),
    ]
}

/// Replace every `{{name}}` with a freshly created language key
///
/// The generator is only called for placeholders actually present.
pub(crate) async fn fill_language_key(
    text: String,
    name: &str,
    request: &KeyRequest,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let pattern = Pattern::literal(name)?;
    let mut cursor = ScalarCursor::new(text, &pattern, Indent::Inline);
    while cursor.next_match().is_some() {
        session.checkpoint()?;
        let generator = Arc::clone(&session.services().language_keys);
        let key = generator
            .get_or_create_key(request)
            .await
            .map_err(RenderError::from);
        let key = session.recover(key)?;
        cursor.replace(&key);
    }
    Ok(cursor.finish())
}

/// Render each function through the default template of `kind`
///
/// Results are separated by a blank line. A failing function is reported
/// and left out.
pub(crate) async fn render_functions<F>(
    session: &mut RenderSession,
    kind: TemplateKind,
    functions: &[ScriptFunction],
    object_type: ObjectType,
    subject: F,
) -> Result<String, RenderError>
where
    F: Fn(&ScriptFunction) -> Subject + Send + Sync,
{
    let mut parts = Vec::with_capacity(functions.len());
    for function in functions {
        let context = RenderContext::new(subject(function), object_type);
        let rendered = session
            .render_default(kind, context, format!("Function {}", function.name))
            .await;
        let rendered = session.recover(rendered)?;
        let rendered = trim_blank_lines(&rendered);
        if !rendered.is_empty() {
            parts.push(rendered);
        }
    }
    Ok(parts.join("\n\n"))
}

/// Look up a referenced object
///
/// A failed lookup is reported and yields `None` so the caller can skip the
/// entry; only cancellation is returned as an error.
pub(crate) async fn fetch_object(
    session: &mut RenderSession,
    id: &str,
) -> Result<Option<FlexFieldObject>, RenderError> {
    session.checkpoint()?;
    let records = Arc::clone(&session.services().records);
    match records.object(id).await {
        Ok(object) => Ok(Some(object)),
        Err(err) => {
            let err = RenderError::from(err);
            session.errors_mut().record(err.diagnostic_kind(), err.to_string());
            Ok(None)
        }
    }
}

/// Resolve a referenced object's placeholders under its own breadcrumb
pub(crate) async fn resolve_nested_object(
    text: String,
    object: &FlexFieldObject,
    object_type: ObjectType,
    prefix: &str,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let scope = session
        .errors_mut()
        .push_context(format!("{} {}", object_type, object.name));
    let result = resolve_object(text, object, object_type, prefix, session).await;
    session.errors_mut().restore(scope);
    result
}

/// Render a referenced object through the full pipeline of its own kind
///
/// A failed render is reported and yields an empty string.
pub(crate) async fn render_object_details(
    kind: TemplateKind,
    object: &FlexFieldObject,
    object_type: ObjectType,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let context = RenderContext::new(Subject::Object(object.clone()), object_type);
    let label = format!("{} {}", object_type, object.name);
    let rendered = session.render_default(kind, context, label).await;
    session.recover(rendered)
}

/// The single object a resolver renders
pub(crate) fn subject_object<'a>(
    resolver: &'static str,
    context: &'a RenderContext,
) -> Result<&'a FlexFieldObject, RenderError> {
    match &context.subject {
        Subject::Object(object) => Ok(object),
        other => Err(RenderError::SubjectMismatch {
            resolver,
            found: other.type_name(),
        }),
    }
}

/// Shorten text to a one-line preview
pub(crate) fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 40;
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() > MAX_CHARS {
        let short: String = line.chars().take(MAX_CHARS).collect();
        format!("{}...", short.trim_end())
    } else {
        line.to_string()
    }
}
