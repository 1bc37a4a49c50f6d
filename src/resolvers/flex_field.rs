//! Flex-field resolver: an object's id, name and dynamic attributes
//!
//! One resolver serves every object namespace. The prefix is passed per
//! call, so the same code renders `Npc_*` at the top level and
//! `Inventory_Item_*` for items nested in an NPC's inventory.
//!
//! Resolution runs in three passes:
//! 1. conditionals (`HasField`, `HasNotField`, `Equals`, `NotEquals`)
//! 2. scalars, which record every field they read in a [`FieldUsage`]
//! 3. aggregates (`HasUnusedFields`, `UnusedFields`, `AllFields`), which
//!    read the finished usage set

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{fill, fill_language_key, gate, subject_object, PlaceholderInfo, TopicResolver};
use crate::context::{RenderContext, Subject};
use crate::engine::RenderSession;
use crate::error::RenderError;
use crate::kind::TemplateKind;
use crate::model::{FlexField, FlexFieldObject, ObjectType};
use crate::parser::{render_conditional, BlockFamily, Indent, Pattern, ScalarCursor};
use crate::services::KeyRequest;

pub struct FlexFieldResolver;

#[async_trait]
impl TopicResolver for FlexFieldResolver {
    fn name(&self) -> &'static str {
        "flex-field"
    }

    fn is_applicable(&self, kind: TemplateKind) -> bool {
        kind.default_prefix().is_some()
    }

    async fn resolve(
        &self,
        kind: TemplateKind,
        text: String,
        context: &RenderContext,
        session: &mut RenderSession,
    ) -> Result<String, RenderError> {
        let Some(prefix) = kind.default_prefix() else {
            return Ok(text);
        };
        let object = subject_object(self.name(), context)?;
        resolve_object(text, object, context.object_type, prefix, session).await
    }

    fn placeholder_catalog(&self, kind: TemplateKind) -> Vec<PlaceholderInfo> {
        kind.default_prefix().map(catalog).unwrap_or_default()
    }

    fn block_families(&self) -> Result<Vec<BlockFamily>, regex::Error> {
        Ok(vec![
            BlockFamily::new(Pattern::new(".+_HasField_.+_Start")?, Pattern::new(".+_HasField_End")?),
            BlockFamily::new(
                Pattern::new(".+_HasNotField_.+_Start")?,
                Pattern::new(".+_HasNotField_End")?,
            ),
            BlockFamily::new(
                Pattern::new(".+_Value_.+_NotEquals_.+_Start")?,
                Pattern::new(".+_Value_NotEquals_End")?,
            ),
            BlockFamily::new(
                Pattern::new(".+_Value_.+_Equals_.+_Start")?,
                Pattern::new(".+_Value_Equals_End")?,
            ),
        ])
    }
}

fn catalog(prefix: &str) -> Vec<PlaceholderInfo> {
    let p = |rest: &str| format!("{}_{}", prefix, rest);
    vec![
        PlaceholderInfo::new(p("Id"), "Id of the object"),
        PlaceholderInfo::new(p("Name"), "Name of the object"),
        PlaceholderInfo::new(p("Name_LangKey"), "Language key of the object's name"),
        PlaceholderInfo::new(p("Value_<Field>"), "Value of a field, looked up by name or alias"),
        PlaceholderInfo::new(p("Value_<Field>_LangKey"), "Language key of a field's value"),
        PlaceholderInfo::new(
            format!("{}_HasField_<Field>_Start/{}_HasField_End", prefix, prefix),
            "Kept if the object has the field",
        ),
        PlaceholderInfo::new(
            format!("{}_HasNotField_<Field>_Start/{}_HasNotField_End", prefix, prefix),
            "Kept if the object lacks the field",
        ),
        PlaceholderInfo::new(
            format!("{}_Value_<Field>_Equals_<Value>_Start/{}_Value_Equals_End", prefix, prefix),
            "Kept if the field has the given value",
        ),
        PlaceholderInfo::new(
            format!("{}_Value_<Field>_NotEquals_<Value>_Start/{}_Value_NotEquals_End", prefix, prefix),
            "Kept if the field does not have the given value",
        ),
        PlaceholderInfo::new(
            format!("{}_HasUnusedFields_Start/{}_HasUnusedFields_End", prefix, prefix),
            "Kept if some fields are not referenced by a value placeholder",
        ),
        PlaceholderInfo::new(p("UnusedFields"), "Field list of the fields not referenced elsewhere"),
        PlaceholderInfo::new(p("AllFields"), "Field list of all fields"),
    ]
}

/// Fields read by scalar placeholders during one object pass
#[derive(Debug, Default)]
pub(crate) struct FieldUsage {
    used: HashSet<String>,
}

impl FieldUsage {
    pub fn mark(&mut self, field: &FlexField) {
        self.used.insert(field.id.clone());
    }

    pub fn is_used(&self, field: &FlexField) -> bool {
        self.used.contains(&field.id)
    }

    /// Fields never marked, in object order
    pub fn unused(&self, fields: &[FlexField]) -> Vec<FlexField> {
        fields.iter().filter(|f| !self.is_used(f)).cloned().collect()
    }
}

/// Compare a field value against a template literal
///
/// Identical text is always equal. Otherwise both sides must parse as
/// finite numbers to compare numerically.
fn values_equal(value: &str, expected: &str) -> bool {
    let (value, expected) = (value.trim(), expected.trim());
    if value == expected {
        return true;
    }
    match (value.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) if a.is_finite() && b.is_finite() => a == b,
        _ => false,
    }
}

/// Field value as written into generated code: numbers raw, text escaped
pub(super) fn field_value(field: &FlexField, session: &RenderSession) -> String {
    if field.is_number() {
        field.value.trim().to_string()
    } else {
        session.services().escape.escape(&field.value)
    }
}

/// Resolve every placeholder of `object` under `prefix`
pub async fn resolve_object(
    text: String,
    object: &FlexFieldObject,
    object_type: ObjectType,
    prefix: &str,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let text = resolve_conditionals(&text, object, prefix, session)?;
    let mut usage = FieldUsage::default();
    let text = resolve_scalars(text, object, object_type, prefix, &mut usage, session).await?;
    resolve_aggregates(text, object, object_type, prefix, &usage, session).await
}

fn resolve_conditionals(
    text: &str,
    object: &FlexFieldObject,
    prefix: &str,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let start = Pattern::prefixed(prefix, "HasField_(.*)_Start")?;
    let end = Pattern::prefixed(prefix, "HasField_End")?;
    let text = render_conditional(text, &start, &end, |caps| object.field(&caps[0]).is_some());

    let start = Pattern::prefixed(prefix, "HasNotField_(.*)_Start")?;
    let end = Pattern::prefixed(prefix, "HasNotField_End")?;
    let text = render_conditional(&text, &start, &end, |caps| object.field(&caps[0]).is_none());

    let errors = session.errors_mut();
    let start = Pattern::prefixed(prefix, "Value_(.*)_NotEquals_(.*)_Start")?;
    let end = Pattern::prefixed(prefix, "Value_NotEquals_End")?;
    let text = render_conditional(&text, &start, &end, |caps| match object.field(&caps[0]) {
        Some(field) => !values_equal(&field.value, &caps[1]),
        None => {
            errors.missing(&object.name, &caps[0]);
            false
        }
    });

    let start = Pattern::prefixed(prefix, "Value_(.*)_Equals_(.*)_Start")?;
    let end = Pattern::prefixed(prefix, "Value_Equals_End")?;
    let text = render_conditional(&text, &start, &end, |caps| match object.field(&caps[0]) {
        Some(field) => values_equal(&field.value, &caps[1]),
        None => {
            errors.missing(&object.name, &caps[0]);
            false
        }
    });

    Ok(text)
}

async fn resolve_scalars(
    text: String,
    object: &FlexFieldObject,
    object_type: ObjectType,
    prefix: &str,
    usage: &mut FieldUsage,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let name = session.services().escape.escape(&object.name);
    let text = fill(&text, &format!("{}_Id", prefix), Indent::Inline, &object.id)?;
    let text = fill(&text, &format!("{}_Name", prefix), Indent::Inline, &name)?;

    let name_key = KeyRequest::for_name(&object.id, &object.name, object_type);
    let text = fill_language_key(text, &format!("{}_Name_LangKey", prefix), &name_key, session).await?;

    // Value keys first: `Value_(.*)` would swallow the `_LangKey` suffix
    let pattern = Pattern::prefixed(prefix, "Value_(.*)_LangKey")?;
    let mut cursor = ScalarCursor::new(text, &pattern, Indent::Inline);
    while let Some(caps) = cursor.next_match() {
        let replacement = match object.field(&caps[0]) {
            Some(field) => {
                usage.mark(field);
                let request = name_key.clone().with_field(&field.id, &field.name, &field.value);
                session.checkpoint()?;
                let generator = Arc::clone(&session.services().language_keys);
                let key = generator.get_or_create_key(&request).await.map_err(RenderError::from);
                session.recover(key)?
            }
            None => session.errors_mut().missing(&object.name, &caps[0]),
        };
        cursor.replace(&replacement);
    }
    let text = cursor.finish();

    let pattern = Pattern::prefixed(prefix, "Value_(.*)")?;
    let mut cursor = ScalarCursor::new(text, &pattern, Indent::Capture);
    while let Some(caps) = cursor.next_match() {
        let replacement = match object.field(&caps[0]) {
            Some(field) => {
                usage.mark(field);
                field_value(field, session)
            }
            None => session.errors_mut().missing(&object.name, &caps[0]),
        };
        cursor.replace(&replacement);
    }
    Ok(cursor.finish())
}

async fn resolve_aggregates(
    text: String,
    object: &FlexFieldObject,
    object_type: ObjectType,
    prefix: &str,
    usage: &FieldUsage,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let unused = usage.unused(&object.fields);
    let text = gate(&text, &format!("{}_HasUnusedFields", prefix), !unused.is_empty())?;
    let text = expand_field_list(
        text,
        &format!("{}_UnusedFields", prefix),
        object,
        object_type,
        unused,
        session,
    )
    .await?;
    expand_field_list(
        text,
        &format!("{}_AllFields", prefix),
        object,
        object_type,
        object.fields.clone(),
        session,
    )
    .await
}

/// Replace `{{name}}` with the field-list rendering of `fields`
///
/// The nested render only happens if the placeholder is present, and at
/// most once.
async fn expand_field_list(
    text: String,
    name: &str,
    object: &FlexFieldObject,
    object_type: ObjectType,
    fields: Vec<FlexField>,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let pattern = Pattern::literal(name)?;
    let mut cursor = ScalarCursor::new(text, &pattern, Indent::Capture);
    let mut rendered: Option<String> = None;
    while cursor.next_match().is_some() {
        let value = match &rendered {
            Some(value) => value.clone(),
            None => {
                let context = RenderContext::new(
                    Subject::Object(object.clone()),
                    object_type,
                )
                .with_fields(fields.clone());
                let result = session
                    .render_default(TemplateKind::ObjectFieldList, context, name)
                    .await;
                let value = session.recover(result)?;
                rendered = Some(value.clone());
                value
            }
        };
        cursor.replace(&value);
    }
    Ok(cursor.finish())
}
