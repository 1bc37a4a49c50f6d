//! Language files: localizable texts of one or more objects

use async_trait::async_trait;

use super::{fill, fill_language_key, fill_position, gate, position_catalog, PlaceholderInfo, TopicResolver};
use crate::context::{RenderContext, Subject};
use crate::engine::RenderSession;
use crate::error::RenderError;
use crate::kind::TemplateKind;
use crate::model::{FlexFieldObject, LanguageKey};
use crate::parser::{join_list_items, BlockCursor, Indent, ListPosition, Pattern};
use crate::services::KeyRequest;

pub struct LanguageResolver;

/// One localizable text and the request creating its key
#[derive(Debug, Clone)]
struct LanguageEntry {
    request: KeyRequest,
    value: String,
}

fn entries(objects: &[FlexFieldObject]) -> Vec<LanguageEntry> {
    let mut entries = Vec::new();
    for object in objects {
        let name = KeyRequest::for_name(&object.id, &object.name, object.object_type);
        entries.push(LanguageEntry {
            request: name.clone(),
            value: object.name.clone(),
        });
        for field in object.fields.iter().filter(|f| f.is_localizable()) {
            entries.push(LanguageEntry {
                request: name.clone().with_field(&field.id, &field.name, &field.value),
                value: field.value.clone(),
            });
        }
    }
    entries
}

#[async_trait]
impl TopicResolver for LanguageResolver {
    fn name(&self) -> &'static str {
        "language"
    }

    fn is_applicable(&self, kind: TemplateKind) -> bool {
        kind == TemplateKind::LanguageFile
    }

    async fn resolve(
        &self,
        _kind: TemplateKind,
        text: String,
        context: &RenderContext,
        session: &mut RenderSession,
    ) -> Result<String, RenderError> {
        let entries = match &context.subject {
            Subject::Object(object) => entries(std::slice::from_ref(object)),
            Subject::Objects(objects) => entries(objects),
            other => {
                return Err(RenderError::SubjectMismatch {
                    resolver: self.name(),
                    found: other.type_name(),
                })
            }
        };

        let text = render_keys(text, &entries, session).await?;
        let referenced = &context.referenced_keys;
        let text = gate(&text, "LangKeys_HasReferenced", !referenced.is_empty())?;
        render_referenced(text, referenced, session)
    }

    fn placeholder_catalog(&self, _kind: TemplateKind) -> Vec<PlaceholderInfo> {
        let mut catalog = vec![
            PlaceholderInfo::new("LangKeys_Start/LangKeys_End", "Repeated once per localizable text"),
            PlaceholderInfo::new("LangKey_Key", "Language key of the text"),
            PlaceholderInfo::new("LangKey_Value", "The text itself"),
            PlaceholderInfo::new(
                "LangKeys_HasReferenced_Start/LangKeys_HasReferenced_End",
                "Kept if the export references language keys of other objects",
            ),
            PlaceholderInfo::new(
                "LangKeys_Referenced_Start/LangKeys_Referenced_End",
                "Repeated once per referenced language key",
            ),
        ];
        catalog.extend(position_catalog("LangKey", "text"));
        catalog
    }
}

async fn render_keys(
    text: String,
    entries: &[LanguageEntry],
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let escape = session.services().escape.clone();
    let start = Pattern::literal("LangKeys_Start")?;
    let end = Pattern::literal("LangKeys_End")?;
    let mut cursor = BlockCursor::new(text, &start, &end);
    while cursor.next_block().is_some() {
        let template = cursor.inner().to_string();
        let mut rendered = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let body = fill_position(&template, "LangKey", ListPosition::new(index, entries.len()))?;
            let body = fill(&body, "LangKey_Value", Indent::Inline, &escape.escape(&entry.value))?;
            rendered.push(fill_language_key(body, "LangKey_Key", &entry.request, session).await?);
        }
        cursor.replace(&join_list_items(&rendered));
    }
    Ok(cursor.finish())
}

fn render_referenced(
    text: String,
    keys: &[LanguageKey],
    session: &RenderSession,
) -> Result<String, RenderError> {
    let escape = &session.services().escape;
    let start = Pattern::literal("LangKeys_Referenced_Start")?;
    let end = Pattern::literal("LangKeys_Referenced_End")?;
    let mut cursor = BlockCursor::new(text, &start, &end);
    while cursor.next_block().is_some() {
        let template = cursor.inner().to_string();
        let mut rendered = Vec::with_capacity(keys.len());
        for (index, key) in keys.iter().enumerate() {
            let body = fill_position(&template, "LangKey", ListPosition::new(index, keys.len()))?;
            let body = fill(&body, "LangKey_Value", Indent::Inline, &escape.escape(&key.value))?;
            rendered.push(fill(&body, "LangKey_Key", Indent::Inline, &key.key)?);
        }
        cursor.replace(&join_list_items(&rendered));
    }
    Ok(cursor.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldType, FlexField, ObjectType};

    #[test]
    fn test_entries_cover_name_and_text_fields() {
        let npc = FlexFieldObject::new("1", "Goblin", ObjectType::Npc)
            .with_field(FlexField::new("f1", "Greeting", FieldType::Text, "Hello"))
            .with_field(FlexField::new("f2", "Health", FieldType::Number, "10"));
        let values: Vec<String> = entries(&[npc]).into_iter().map(|e| e.value).collect();
        assert_eq!(values, vec!["Goblin", "Hello"]);
    }
}
