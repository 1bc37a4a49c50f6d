//! Field listing for the "all fields" and "unused fields" aggregates

use async_trait::async_trait;

use super::flex_field::field_value;
use super::{
    fill, fill_language_key, fill_position, gate, position_catalog, subject_object,
    PlaceholderInfo, TopicResolver,
};
use crate::context::RenderContext;
use crate::engine::RenderSession;
use crate::error::RenderError;
use crate::kind::TemplateKind;
use crate::model::{FlexField, FlexFieldObject};
use crate::parser::{join_list_items, BlockCursor, Indent, ListPosition, Pattern};
use crate::services::KeyRequest;

pub struct FieldListResolver;

#[async_trait]
impl TopicResolver for FieldListResolver {
    fn name(&self) -> &'static str {
        "field-list"
    }

    fn is_applicable(&self, kind: TemplateKind) -> bool {
        kind == TemplateKind::ObjectFieldList
    }

    async fn resolve(
        &self,
        _kind: TemplateKind,
        text: String,
        context: &RenderContext,
        session: &mut RenderSession,
    ) -> Result<String, RenderError> {
        let object = subject_object(self.name(), context)?;
        let start = Pattern::literal("Fields_Start")?;
        let end = Pattern::literal("Fields_End")?;

        let mut cursor = BlockCursor::new(text, &start, &end);
        while cursor.next_block().is_some() {
            let template = cursor.inner().to_string();
            let mut items = Vec::with_capacity(object.fields.len());
            for (index, field) in object.fields.iter().enumerate() {
                let position = ListPosition::new(index, object.fields.len());
                items.push(render_field(&template, object, field, position, context, session).await?);
            }
            cursor.replace(&join_list_items(&items));
        }
        Ok(cursor.finish())
    }

    fn placeholder_catalog(&self, _kind: TemplateKind) -> Vec<PlaceholderInfo> {
        let mut catalog = vec![
            PlaceholderInfo::new("Fields_Start/Fields_End", "Repeated once per listed field"),
            PlaceholderInfo::new("Field_Id", "Id of the field"),
            PlaceholderInfo::new("Field_Name", "Name of the field"),
            PlaceholderInfo::new("Field_Value", "Value of the field, escaped unless numeric"),
            PlaceholderInfo::new("Field_Type", "Type of the field"),
            PlaceholderInfo::new("Field_LangKey", "Language key of the field's value"),
            PlaceholderInfo::new("Field_IsNumber_Start/Field_IsNumber_End", "Kept for numeric fields"),
            PlaceholderInfo::new("Field_IsText_Start/Field_IsText_End", "Kept for non-numeric fields"),
        ];
        catalog.extend(position_catalog("Field", "field"));
        catalog
    }
}

async fn render_field(
    template: &str,
    object: &FlexFieldObject,
    field: &FlexField,
    position: ListPosition,
    context: &RenderContext,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let text = fill_position(template, "Field", position)?;
    let text = gate(&text, "Field_IsNumber", field.is_number())?;
    let text = gate(&text, "Field_IsText", !field.is_number())?;
    let text = fill(&text, "Field_Id", Indent::Inline, &field.id)?;
    let text = fill(&text, "Field_Name", Indent::Inline, &field.name)?;
    let text = fill(&text, "Field_Type", Indent::Inline, field.field_type.as_str())?;
    let text = fill(&text, "Field_Value", Indent::Capture, &field_value(field, session))?;

    let request = KeyRequest::for_name(&object.id, &object.name, context.object_type)
        .with_field(&field.id, &field.name, &field.value);
    fill_language_key(text, "Field_LangKey", &request, session).await
}
