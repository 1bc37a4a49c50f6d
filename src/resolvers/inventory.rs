//! NPC inventory: entry list with each item's details spliced in

use async_trait::async_trait;

use super::{
    fetch_object, fill, fill_position, gate, mentions, position_catalog, render_object_details,
    resolve_nested_object, subject_object, PlaceholderInfo, TopicResolver,
};
use crate::context::RenderContext;
use crate::engine::RenderSession;
use crate::error::RenderError;
use crate::kind::TemplateKind;
use crate::model::{FlexFieldObject, InventoryEntry, ObjectType};
use crate::parser::{join_list_items, BlockCursor, Indent, ListPosition, Pattern};

/// Namespace of item placeholders inside an inventory entry
const ITEM_PREFIX: &str = "Inventory_Item";

pub struct InventoryResolver;

#[async_trait]
impl TopicResolver for InventoryResolver {
    fn name(&self) -> &'static str {
        "inventory"
    }

    fn is_applicable(&self, kind: TemplateKind) -> bool {
        kind == TemplateKind::ObjectNpc
    }

    async fn resolve(
        &self,
        _kind: TemplateKind,
        text: String,
        context: &RenderContext,
        session: &mut RenderSession,
    ) -> Result<String, RenderError> {
        if !mentions(&text, "Inventory_") {
            return Ok(text);
        }
        let npc = subject_object(self.name(), context)?;
        let scope = session.errors_mut().push_context("Inventory");
        let result = render_inventory(text, npc, session).await;
        session.errors_mut().restore(scope);
        result
    }

    fn placeholder_catalog(&self, _kind: TemplateKind) -> Vec<PlaceholderInfo> {
        let mut catalog = vec![
            PlaceholderInfo::new(
                "Inventory_HasItems_Start/Inventory_HasItems_End",
                "Kept if the NPC carries at least one item",
            ),
            PlaceholderInfo::new("Inventory_Start/Inventory_End", "Repeated once per inventory entry"),
            PlaceholderInfo::new("Inventory_Quantity", "Number of items in the entry"),
            PlaceholderInfo::new(
                "Inventory_IsEquipped_Start/Inventory_IsEquipped_End",
                "Kept if the item is equipped",
            ),
            PlaceholderInfo::new(
                "Inventory_IsNotEquipped_Start/Inventory_IsNotEquipped_End",
                "Kept if the item is not equipped",
            ),
            PlaceholderInfo::new("Inventory_ItemDetails", "The item rendered with its default template"),
            PlaceholderInfo::new(
                "Inventory_Item_<Placeholder>",
                "Any item placeholder, resolved against the entry's item",
            ),
        ];
        catalog.extend(position_catalog("Inventory", "entry"));
        catalog
    }
}

async fn render_inventory(
    text: String,
    npc: &FlexFieldObject,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let mut items: Vec<(&InventoryEntry, FlexFieldObject)> = Vec::with_capacity(npc.inventory.len());
    for entry in &npc.inventory {
        if let Some(item) = fetch_object(session, &entry.item_id).await? {
            items.push((entry, item));
        }
    }

    let text = gate(&text, "Inventory_HasItems", !items.is_empty())?;

    let start = Pattern::literal("Inventory_Start")?;
    let end = Pattern::literal("Inventory_End")?;
    let mut cursor = BlockCursor::new(text, &start, &end);
    while cursor.next_block().is_some() {
        let template = cursor.inner().to_string();
        let with_details = mentions(&template, "Inventory_ItemDetails");

        let mut rendered = Vec::with_capacity(items.len());
        for (index, (entry, item)) in items.iter().enumerate() {
            let position = ListPosition::new(index, items.len());
            let body = fill_position(&template, "Inventory", position)?;
            let body = gate(&body, "Inventory_IsEquipped", entry.is_equipped)?;
            let body = gate(&body, "Inventory_IsNotEquipped", !entry.is_equipped)?;
            let body = fill(&body, "Inventory_Quantity", Indent::Inline, &entry.quantity.to_string())?;
            let body = resolve_nested_object(body, item, ObjectType::Item, ITEM_PREFIX, session).await?;
            let body = if with_details {
                let details = render_object_details(TemplateKind::ObjectItem, item, ObjectType::Item, session).await?;
                fill(&body, "Inventory_ItemDetails", Indent::Capture, &details)?
            } else {
                body
            };
            rendered.push(body);
        }
        cursor.replace(&join_list_items(&rendered));
    }
    Ok(cursor.finish())
}
