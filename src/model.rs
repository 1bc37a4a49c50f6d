//! Domain records consumed by the resolvers
//!
//! All records are plain data deserialized from the project JSON. Lookups by
//! identifier name (fields, snippets) are case-insensitive and also accept
//! any registered alias.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type tag of a flex-field object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectType {
    #[default]
    Npc,
    Item,
    Skill,
}

impl ObjectType {
    /// Placeholder prefix and language-key prefix for this type
    pub fn prefix(self) -> &'static str {
        match self {
            ObjectType::Npc => "Npc",
            ObjectType::Item => "Item",
            ObjectType::Skill => "Skill",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    #[default]
    Text,
    MultiLineText,
    Number,
    Option,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::MultiLineText => "multi-line-text",
            FieldType::Number => "number",
            FieldType::Option => "option",
        }
    }
}

/// A dynamic attribute of an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlexField {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl FlexField {
    pub fn new(id: impl Into<String>, name: impl Into<String>, field_type: FieldType, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            field_type,
            value: value.into(),
            aliases: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Check the field's name or any alias, ignoring case
    pub fn is_named(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.name.to_lowercase() == name || self.aliases.iter().any(|a| a.to_lowercase() == name)
    }

    pub fn is_number(&self) -> bool {
        self.field_type == FieldType::Number
    }

    /// Text-like fields receive language keys
    pub fn is_localizable(&self) -> bool {
        matches!(self.field_type, FieldType::Text | FieldType::MultiLineText)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub item_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub is_equipped: bool,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hours: u8,
    pub minutes: u8,
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hours, self.minutes)
    }
}

/// Source script attached to a schedule event or snippet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub name: String,
    #[serde(default)]
    pub code: String,
}

/// One entry of an NPC's daily routine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub id: String,
    pub earliest_time: TimeOfDay,
    pub latest_time: TimeOfDay,
    #[serde(default)]
    pub movement_target: Option<String>,
    #[serde(default)]
    pub script: Option<Script>,
    #[serde(default = "default_enabled")]
    pub enabled_by_default: bool,
}

fn default_enabled() -> bool {
    true
}

/// Named block of code an object exposes to its template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSnippet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: String,
}

impl ExportSnippet {
    pub fn script(&self) -> Script {
        Script {
            name: self.name.clone(),
            code: self.code.clone(),
        }
    }
}

/// An object with dynamic attributes: NPC, item or skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlexFieldObject {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub object_type: ObjectType,
    #[serde(default)]
    pub fields: Vec<FlexField>,
    #[serde(default)]
    pub inventory: Vec<InventoryEntry>,
    /// Skill object ids
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub daily_routine: Vec<ScheduleEvent>,
    #[serde(default)]
    pub export_snippets: Vec<ExportSnippet>,
}

impl FlexFieldObject {
    pub fn new(id: impl Into<String>, name: impl Into<String>, object_type: ObjectType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            object_type,
            fields: Vec::new(),
            inventory: Vec::new(),
            skills: Vec::new(),
            daily_routine: Vec::new(),
            export_snippets: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FlexField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_inventory(mut self, entry: InventoryEntry) -> Self {
        self.inventory.push(entry);
        self
    }

    pub fn with_skill(mut self, skill_id: impl Into<String>) -> Self {
        self.skills.push(skill_id.into());
        self
    }

    pub fn with_event(mut self, event: ScheduleEvent) -> Self {
        self.daily_routine.push(event);
        self
    }

    pub fn with_snippet(mut self, snippet: ExportSnippet) -> Self {
        self.export_snippets.push(snippet);
        self
    }

    /// Find a field by name or alias, ignoring case
    pub fn field(&self, name: &str) -> Option<&FlexField> {
        self.fields.iter().find(|f| f.is_named(name))
    }

    /// Find a snippet by name, ignoring case
    pub fn snippet(&self, name: &str) -> Option<&ExportSnippet> {
        let name = name.to_lowercase();
        self.export_snippets
            .iter()
            .find(|s| s.name.to_lowercase() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DialogNodeKind {
    NpcText {
        text: String,
        #[serde(default)]
        next: Option<String>,
    },
    PlayerText {
        text: String,
        #[serde(default)]
        next: Option<String>,
    },
    Choice {
        options: Vec<ChoiceOption>,
    },
    Action {
        action: String,
        #[serde(default)]
        value: String,
        #[serde(default)]
        next: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogNode {
    pub id: String,
    #[serde(flatten)]
    pub kind: DialogNodeKind,
}

impl DialogNode {
    /// Node ids this node links to, in link order
    pub fn successors(&self) -> Vec<&str> {
        match &self.kind {
            DialogNodeKind::NpcText { next, .. }
            | DialogNodeKind::PlayerText { next, .. }
            | DialogNodeKind::Action { next, .. } => next.as_deref().into_iter().collect(),
            DialogNodeKind::Choice { options } => {
                options.iter().filter_map(|o| o.next.as_deref()).collect()
            }
        }
    }
}

/// A dialog graph; the first node is the entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    pub id: String,
    pub object_id: String,
    #[serde(default)]
    pub nodes: Vec<DialogNode>,
}

impl Dialog {
    pub fn node(&self, id: &str) -> Option<&DialogNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// A named function derived from a script, dialog or snippet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptFunction {
    pub name: String,
    pub code: String,
    /// Short description of what leads into this function
    #[serde(default)]
    pub parent_preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageKey {
    pub key: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_field_lookup_ignores_case_and_uses_aliases() {
        let npc = FlexFieldObject::new("1", "Goblin", ObjectType::Npc).with_field(
            FlexField::new("f1", "Health", FieldType::Number, "10").with_alias("HP"),
        );
        assert!(npc.field("health").is_some());
        assert!(npc.field("hp").is_some());
        assert!(npc.field("Speed").is_none());
    }

    #[test]
    fn test_lookup_folds_non_ascii_case() {
        let npc = FlexFieldObject::new("1", "Goblin", ObjectType::Npc)
            .with_field(FlexField::new("f1", "Ärger", FieldType::Text, "hoch"))
            .with_snippet(ExportSnippet {
                id: "s1".to_string(),
                name: "ÜberSchlag".to_string(),
                code: "hit()".to_string(),
            });
        assert_eq!(npc.field("ärger").map(|f| f.value.as_str()), Some("hoch"));
        assert_eq!(npc.field("ÄRGER").map(|f| f.id.as_str()), Some("f1"));
        assert_eq!(npc.snippet("überschlag").map(|s| s.id.as_str()), Some("s1"));
    }

    #[test]
    fn test_deserialize_object() {
        let json = r#"{
            "id": "npc-1",
            "name": "Goblin",
            "type": "npc",
            "fields": [{"id": "f1", "name": "Health", "type": "number", "value": "12"}],
            "inventory": [{"item_id": "sword"}],
            "daily_routine": [{
                "id": "ev-1",
                "earliest_time": {"hours": 8, "minutes": 0},
                "latest_time": {"hours": 9, "minutes": 30}
            }]
        }"#;
        let npc: FlexFieldObject = serde_json::from_str(json).unwrap();
        assert_eq!(npc.fields[0].field_type, FieldType::Number);
        assert_eq!(npc.inventory[0].quantity, 1);
        assert!(npc.daily_routine[0].enabled_by_default);
        assert_eq!(npc.daily_routine[0].latest_time.to_string(), "09:30");
    }

    #[test]
    fn test_deserialize_dialog_nodes() {
        let json = r#"{
            "id": "d1",
            "object_id": "npc-1",
            "nodes": [
                {"id": "a", "type": "npc-text", "text": "Hello", "next": "b"},
                {"id": "b", "type": "choice", "options": [
                    {"id": "o1", "text": "Bye", "next": "c"},
                    {"id": "o2", "text": "Stay"}
                ]},
                {"id": "c", "type": "action", "action": "SetFlag", "value": "met"}
            ]
        }"#;
        let dialog: Dialog = serde_json::from_str(json).unwrap();
        assert_eq!(dialog.nodes.len(), 3);
        assert_eq!(dialog.node("b").unwrap().successors(), vec!["c"]);
        assert!(matches!(dialog.nodes[2].kind, DialogNodeKind::Action { .. }));
    }
}
