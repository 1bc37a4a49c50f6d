//! Template kind tags

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::model::ObjectType;

/// Which family of output artifact a template produces
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateKind {
    ObjectNpc,
    ObjectItem,
    ObjectSkill,
    /// Field listing used by the "all fields" and "unused fields" placeholders
    ObjectFieldList,
    TaleDialogFunction,
    TaleNpcTextLine,
    TalePlayerTextLine,
    TaleChoice,
    TaleAction,
    TaleFunctionCall,
    DailyRoutineFunction,
    SnippetFunction,
    LanguageFile,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 13] = [
        TemplateKind::ObjectNpc,
        TemplateKind::ObjectItem,
        TemplateKind::ObjectSkill,
        TemplateKind::ObjectFieldList,
        TemplateKind::TaleDialogFunction,
        TemplateKind::TaleNpcTextLine,
        TemplateKind::TalePlayerTextLine,
        TemplateKind::TaleChoice,
        TemplateKind::TaleAction,
        TemplateKind::TaleFunctionCall,
        TemplateKind::DailyRoutineFunction,
        TemplateKind::SnippetFunction,
        TemplateKind::LanguageFile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKind::ObjectNpc => "object-npc",
            TemplateKind::ObjectItem => "object-item",
            TemplateKind::ObjectSkill => "object-skill",
            TemplateKind::ObjectFieldList => "object-field-list",
            TemplateKind::TaleDialogFunction => "tale-dialog-function",
            TemplateKind::TaleNpcTextLine => "tale-npc-text-line",
            TemplateKind::TalePlayerTextLine => "tale-player-text-line",
            TemplateKind::TaleChoice => "tale-choice",
            TemplateKind::TaleAction => "tale-action",
            TemplateKind::TaleFunctionCall => "tale-function-call",
            TemplateKind::DailyRoutineFunction => "daily-routine-function",
            TemplateKind::SnippetFunction => "snippet-function",
            TemplateKind::LanguageFile => "language-file",
        }
    }

    /// Placeholder prefix of the object rendered by this kind
    pub fn default_prefix(self) -> Option<&'static str> {
        self.object_type().map(ObjectType::prefix)
    }

    /// Object type rendered by the object kinds
    pub fn object_type(self) -> Option<ObjectType> {
        match self {
            TemplateKind::ObjectNpc => Some(ObjectType::Npc),
            TemplateKind::ObjectItem => Some(ObjectType::Item),
            TemplateKind::ObjectSkill => Some(ObjectType::Skill),
            _ => None,
        }
    }

    /// Kinds that render one dialog step
    pub fn is_dialog_step(self) -> bool {
        matches!(
            self,
            TemplateKind::TaleNpcTextLine
                | TemplateKind::TalePlayerTextLine
                | TemplateKind::TaleChoice
                | TemplateKind::TaleAction
                | TemplateKind::TaleFunctionCall
        )
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_kinds_have_prefixes() {
        assert_eq!(TemplateKind::ObjectNpc.default_prefix(), Some("Npc"));
        assert_eq!(TemplateKind::ObjectItem.default_prefix(), Some("Item"));
        assert_eq!(TemplateKind::ObjectSkill.default_prefix(), Some("Skill"));
        assert_eq!(TemplateKind::TaleChoice.default_prefix(), None);
    }

    #[test]
    fn test_as_str_matches_serde_name() {
        for kind in TemplateKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_as_str_matches_cli_name() {
        for kind in TemplateKind::ALL {
            let parsed = TemplateKind::from_str(kind.as_str(), false).unwrap();
            assert_eq!(parsed, kind);
        }
    }
}
