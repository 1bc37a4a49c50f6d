//! Built-in canonical templates, written for a Lua runtime

use crate::kind::TemplateKind;

const OBJECT_NPC: &str = r#"local npc = {
    id = "{{Npc_Id}}",
    name = "{{Npc_Name}}",
    name_key = "{{Npc_Name_LangKey}}",
    {{Npc_AllFields}}
}
{{Inventory_HasItems_Start}}

npc.inventory = {
    {{Inventory_Start}}
    {
        quantity = {{Inventory_Quantity}},
        equipped = {{Inventory_IsEquipped_Start}}true{{Inventory_IsEquipped_End}}{{Inventory_IsNotEquipped_Start}}false{{Inventory_IsNotEquipped_End}},
        item = {{Inventory_ItemDetails}}
    }{{Inventory_IsNotLast_Start}},{{Inventory_IsNotLast_End}}
    {{Inventory_End}}
}
{{Inventory_HasItems_End}}
{{Skills_HasSkills_Start}}

npc.skills = {
    {{Skills_Start}}
    {{Skill_Details}}{{Skill_IsNotLast_Start}},{{Skill_IsNotLast_End}}
    {{Skills_End}}
}
{{Skills_HasSkills_End}}
{{DailyRoutine_HasEvents_Start}}

npc.daily_routine = {
    {{DailyRoutine_Events_Start}}
    { earliest = "{{DailyRoutine_Event_EarliestTime}}", latest = "{{DailyRoutine_Event_LatestTime}}"{{DailyRoutine_Event_HasMovementTarget_Start}}, target = "{{DailyRoutine_Event_MovementTarget}}"{{DailyRoutine_Event_HasMovementTarget_End}}{{DailyRoutine_Event_HasScript_Start}}, script = "{{DailyRoutine_Event_ScriptFunction}}"{{DailyRoutine_Event_HasScript_End}}, enabled = {{DailyRoutine_Event_IsEnabledByDefault}} }{{DailyRoutine_Event_IsNotLast_Start}},{{DailyRoutine_Event_IsNotLast_End}}
    {{DailyRoutine_Events_End}}
}

{{DailyRoutine_Functions}}
{{DailyRoutine_HasEvents_End}}
{{Tale_HasDialog_Start}}

npc.dialog = "{{Tale_Initial_Function_Name}}"

{{Tale_Initial_Function}}

{{Tale_Additional_Functions}}
{{Tale_HasDialog_End}}

return npc
"#;

const OBJECT_ITEM: &str = r#"{
    id = "{{Item_Id}}",
    name = "{{Item_Name}}",
    name_key = "{{Item_Name_LangKey}}",
    {{Item_AllFields}}
}"#;

const OBJECT_SKILL: &str = r#"{
    id = "{{Skill_Id}}",
    name = "{{Skill_Name}}",
    name_key = "{{Skill_Name_LangKey}}",
    {{Skill_AllFields}}
}"#;

const OBJECT_FIELD_LIST: &str = r#"{{Fields_Start}}
["{{Field_Name}}"] = {{Field_IsNumber_Start}}{{Field_Value}}{{Field_IsNumber_End}}{{Field_IsText_Start}}"{{Field_Value}}"{{Field_IsText_End}}{{Field_IsNotLast_Start}},{{Field_IsNotLast_End}}
{{Fields_End}}
"#;

const TALE_DIALOG_FUNCTION: &str = r#"-- {{Tale_Function_ParentPreview}}
function {{Tale_Function_Name}}()
    {{Tale_Function_Content}}
end
"#;

const TALE_NPC_TEXT_LINE: &str = r#"dialog.npc_says("{{Tale_TextLine_LangKey}}") -- {{Tale_Speaker}}: {{Tale_TextLine}}"#;

const TALE_PLAYER_TEXT_LINE: &str = r#"dialog.player_says("{{Tale_TextLine_LangKey}}") -- {{Tale_Speaker}}: {{Tale_TextLine}}"#;

const TALE_CHOICE: &str = r#"return dialog.choose({
    {{Tale_Choices_Start}}
    { text = "{{Tale_Choice_LangKey}}", next = {{Tale_Choice_HasFunction_Start}}{{Tale_Choice_Function}}{{Tale_Choice_HasFunction_End}}{{Tale_Choice_HasNoFunction_Start}}nil{{Tale_Choice_HasNoFunction_End}} }{{Tale_Choice_IsNotLast_Start}},{{Tale_Choice_IsNotLast_End}}
    {{Tale_Choices_End}}
})"#;

const TALE_ACTION: &str = r#"dialog.action("{{Tale_Action_Name}}", "{{Tale_Action_Value}}")"#;

const TALE_FUNCTION_CALL: &str = r#"return {{Tale_Call_Function}}()"#;

const DAILY_ROUTINE_FUNCTION: &str = r#"-- {{DailyRoutine_Function_ParentPreview}}
function {{DailyRoutine_Function_Name}}()
    {{DailyRoutine_Function_Content}}
end
"#;

const SNIPPET_FUNCTION: &str = r#"-- {{SnippetFunction_ParentPreview}}
function {{SnippetFunction_Name}}()
    {{SnippetFunction_Content}}
end
"#;

const LANGUAGE_FILE: &str = r#"return {
    {{LangKeys_Start}}
    {{LangKey_Key}} = "{{LangKey_Value}}",
    {{LangKeys_End}}
    {{LangKeys_HasReferenced_Start}}
    -- referenced
    {{LangKeys_Referenced_Start}}
    {{LangKey_Key}} = "{{LangKey_Value}}",
    {{LangKeys_Referenced_End}}
    {{LangKeys_HasReferenced_End}}
}
"#;

/// Built-in template text of a kind
pub fn builtin_template(kind: TemplateKind) -> &'static str {
    match kind {
        TemplateKind::ObjectNpc => OBJECT_NPC,
        TemplateKind::ObjectItem => OBJECT_ITEM,
        TemplateKind::ObjectSkill => OBJECT_SKILL,
        TemplateKind::ObjectFieldList => OBJECT_FIELD_LIST,
        TemplateKind::TaleDialogFunction => TALE_DIALOG_FUNCTION,
        TemplateKind::TaleNpcTextLine => TALE_NPC_TEXT_LINE,
        TemplateKind::TalePlayerTextLine => TALE_PLAYER_TEXT_LINE,
        TemplateKind::TaleChoice => TALE_CHOICE,
        TemplateKind::TaleAction => TALE_ACTION,
        TemplateKind::TaleFunctionCall => TALE_FUNCTION_CALL,
        TemplateKind::DailyRoutineFunction => DAILY_ROUTINE_FUNCTION,
        TemplateKind::SnippetFunction => SNIPPET_FUNCTION,
        TemplateKind::LanguageFile => LANGUAGE_FILE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::validate;

    #[test]
    fn test_builtin_templates_have_paired_blocks() {
        for kind in TemplateKind::ALL {
            let report = validate(builtin_template(kind), &[]);
            assert!(report.valid, "{}: {:?}", kind, report.issues);
        }
    }
}
