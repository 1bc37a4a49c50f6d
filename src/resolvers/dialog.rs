//! Dialogs (Tale)
//!
//! A dialog graph is split into functions. A function starts at the root
//! node, at every choice-option target and at every node reached by more
//! than one link; it then follows the linear flow until a choice, a dead end
//! or the start of another function, which becomes a call.
//!
//! Every step of a function is rendered through the template kind of its
//! node, and the functions themselves through `tale-dialog-function`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;

use super::{
    fill, fill_language_key, fill_position, gate, mentions, position_catalog, preview,
    render_functions, subject_object, PlaceholderInfo, TopicResolver,
};
use crate::context::{DialogStep, RenderContext, Subject};
use crate::diagnostics::DiagnosticKind;
use crate::engine::{MemoScope, RenderSession};
use crate::error::RenderError;
use crate::kind::TemplateKind;
use crate::model::{ChoiceOption, Dialog, DialogNode, DialogNodeKind, FlexFieldObject, ObjectType, ScriptFunction};
use crate::parser::{join_list_items, BlockCursor, Indent, ListPosition, Pattern};
use crate::services::{to_identifier, KeyRequest};

const PLAYER_SPEAKER: &str = "Player";

pub struct DialogResolver;

#[async_trait]
impl TopicResolver for DialogResolver {
    fn name(&self) -> &'static str {
        "dialog"
    }

    fn is_applicable(&self, kind: TemplateKind) -> bool {
        kind == TemplateKind::ObjectNpc || kind == TemplateKind::TaleDialogFunction || kind.is_dialog_step()
    }

    async fn resolve(
        &self,
        kind: TemplateKind,
        text: String,
        context: &RenderContext,
        session: &mut RenderSession,
    ) -> Result<String, RenderError> {
        match kind {
            TemplateKind::ObjectNpc => {
                if !mentions(&text, "Tale_") {
                    return Ok(text);
                }
                let npc = subject_object(self.name(), context)?;
                let scope = session.errors_mut().push_context("Dialog");
                let result = resolve_npc(text, npc, session).await;
                session.errors_mut().restore(scope);
                result
            }
            TemplateKind::TaleDialogFunction => match &context.subject {
                Subject::DialogFunction(function) => resolve_function(&text, function),
                other => Err(self.mismatch(other)),
            },
            _ => match &context.subject {
                Subject::DialogStep(step) => resolve_step(kind, text, step, session).await,
                other => Err(self.mismatch(other)),
            },
        }
    }

    fn placeholder_catalog(&self, kind: TemplateKind) -> Vec<PlaceholderInfo> {
        match kind {
            TemplateKind::ObjectNpc => vec![
                PlaceholderInfo::new("Tale_HasDialog_Start/Tale_HasDialog_End", "Kept if the NPC has a dialog"),
                PlaceholderInfo::new(
                    "Tale_HasNoDialog_Start/Tale_HasNoDialog_End",
                    "Kept if the NPC has no dialog",
                ),
                PlaceholderInfo::new("Tale_Initial_Function_Name", "Name of the dialog's entry function"),
                PlaceholderInfo::new("Tale_Initial_Function", "The dialog's entry function"),
                PlaceholderInfo::new("Tale_Additional_Functions", "Every other function of the dialog"),
            ],
            TemplateKind::TaleDialogFunction => vec![
                PlaceholderInfo::new("Tale_Function_Name", "Name of the function"),
                PlaceholderInfo::new("Tale_Function_Content", "Rendered steps of the function"),
                PlaceholderInfo::new("Tale_Function_ParentPreview", "Preview of the node leading into the function"),
            ],
            TemplateKind::TaleNpcTextLine | TemplateKind::TalePlayerTextLine => vec![
                PlaceholderInfo::new("Tale_TextLine", "Text of the line"),
                PlaceholderInfo::new("Tale_TextLine_LangKey", "Language key of the line"),
                PlaceholderInfo::new("Tale_Speaker", "Name of the speaker"),
            ],
            TemplateKind::TaleChoice => {
                let mut catalog = vec![
                    PlaceholderInfo::new("Tale_Choices_Start/Tale_Choices_End", "Repeated once per option"),
                    PlaceholderInfo::new("Tale_Choice_Text", "Text of the option"),
                    PlaceholderInfo::new("Tale_Choice_LangKey", "Language key of the option text"),
                    PlaceholderInfo::new("Tale_Choice_Function", "Function the option leads to"),
                    PlaceholderInfo::new(
                        "Tale_Choice_HasFunction_Start/Tale_Choice_HasFunction_End",
                        "Kept if the option leads somewhere",
                    ),
                    PlaceholderInfo::new(
                        "Tale_Choice_HasNoFunction_Start/Tale_Choice_HasNoFunction_End",
                        "Kept if the option ends the dialog",
                    ),
                ];
                catalog.extend(position_catalog("Tale_Choice", "option"));
                catalog
            }
            TemplateKind::TaleAction => vec![
                PlaceholderInfo::new("Tale_Action_Name", "Name of the action"),
                PlaceholderInfo::new("Tale_Action_Value", "Parameter of the action"),
            ],
            TemplateKind::TaleFunctionCall => {
                vec![PlaceholderInfo::new("Tale_Call_Function", "Name of the function to continue with")]
            }
            _ => Vec::new(),
        }
    }
}

impl DialogResolver {
    fn mismatch(&self, subject: &Subject) -> RenderError {
        RenderError::SubjectMismatch {
            resolver: self.name(),
            found: subject.type_name(),
        }
    }
}

/// One function of a split dialog, before its steps are rendered
#[derive(Debug, Clone, PartialEq)]
struct PlannedFunction {
    name: String,
    parent_preview: String,
    steps: Vec<(TemplateKind, DialogStep)>,
}

/// A link to a node id that does not exist
#[derive(Debug, Clone, PartialEq, Eq)]
struct DanglingLink {
    from: String,
    to: String,
}

#[derive(Debug, Default)]
struct DialogPlan {
    functions: Vec<PlannedFunction>,
    dangling: Vec<DanglingLink>,
}

fn option_preview(option: &ChoiceOption) -> String {
    preview(&option.text)
}

/// Preview of the link from `node` to `target`
fn link_preview(node: &DialogNode, target: &str) -> String {
    match &node.kind {
        DialogNodeKind::NpcText { text, .. } | DialogNodeKind::PlayerText { text, .. } => preview(text),
        DialogNodeKind::Choice { options } => options
            .iter()
            .find(|o| o.next.as_deref() == Some(target))
            .map(option_preview)
            .unwrap_or_default(),
        DialogNodeKind::Action { action, .. } => preview(action),
    }
}

fn step_kind(node: &DialogNode) -> TemplateKind {
    match node.kind {
        DialogNodeKind::NpcText { .. } => TemplateKind::TaleNpcTextLine,
        DialogNodeKind::PlayerText { .. } => TemplateKind::TalePlayerTextLine,
        DialogNodeKind::Choice { .. } => TemplateKind::TaleChoice,
        DialogNodeKind::Action { .. } => TemplateKind::TaleAction,
    }
}

/// Split a dialog into functions
fn plan_dialog(npc: &FlexFieldObject, dialog: &Dialog) -> DialogPlan {
    let mut plan = DialogPlan::default();
    let Some(root) = dialog.nodes.first() else {
        return plan;
    };
    let nodes: HashMap<&str, &DialogNode> = dialog.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let mut incoming: HashMap<&str, usize> = HashMap::new();
    let mut choice_targets: HashSet<&str> = HashSet::new();
    for node in &dialog.nodes {
        for target in node.successors() {
            if !nodes.contains_key(target) {
                plan.dangling.push(DanglingLink {
                    from: node.id.clone(),
                    to: target.to_string(),
                });
                continue;
            }
            *incoming.entry(target).or_default() += 1;
            if matches!(node.kind, DialogNodeKind::Choice { .. }) {
                choice_targets.insert(target);
            }
        }
    }

    // Breadth-first walk: function order and the first link into each start
    let mut starts: Vec<(&str, String)> = vec![(root.id.as_str(), format!("{} dialog", npc.name))];
    let mut seen: HashSet<&str> = HashSet::from([root.id.as_str()]);
    let mut queue: VecDeque<&DialogNode> = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        for target in node.successors() {
            let Some(next) = nodes.get(target) else {
                continue;
            };
            if !seen.insert(target) {
                continue;
            }
            let is_start = choice_targets.contains(target) || incoming.get(target).copied().unwrap_or(0) > 1;
            if is_start {
                starts.push((next.id.as_str(), link_preview(node, target)));
            }
            queue.push_back(next);
        }
    }

    let base = to_identifier(&npc.name);
    let names: HashMap<&str, String> = starts
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (*id, format!("{}_Dialog_{}", base, i + 1)))
        .collect();

    for (start, parent_preview) in &starts {
        let step = |node: &DialogNode| DialogStep {
            owner_id: npc.id.clone(),
            owner_name: npc.name.clone(),
            dialog_id: dialog.id.clone(),
            node: node.clone(),
            option_functions: Vec::new(),
            next_function: None,
        };

        let mut steps = Vec::new();
        let mut current = nodes.get(start).copied();
        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(node) = current.take() {
            if !visited.insert(node.id.as_str()) {
                break;
            }
            match &node.kind {
                DialogNodeKind::Choice { options } => {
                    let mut choice = step(node);
                    choice.option_functions = options
                        .iter()
                        .map(|o| o.next.as_deref().and_then(|id| names.get(id).cloned()))
                        .collect();
                    steps.push((TemplateKind::TaleChoice, choice));
                }
                DialogNodeKind::NpcText { next, .. }
                | DialogNodeKind::PlayerText { next, .. }
                | DialogNodeKind::Action { next, .. } => {
                    steps.push((step_kind(node), step(node)));
                    let Some(next) = next.as_deref() else {
                        continue;
                    };
                    if let Some(function) = names.get(next) {
                        let mut call = step(node);
                        call.next_function = Some(function.clone());
                        steps.push((TemplateKind::TaleFunctionCall, call));
                    } else {
                        current = nodes.get(next).copied();
                    }
                }
            }
        }

        plan.functions.push(PlannedFunction {
            name: names.get(start).cloned().unwrap_or_default(),
            parent_preview: parent_preview.clone(),
            steps,
        });
    }
    plan
}

/// Functions of a dialog, derived once per render
async fn dialog_functions(
    npc: &FlexFieldObject,
    dialog: &Dialog,
    session: &mut RenderSession,
) -> Result<Arc<[ScriptFunction]>, RenderError> {
    if let Some(functions) = session.memo().get(MemoScope::DialogFunctions, &dialog.id) {
        return Ok(functions);
    }

    let plan = plan_dialog(npc, dialog);
    for link in &plan.dangling {
        session.errors_mut().record(
            DiagnosticKind::MissingReference,
            format!("node '{}' links to missing node '{}'", link.from, link.to),
        );
    }

    let mut functions = Vec::with_capacity(plan.functions.len());
    for planned in plan.functions {
        let mut lines = Vec::with_capacity(planned.steps.len());
        for (kind, step) in planned.steps {
            let label = format!("Node {}", step.node.id);
            let context = RenderContext::new(Subject::DialogStep(step), ObjectType::Npc);
            let rendered = session.render_default(kind, context, label).await;
            let rendered = session.recover(rendered)?;
            let rendered = rendered.trim();
            if !rendered.is_empty() {
                lines.push(rendered.to_string());
            }
        }
        functions.push(ScriptFunction {
            name: planned.name,
            code: lines.join("\n"),
            parent_preview: planned.parent_preview,
        });
    }
    Ok(session.memo().insert(MemoScope::DialogFunctions, &dialog.id, functions))
}

async fn resolve_npc(
    text: String,
    npc: &FlexFieldObject,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    session.checkpoint()?;
    let records = Arc::clone(&session.services().records);
    let dialog = records.dialog_for_object(&npc.id).await.map_err(RenderError::from);
    let dialog = session.recover(dialog)?.filter(|d| !d.nodes.is_empty());

    let text = gate(&text, "Tale_HasDialog", dialog.is_some())?;
    let text = gate(&text, "Tale_HasNoDialog", dialog.is_none())?;
    let Some(dialog) = dialog else {
        let text = fill(&text, "Tale_Initial_Function_Name", Indent::Inline, "")?;
        let text = fill(&text, "Tale_Initial_Function", Indent::Capture, "")?;
        return fill(&text, "Tale_Additional_Functions", Indent::Capture, "");
    };
    if !mentions(&text, "Tale_Initial_Function") && !mentions(&text, "Tale_Additional_Functions") {
        return Ok(text);
    }

    let functions = dialog_functions(npc, &dialog, session).await?;
    let (initial, additional) = functions.split_at(functions.len().min(1));
    let initial_name = initial.first().map(|f| f.name.as_str()).unwrap_or_default();
    let text = fill(&text, "Tale_Initial_Function_Name", Indent::Inline, initial_name)?;

    let text = if mentions(&text, "Tale_Initial_Function") {
        let rendered = render_functions(
            session,
            TemplateKind::TaleDialogFunction,
            initial,
            ObjectType::Npc,
            |f| Subject::DialogFunction(f.clone()),
        )
        .await?;
        fill(&text, "Tale_Initial_Function", Indent::Capture, &rendered)?
    } else {
        text
    };

    if mentions(&text, "Tale_Additional_Functions") {
        let rendered = render_functions(
            session,
            TemplateKind::TaleDialogFunction,
            additional,
            ObjectType::Npc,
            |f| Subject::DialogFunction(f.clone()),
        )
        .await?;
        return fill(&text, "Tale_Additional_Functions", Indent::Capture, &rendered);
    }
    Ok(text)
}

fn resolve_function(text: &str, function: &ScriptFunction) -> Result<String, RenderError> {
    let text = fill(text, "Tale_Function_Name", Indent::Inline, &function.name)?;
    let text = fill(&text, "Tale_Function_ParentPreview", Indent::Inline, &function.parent_preview)?;
    fill(&text, "Tale_Function_Content", Indent::Capture, &function.code)
}

fn line_key(step: &DialogStep, id: &str, label: &str, text: &str) -> KeyRequest {
    KeyRequest::for_name(&step.owner_id, &step.owner_name, ObjectType::Npc).with_field(
        id,
        format!("{} {}", label, id),
        text,
    )
}

async fn resolve_step(
    kind: TemplateKind,
    text: String,
    step: &DialogStep,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let escape = session.services().escape.clone();
    match (kind, &step.node.kind) {
        (TemplateKind::TaleFunctionCall, _) => {
            let function = step.next_function.as_deref().unwrap_or_default();
            fill(&text, "Tale_Call_Function", Indent::Inline, function)
        }
        (TemplateKind::TaleNpcTextLine, DialogNodeKind::NpcText { text: line, .. })
        | (TemplateKind::TalePlayerTextLine, DialogNodeKind::PlayerText { text: line, .. }) => {
            let speaker = if kind == TemplateKind::TaleNpcTextLine {
                step.owner_name.as_str()
            } else {
                PLAYER_SPEAKER
            };
            let out = fill(&text, "Tale_Speaker", Indent::Inline, speaker)?;
            let out = fill(&out, "Tale_TextLine", Indent::Inline, &escape.escape(line))?;
            let request = line_key(step, &step.node.id, "Line", line);
            fill_language_key(out, "Tale_TextLine_LangKey", &request, session).await
        }
        (TemplateKind::TaleAction, DialogNodeKind::Action { action, value, .. }) => {
            let out = fill(&text, "Tale_Action_Name", Indent::Inline, &escape.escape(action))?;
            fill(&out, "Tale_Action_Value", Indent::Inline, &escape.escape(value))
        }
        (TemplateKind::TaleChoice, DialogNodeKind::Choice { options }) => {
            render_choices(text, step, options, session).await
        }
        _ => Ok(text),
    }
}

async fn render_choices(
    text: String,
    step: &DialogStep,
    options: &[ChoiceOption],
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let escape = session.services().escape.clone();
    let start = Pattern::literal("Tale_Choices_Start")?;
    let end = Pattern::literal("Tale_Choices_End")?;
    let mut cursor = BlockCursor::new(text, &start, &end);
    while cursor.next_block().is_some() {
        let template = cursor.inner().to_string();
        let mut rendered = Vec::with_capacity(options.len());
        for (index, option) in options.iter().enumerate() {
            let function = step.option_functions.get(index).cloned().flatten();
            let body = fill_position(&template, "Tale_Choice", ListPosition::new(index, options.len()))?;
            let body = gate(&body, "Tale_Choice_HasFunction", function.is_some())?;
            let body = gate(&body, "Tale_Choice_HasNoFunction", function.is_none())?;
            let body = fill(&body, "Tale_Choice_Function", Indent::Inline, function.as_deref().unwrap_or_default())?;
            let body = fill(&body, "Tale_Choice_Text", Indent::Inline, &escape.escape(&option.text))?;
            let request = line_key(step, &option.id, "Choice", &option.text);
            rendered.push(fill_language_key(body, "Tale_Choice_LangKey", &request, session).await?);
        }
        cursor.replace(&join_list_items(&rendered));
    }
    Ok(cursor.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn npc_text(id: &str, text: &str, next: Option<&str>) -> DialogNode {
        DialogNode {
            id: id.to_string(),
            kind: DialogNodeKind::NpcText {
                text: text.to_string(),
                next: next.map(str::to_string),
            },
        }
    }

    fn choice(id: &str, targets: &[Option<&str>]) -> DialogNode {
        DialogNode {
            id: id.to_string(),
            kind: DialogNodeKind::Choice {
                options: targets
                    .iter()
                    .enumerate()
                    .map(|(i, t)| ChoiceOption {
                        id: format!("{}-{}", id, i),
                        text: format!("Option {}", i),
                        next: t.map(str::to_string),
                    })
                    .collect(),
            },
        }
    }

    fn dialog(nodes: Vec<DialogNode>) -> Dialog {
        Dialog {
            id: "d".to_string(),
            object_id: "g".to_string(),
            nodes,
        }
    }

    fn goblin() -> FlexFieldObject {
        FlexFieldObject::new("g", "Goblin", ObjectType::Npc)
    }

    fn step_summary(function: &PlannedFunction) -> Vec<(TemplateKind, String)> {
        function
            .steps
            .iter()
            .map(|(kind, step)| (*kind, step.next_function.clone().unwrap_or_else(|| step.node.id.clone())))
            .collect()
    }

    #[test]
    fn test_linear_dialog_is_one_function() {
        let plan = plan_dialog(&goblin(), &dialog(vec![npc_text("a", "Hi", Some("b")), npc_text("b", "Bye", None)]));
        assert_eq!(plan.functions.len(), 1);
        assert_eq!(plan.functions[0].name, "Goblin_Dialog_1");
        assert_eq!(
            step_summary(&plan.functions[0]),
            vec![
                (TemplateKind::TaleNpcTextLine, "a".to_string()),
                (TemplateKind::TaleNpcTextLine, "b".to_string())
            ]
        );
    }

    #[test]
    fn test_choice_targets_start_functions() {
        let plan = plan_dialog(
            &goblin(),
            &dialog(vec![
                npc_text("a", "Hi", Some("c")),
                choice("c", &[Some("x"), None, Some("y")]),
                npc_text("x", "Good choice", None),
                npc_text("y", "Bad choice", None),
            ]),
        );
        let names: Vec<&str> = plan.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Goblin_Dialog_1", "Goblin_Dialog_2", "Goblin_Dialog_3"]);

        let (_, step) = &plan.functions[0].steps[1];
        assert_eq!(
            step.option_functions,
            vec![Some("Goblin_Dialog_2".to_string()), None, Some("Goblin_Dialog_3".to_string())]
        );
        assert_eq!(plan.functions[1].parent_preview, "Option 0");
    }

    #[test]
    fn test_shared_node_becomes_call() {
        let plan = plan_dialog(
            &goblin(),
            &dialog(vec![
                choice("c", &[Some("x"), Some("y")]),
                npc_text("x", "Left", Some("m")),
                npc_text("y", "Right", Some("m")),
                npc_text("m", "Merged", None),
            ]),
        );
        assert_eq!(plan.functions.len(), 4);
        assert_eq!(
            step_summary(&plan.functions[1]),
            vec![
                (TemplateKind::TaleNpcTextLine, "x".to_string()),
                (TemplateKind::TaleFunctionCall, "Goblin_Dialog_4".to_string())
            ]
        );
        assert_eq!(plan.functions[3].parent_preview, "Left");
    }

    #[test]
    fn test_dangling_links_are_reported() {
        let plan = plan_dialog(&goblin(), &dialog(vec![npc_text("a", "Hi", Some("nowhere"))]));
        assert_eq!(
            plan.dangling,
            vec![DanglingLink {
                from: "a".to_string(),
                to: "nowhere".to_string()
            }]
        );
        assert_eq!(plan.functions[0].steps.len(), 1);
    }

    #[test]
    fn test_empty_dialog_has_no_functions() {
        assert!(plan_dialog(&goblin(), &dialog(Vec::new())).functions.is_empty());
    }
}
