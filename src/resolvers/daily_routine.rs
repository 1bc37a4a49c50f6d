//! Daily routine of an NPC and the script functions of its events

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    fill, fill_position, gate, mentions, position_catalog, render_functions, subject_object,
    PlaceholderInfo, TopicResolver,
};
use crate::context::{EventFunction, RenderContext, Subject};
use crate::engine::{MemoScope, RenderSession};
use crate::error::RenderError;
use crate::kind::TemplateKind;
use crate::model::{FlexFieldObject, ScheduleEvent, ScriptFunction};
use crate::parser::{join_list_items, BlockCursor, Indent, ListPosition, Pattern, ScalarCursor};

const EVENT: &str = "DailyRoutine_Event";

pub struct DailyRoutineResolver;

#[async_trait]
impl TopicResolver for DailyRoutineResolver {
    fn name(&self) -> &'static str {
        "daily-routine"
    }

    fn is_applicable(&self, kind: TemplateKind) -> bool {
        matches!(kind, TemplateKind::ObjectNpc | TemplateKind::DailyRoutineFunction)
    }

    async fn resolve(
        &self,
        kind: TemplateKind,
        text: String,
        context: &RenderContext,
        session: &mut RenderSession,
    ) -> Result<String, RenderError> {
        if kind == TemplateKind::DailyRoutineFunction {
            return resolve_function(&text, context, session);
        }
        if !mentions(&text, "DailyRoutine_") {
            return Ok(text);
        }

        let npc = subject_object(self.name(), context)?;
        let scope = session.errors_mut().push_context("Daily routine");
        let result = resolve_routine(text, npc, context, session).await;
        session.errors_mut().restore(scope);
        result
    }

    fn placeholder_catalog(&self, kind: TemplateKind) -> Vec<PlaceholderInfo> {
        if kind == TemplateKind::DailyRoutineFunction {
            return vec![
                PlaceholderInfo::new("DailyRoutine_Function_Name", "Name of the function"),
                PlaceholderInfo::new("DailyRoutine_Function_Content", "Code of the function"),
                PlaceholderInfo::new(
                    "DailyRoutine_Function_ParentPreview",
                    "Short description of the script the function belongs to",
                ),
                PlaceholderInfo::new("DailyRoutine_Function_EventId", "Id of the event owning the script"),
            ];
        }

        let mut catalog = vec![
            PlaceholderInfo::new(
                "DailyRoutine_HasEvents_Start/DailyRoutine_HasEvents_End",
                "Kept if the NPC has a daily routine",
            ),
            PlaceholderInfo::new(
                "DailyRoutine_Events_Start/DailyRoutine_Events_End",
                "Repeated once per event",
            ),
            PlaceholderInfo::new("DailyRoutine_Event_Id", "Id of the event"),
            PlaceholderInfo::new("DailyRoutine_Event_EarliestTime", "Earliest start time as HH:MM"),
            PlaceholderInfo::new("DailyRoutine_Event_LatestTime", "Latest start time as HH:MM"),
            PlaceholderInfo::new("DailyRoutine_Event_EarliestHours", "Hours of the earliest start time"),
            PlaceholderInfo::new("DailyRoutine_Event_EarliestMinutes", "Minutes of the earliest start time"),
            PlaceholderInfo::new("DailyRoutine_Event_LatestHours", "Hours of the latest start time"),
            PlaceholderInfo::new("DailyRoutine_Event_LatestMinutes", "Minutes of the latest start time"),
            PlaceholderInfo::new(
                "DailyRoutine_Event_HasMovementTarget_Start/DailyRoutine_Event_HasMovementTarget_End",
                "Kept if the event moves the NPC",
            ),
            PlaceholderInfo::new("DailyRoutine_Event_MovementTarget", "Name of the movement target"),
            PlaceholderInfo::new(
                "DailyRoutine_Event_HasScript_Start/DailyRoutine_Event_HasScript_End",
                "Kept if the event runs a script",
            ),
            PlaceholderInfo::new("DailyRoutine_Event_ScriptName", "Name of the event's script"),
            PlaceholderInfo::new(
                "DailyRoutine_Event_ScriptFunction",
                "Name of the primary function generated for the script",
            ),
            PlaceholderInfo::new(
                "DailyRoutine_Event_IsEnabledByDefault",
                "true if the event is enabled by default, false otherwise",
            ),
            PlaceholderInfo::new(
                "DailyRoutine_Functions",
                "Every script function of the routine, rendered with the daily routine function template",
            ),
        ];
        catalog.extend(position_catalog(EVENT, "event"));
        catalog
    }
}

/// Functions generated for an event's script; `None` if it has none or generation failed
async fn event_functions(
    npc: &FlexFieldObject,
    event: &ScheduleEvent,
    session: &mut RenderSession,
) -> Result<Option<Arc<[ScriptFunction]>>, RenderError> {
    let Some(script) = &event.script else {
        return Ok(None);
    };
    let functions = session
        .script_functions(MemoScope::EventFunctions, &event.id, &npc.name, script)
        .await
        .map(Some);
    session.recover(functions)
}

async fn resolve_routine(
    text: String,
    npc: &FlexFieldObject,
    context: &RenderContext,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let events = &npc.daily_routine;
    let text = gate(&text, "DailyRoutine_HasEvents", !events.is_empty())?;

    let start = Pattern::literal("DailyRoutine_Events_Start")?;
    let end = Pattern::literal("DailyRoutine_Events_End")?;
    let mut cursor = BlockCursor::new(text, &start, &end);
    while cursor.next_block().is_some() {
        let template = cursor.inner().to_string();
        let mut rendered = Vec::with_capacity(events.len());
        for (index, event) in events.iter().enumerate() {
            let position = ListPosition::new(index, events.len());
            rendered.push(render_event(&template, npc, event, position, session).await?);
        }
        cursor.replace(&join_list_items(&rendered));
    }
    let text = cursor.finish();

    let pattern = Pattern::literal("DailyRoutine_Functions")?;
    let mut cursor = ScalarCursor::new(text, &pattern, Indent::Capture);
    let mut all_functions: Option<String> = None;
    while cursor.next_match().is_some() {
        if all_functions.is_none() {
            all_functions = Some(render_all_functions(npc, context, session).await?);
        }
        cursor.replace(all_functions.as_deref().unwrap_or_default());
    }
    Ok(cursor.finish())
}

async fn render_event(
    template: &str,
    npc: &FlexFieldObject,
    event: &ScheduleEvent,
    position: ListPosition,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let escape = session.services().escape.clone();
    let text = fill_position(template, EVENT, position)?;
    let text = gate(&text, "DailyRoutine_Event_HasMovementTarget", event.movement_target.is_some())?;
    let text = gate(&text, "DailyRoutine_Event_HasScript", event.script.is_some())?;

    let (earliest, latest) = (event.earliest_time, event.latest_time);
    let scalars = [
        ("Id", event.id.clone()),
        ("EarliestTime", earliest.to_string()),
        ("LatestTime", latest.to_string()),
        ("EarliestHours", earliest.hours.to_string()),
        ("EarliestMinutes", earliest.minutes.to_string()),
        ("LatestHours", latest.hours.to_string()),
        ("LatestMinutes", latest.minutes.to_string()),
        (
            "MovementTarget",
            event.movement_target.as_deref().map(|t| escape.escape(t)).unwrap_or_default(),
        ),
        (
            "ScriptName",
            event.script.as_ref().map(|s| escape.escape(&s.name)).unwrap_or_default(),
        ),
        ("IsEnabledByDefault", event.enabled_by_default.to_string()),
    ];
    let mut text = text;
    for (name, value) in scalars {
        text = fill(&text, &format!("{}_{}", EVENT, name), Indent::Inline, &value)?;
    }

    if mentions(&text, "DailyRoutine_Event_ScriptFunction") {
        let name = event_functions(npc, event, session)
            .await?
            .and_then(|functions| functions.first().map(|f| f.name.clone()))
            .unwrap_or_default();
        text = fill(&text, "DailyRoutine_Event_ScriptFunction", Indent::Inline, &name)?;
    }
    Ok(text)
}

async fn render_all_functions(
    npc: &FlexFieldObject,
    context: &RenderContext,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let mut parts = Vec::new();
    for event in &npc.daily_routine {
        let Some(functions) = event_functions(npc, event, session).await? else {
            continue;
        };
        let event_id = event.id.clone();
        let rendered = render_functions(
            session,
            TemplateKind::DailyRoutineFunction,
            &functions,
            context.object_type,
            move |function| {
                Subject::ScheduleEvent(EventFunction {
                    event_id: event_id.clone(),
                    function: function.clone(),
                })
            },
        )
        .await?;
        if !rendered.is_empty() {
            parts.push(rendered);
        }
    }
    Ok(parts.join("\n\n"))
}

fn resolve_function(
    text: &str,
    context: &RenderContext,
    session: &RenderSession,
) -> Result<String, RenderError> {
    let Subject::ScheduleEvent(event) = &context.subject else {
        return Err(RenderError::SubjectMismatch {
            resolver: "daily-routine",
            found: context.subject.type_name(),
        });
    };
    session.checkpoint()?;
    let function = &event.function;
    let text = fill(text, "DailyRoutine_Function_Name", Indent::Inline, &function.name)?;
    let text = fill(&text, "DailyRoutine_Function_EventId", Indent::Inline, &event.event_id)?;
    let text = fill(
        &text,
        "DailyRoutine_Function_ParentPreview",
        Indent::Inline,
        &function.parent_preview,
    )?;
    fill(&text, "DailyRoutine_Function_Content", Indent::Capture, &function.code)
}
