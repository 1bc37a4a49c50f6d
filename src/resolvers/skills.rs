//! NPC skills

use async_trait::async_trait;

use super::{
    fetch_object, fill, fill_position, gate, mentions, position_catalog, render_object_details,
    resolve_nested_object, subject_object, PlaceholderInfo, TopicResolver,
};
use crate::context::RenderContext;
use crate::engine::RenderSession;
use crate::error::RenderError;
use crate::kind::TemplateKind;
use crate::model::{FlexFieldObject, ObjectType};
use crate::parser::{join_list_items, BlockCursor, Indent, ListPosition, Pattern};

pub struct SkillsResolver;

#[async_trait]
impl TopicResolver for SkillsResolver {
    fn name(&self) -> &'static str {
        "skills"
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
        if !mentions(&text, "Skills_") {
            return Ok(text);
        }
        let npc = subject_object(self.name(), context)?;
        let scope = session.errors_mut().push_context("Skills");
        let result = render_skills(text, npc, session).await;
        session.errors_mut().restore(scope);
        result
    }

    fn placeholder_catalog(&self, _kind: TemplateKind) -> Vec<PlaceholderInfo> {
        let mut catalog = vec![
            PlaceholderInfo::new(
                "Skills_HasSkills_Start/Skills_HasSkills_End",
                "Kept if the NPC has at least one skill",
            ),
            PlaceholderInfo::new("Skills_Start/Skills_End", "Repeated once per skill"),
            PlaceholderInfo::new("Skill_Details", "The skill rendered with its default template"),
            PlaceholderInfo::new("Skill_<Placeholder>", "Any skill placeholder, resolved against the skill"),
        ];
        catalog.extend(position_catalog("Skill", "skill"));
        catalog
    }
}

async fn render_skills(
    text: String,
    npc: &FlexFieldObject,
    session: &mut RenderSession,
) -> Result<String, RenderError> {
    let mut skills = Vec::with_capacity(npc.skills.len());
    for id in &npc.skills {
        if let Some(skill) = fetch_object(session, id).await? {
            skills.push(skill);
        }
    }

    let text = gate(&text, "Skills_HasSkills", !skills.is_empty())?;

    let start = Pattern::literal("Skills_Start")?;
    let end = Pattern::literal("Skills_End")?;
    let mut cursor = BlockCursor::new(text, &start, &end);
    while cursor.next_block().is_some() {
        let template = cursor.inner().to_string();
        let with_details = mentions(&template, "Skill_Details");

        let mut rendered = Vec::with_capacity(skills.len());
        for (index, skill) in skills.iter().enumerate() {
            let body = fill_position(&template, "Skill", ListPosition::new(index, skills.len()))?;
            let prefix = ObjectType::Skill.prefix();
            let body = resolve_nested_object(body, skill, ObjectType::Skill, prefix, session).await?;
            let body = if with_details {
                let details = render_object_details(TemplateKind::ObjectSkill, skill, ObjectType::Skill, session).await?;
                fill(&body, "Skill_Details", Indent::Capture, &details)?
            } else {
                body
            };
            rendered.push(body);
        }
        cursor.replace(&join_list_items(&rendered));
    }
    Ok(cursor.finish())
}
