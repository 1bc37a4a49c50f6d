//! Export snippets: named code blocks an object supplies to its template

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{fill, render_functions, subject_object, PlaceholderInfo, TopicResolver};
use crate::context::{RenderContext, Subject};
use crate::diagnostics::{missing_marker, DiagnosticKind};
use crate::engine::{MemoScope, RenderSession};
use crate::error::RenderError;
use crate::kind::TemplateKind;
use crate::model::{ExportSnippet, FlexFieldObject, ScriptFunction};
use crate::parser::{render_conditional, BlockFamily, Indent, Pattern, ScalarCursor};

pub struct SnippetResolver;

#[async_trait]
impl TopicResolver for SnippetResolver {
    fn name(&self) -> &'static str {
        "snippets"
    }

    fn is_applicable(&self, kind: TemplateKind) -> bool {
        kind.object_type().is_some() || kind == TemplateKind::SnippetFunction
    }

    async fn resolve(
        &self,
        kind: TemplateKind,
        text: String,
        context: &RenderContext,
        session: &mut RenderSession,
    ) -> Result<String, RenderError> {
        if kind == TemplateKind::SnippetFunction {
            let Subject::SnippetFunction(function) = &context.subject else {
                return Err(RenderError::SubjectMismatch {
                    resolver: self.name(),
                    found: context.subject.type_name(),
                });
            };
            return resolve_function(&text, function);
        }

        let object = subject_object(self.name(), context)?;
        let scope = session.errors_mut().push_context("Snippets");
        let result = SnippetPass::new(object).run(text, context, session).await;
        session.errors_mut().restore(scope);
        result
    }

    fn placeholder_catalog(&self, kind: TemplateKind) -> Vec<PlaceholderInfo> {
        if kind == TemplateKind::SnippetFunction {
            return vec![
                PlaceholderInfo::new("SnippetFunction_Name", "Name of the function"),
                PlaceholderInfo::new("SnippetFunction_Content", "Code of the function"),
                PlaceholderInfo::new("SnippetFunction_ParentPreview", "Name of the snippet the function belongs to"),
            ];
        }
        vec![
            PlaceholderInfo::new("Snippet_<Name>", "Code of the snippet's primary function"),
            PlaceholderInfo::new("Snippet_<Name>_FunctionName", "Name of the snippet's primary function"),
            PlaceholderInfo::new(
                "Snippet_<Name>_AdditionalFunctions",
                "Every other function of the snippet, rendered with the snippet function template",
            ),
            PlaceholderInfo::new(
                "HasSnippet_<Name>_Start/HasSnippet_End",
                "Kept if the object defines the snippet",
            ),
            PlaceholderInfo::new(
                "HasNotSnippet_<Name>_Start/HasNotSnippet_End",
                "Kept if the object does not define the snippet",
            ),
        ]
    }

    fn block_families(&self) -> Result<Vec<BlockFamily>, regex::Error> {
        Ok(vec![
            BlockFamily::new(Pattern::new("HasSnippet_.+_Start")?, Pattern::new("HasSnippet_End")?),
            BlockFamily::new(Pattern::new("HasNotSnippet_.+_Start")?, Pattern::new("HasNotSnippet_End")?),
        ])
    }
}

/// Snippet resolution over one object, tracking which snippets were used
struct SnippetPass<'a> {
    object: &'a FlexFieldObject,
    consumed: HashSet<&'a str>,
}

impl<'a> SnippetPass<'a> {
    fn new(object: &'a FlexFieldObject) -> Self {
        Self {
            object,
            consumed: HashSet::new(),
        }
    }

    /// Look up a snippet by the name used in a placeholder and mark it used
    fn take(&mut self, name: &str, session: &mut RenderSession) -> Result<&'a ExportSnippet, String> {
        match self.object.snippet(name) {
            Some(snippet) => {
                self.consumed.insert(snippet.id.as_str());
                Ok(snippet)
            }
            None => {
                session.errors_mut().record(
                    DiagnosticKind::MissingReference,
                    format!("{} has no export snippet '{}'", self.object.name, name),
                );
                Err(missing_marker(&self.object.name, name))
            }
        }
    }

    async fn functions(
        &self,
        snippet: &ExportSnippet,
        session: &mut RenderSession,
    ) -> Result<Option<Arc<[ScriptFunction]>>, RenderError> {
        // Snippet ids are only unique per object and nested item renders share the memo
        let id = format!("{}/{}", self.object.id, snippet.id);
        let functions = session
            .script_functions(MemoScope::SnippetFunctions, &id, &self.object.name, &snippet.script())
            .await
            .map(Some);
        session.recover(functions)
    }

    async fn run(
        mut self,
        text: String,
        context: &RenderContext,
        session: &mut RenderSession,
    ) -> Result<String, RenderError> {
        let object = self.object;
        let start = Pattern::new("HasSnippet_(.*)_Start")?;
        let end = Pattern::literal("HasSnippet_End")?;
        let text = render_conditional(&text, &start, &end, |caps| object.snippet(&caps[0]).is_some());

        let start = Pattern::new("HasNotSnippet_(.*)_Start")?;
        let end = Pattern::literal("HasNotSnippet_End")?;
        let text = render_conditional(&text, &start, &end, |caps| object.snippet(&caps[0]).is_none());

        let pattern = Pattern::new("Snippet_(.*)_AdditionalFunctions")?;
        let mut cursor = ScalarCursor::new(text, &pattern, Indent::Capture);
        while let Some(caps) = cursor.next_match() {
            let replacement = match self.take(&caps[0], session) {
                Ok(snippet) => match self.functions(snippet, session).await? {
                    Some(functions) if functions.len() > 1 => {
                        render_functions(
                            session,
                            TemplateKind::SnippetFunction,
                            &functions[1..],
                            context.object_type,
                            |f| Subject::SnippetFunction(f.clone()),
                        )
                        .await?
                    }
                    _ => String::new(),
                },
                Err(marker) => marker,
            };
            cursor.replace(&replacement);
        }
        let text = cursor.finish();

        let pattern = Pattern::new("Snippet_(.*)_FunctionName")?;
        let mut cursor = ScalarCursor::new(text, &pattern, Indent::Inline);
        while let Some(caps) = cursor.next_match() {
            let replacement = match self.take(&caps[0], session) {
                Ok(snippet) => self
                    .functions(snippet, session)
                    .await?
                    .and_then(|functions| functions.first().map(|f| f.name.clone()))
                    .unwrap_or_default(),
                Err(marker) => marker,
            };
            cursor.replace(&replacement);
        }
        let text = cursor.finish();

        let pattern = Pattern::new("Snippet_(.*)")?;
        let mut cursor = ScalarCursor::new(text, &pattern, Indent::Capture);
        while let Some(caps) = cursor.next_match() {
            let replacement = match self.take(&caps[0], session) {
                Ok(snippet) => self
                    .functions(snippet, session)
                    .await?
                    .and_then(|functions| functions.first().map(|f| f.code.clone()))
                    .unwrap_or_default(),
                Err(marker) => marker,
            };
            cursor.replace(&replacement);
        }
        let text = cursor.finish();

        for snippet in &self.object.export_snippets {
            if !self.consumed.contains(snippet.id.as_str()) {
                session.errors_mut().record(
                    DiagnosticKind::UnusedInput,
                    format!("export snippet '{}' is not used by the template", snippet.name),
                );
            }
        }
        Ok(text)
    }
}

fn resolve_function(text: &str, function: &ScriptFunction) -> Result<String, RenderError> {
    let text = fill(text, "SnippetFunction_Name", Indent::Inline, &function.name)?;
    let text = fill(&text, "SnippetFunction_ParentPreview", Indent::Inline, &function.parent_preview)?;
    fill(&text, "SnippetFunction_Content", Indent::Capture, &function.code)
}
