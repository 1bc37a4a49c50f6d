//! State of one top-level render

use std::mem;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::memo::{MemoCache, MemoScope};
use super::Engine;
use crate::context::RenderContext;
use crate::diagnostics::ErrorCollection;
use crate::error::{RenderError, ServiceError};
use crate::kind::TemplateKind;
use crate::model::{Script, ScriptFunction};
use crate::services::Services;
use crate::template::PLACEHOLDER_ENGINE;

/// A nested render a resolver asks the engine to execute
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub kind: TemplateKind,
    pub text: String,
    pub context: RenderContext,
    /// Breadcrumb label applied to the nested render's diagnostics
    pub label: Option<String>,
}

impl RenderRequest {
    pub fn new(kind: TemplateKind, text: impl Into<String>, context: RenderContext) -> Self {
        Self {
            kind,
            text: text.into(),
            context,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Per-render state handed to every resolver
///
/// Owns the diagnostics and the memo cache of one top-level render. Nothing
/// here is shared between concurrent renders.
pub struct RenderSession {
    engine: Engine,
    errors: ErrorCollection,
    memo: MemoCache,
    cancel: CancellationToken,
    depth: usize,
}

impl RenderSession {
    pub(crate) fn new(engine: Engine, cancel: CancellationToken) -> Self {
        Self {
            engine,
            errors: ErrorCollection::new(),
            memo: MemoCache::new(),
            cancel,
            depth: 0,
        }
    }

    pub fn services(&self) -> &Services {
        self.engine.services()
    }

    pub fn errors(&self) -> &ErrorCollection {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorCollection {
        &mut self.errors
    }

    pub(crate) fn into_errors(self) -> ErrorCollection {
        self.errors
    }

    pub fn memo(&mut self) -> &mut MemoCache {
        &mut self.memo
    }

    /// Nesting depth of the render currently executing
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail with `Cancelled` once the caller cancelled the render
    pub fn checkpoint(&self) -> Result<(), RenderError> {
        if self.cancel.is_cancelled() {
            Err(RenderError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Execute a nested render through the engine pipeline
    ///
    /// The nested render collects diagnostics into its own collection, which
    /// is merged back under the request's label whether or not it succeeds.
    pub async fn render(&mut self, request: RenderRequest) -> Result<String, RenderError> {
        self.checkpoint()?;
        let limit = self.engine.max_render_depth();
        if self.depth >= limit {
            return Err(RenderError::RecursionLimit { limit });
        }

        let engine = self.engine.clone();
        let outer = mem::take(&mut self.errors);
        self.depth += 1;
        let result = engine
            .run(request.kind, request.text, &request.context, self)
            .await;
        self.depth -= 1;
        let nested = mem::replace(&mut self.errors, outer);

        match request.label {
            Some(label) => {
                let scope = self.errors.push_context(label);
                self.errors.merge(nested);
                self.errors.restore(scope);
            }
            None => self.errors.merge(nested),
        }
        result
    }

    /// Fold a failed step into diagnostics and continue with a default value
    ///
    /// Cancellation is never folded.
    pub fn recover<T: Default>(&mut self, result: Result<T, RenderError>) -> Result<T, RenderError> {
        match result {
            Ok(value) => Ok(value),
            Err(RenderError::Cancelled) => Err(RenderError::Cancelled),
            Err(err) => {
                warn!(error = %err, "render step failed");
                self.errors.record(err.diagnostic_kind(), err.to_string());
                Ok(T::default())
            }
        }
    }

    /// Fetch the default template of a kind for the engine's project
    pub async fn default_template(&self, kind: TemplateKind) -> Result<String, RenderError> {
        self.checkpoint()?;
        let services = self.services();
        let template = services
            .templates
            .default_template(&services.project_id, kind)
            .await?;
        if template.engine_tag != PLACEHOLDER_ENGINE {
            return Err(ServiceError::UnsupportedEngine {
                tag: template.engine_tag,
                kind: kind.to_string(),
            }
            .into());
        }
        Ok(template.text)
    }

    /// Render the default template of `kind` against `context`
    pub async fn render_default(
        &mut self,
        kind: TemplateKind,
        context: RenderContext,
        label: impl Into<String>,
    ) -> Result<String, RenderError> {
        let template = self.default_template(kind).await?;
        self.render(RenderRequest::new(kind, template, context).with_label(label))
            .await
    }

    /// Derive script functions once per scope and id
    pub async fn script_functions(
        &mut self,
        scope: MemoScope,
        id: &str,
        owner_name: &str,
        script: &Script,
    ) -> Result<Arc<[ScriptFunction]>, RenderError> {
        if let Some(functions) = self.memo.get(scope, id) {
            return Ok(functions);
        }
        self.checkpoint()?;
        let generator = Arc::clone(&self.services().scripts);
        let functions = generator.generate(owner_name, script).await?;
        Ok(self.memo.insert(scope, id, functions))
    }
}
