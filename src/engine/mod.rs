//! Render pipeline
//!
//! The [`Engine`] holds the ordered resolver registry and the collaborators.
//! It is cheap to clone and holds no per-render state: every top-level render
//! gets its own [`RenderSession`] carrying diagnostics, memo cache and
//! cancellation token, so concurrent renders never share anything mutable.
//!
//! Resolvers re-enter the pipeline by handing a [`RenderRequest`] to the
//! session, which executes it with a fresh text buffer and folds its
//! diagnostics back into the caller's collection.

mod memo;
mod session;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DEFAULT_MAX_RENDER_DEPTH;
use crate::context::RenderContext;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::RenderError;
use crate::kind::TemplateKind;
use crate::parser::{validate, BlockFamily, ValidationReport};
use crate::resolvers::{
    DailyRoutineResolver, DialogResolver, FieldListResolver, FlexFieldResolver,
    InventoryResolver, LanguageResolver, PlaceholderInfo, SkillsResolver, SnippetResolver,
    TopicResolver,
};
use crate::services::Services;

pub use memo::{MemoCache, MemoScope};
pub use session::{RenderRequest, RenderSession};

/// Resolved text plus everything that went wrong on the way
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderOutput {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl RenderOutput {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Number of diagnostics of one kind
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }
}

struct Registered {
    order: u32,
    resolver: Box<dyn TopicResolver>,
}

struct EngineInner {
    resolvers: Vec<Registered>,
    families: Vec<BlockFamily>,
    services: Services,
    max_render_depth: usize,
}

/// Builder collecting resolvers in pipeline order
pub struct EngineBuilder {
    resolvers: Vec<Registered>,
    services: Services,
    max_render_depth: usize,
}

impl EngineBuilder {
    pub fn new(services: Services) -> Self {
        Self {
            resolvers: Vec::new(),
            services,
            max_render_depth: DEFAULT_MAX_RENDER_DEPTH,
        }
    }

    /// Register a resolver; lower orders run first, ties keep registration order
    pub fn register(mut self, order: u32, resolver: impl TopicResolver + 'static) -> Self {
        self.resolvers.push(Registered {
            order,
            resolver: Box::new(resolver),
        });
        self
    }

    pub fn with_max_render_depth(mut self, depth: usize) -> Self {
        self.max_render_depth = depth;
        self
    }

    pub fn build(mut self) -> Result<Engine, RenderError> {
        self.resolvers.sort_by_key(|r| r.order);
        let mut families = Vec::new();
        for registered in &self.resolvers {
            families.extend(registered.resolver.block_families()?);
        }

        Ok(Engine {
            inner: Arc::new(EngineInner {
                resolvers: self.resolvers,
                families,
                services: self.services,
                max_render_depth: self.max_render_depth,
            }),
        })
    }
}

/// Ordered resolver pipeline
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn builder(services: Services) -> EngineBuilder {
        EngineBuilder::new(services)
    }

    /// Engine with every built-in resolver in its standard order
    pub fn standard(services: Services) -> Result<Self, RenderError> {
        Self::standard_builder(services).build()
    }

    /// Builder preloaded with the built-in resolvers
    ///
    /// Snippets and dialogs expand first so the text they insert is seen by
    /// the later families; flex fields run after the list families so object
    /// placeholders inside expanded lists resolve, and usage tracking sees
    /// the final text.
    pub fn standard_builder(services: Services) -> EngineBuilder {
        EngineBuilder::new(services)
            .register(10, SnippetResolver)
            .register(20, DialogResolver)
            .register(30, DailyRoutineResolver)
            .register(40, InventoryResolver)
            .register(50, SkillsResolver)
            .register(60, FlexFieldResolver)
            .register(70, FieldListResolver)
            .register(80, LanguageResolver)
    }

    pub fn services(&self) -> &Services {
        &self.inner.services
    }

    pub fn max_render_depth(&self) -> usize {
        self.inner.max_render_depth
    }

    /// Names of the resolvers applicable to a kind, in pipeline order
    pub fn pipeline(&self, kind: TemplateKind) -> Vec<&'static str> {
        self.applicable(kind).map(|r| r.name()).collect()
    }

    fn applicable(&self, kind: TemplateKind) -> impl Iterator<Item = &dyn TopicResolver> {
        self.inner
            .resolvers
            .iter()
            .map(|r| r.resolver.as_ref())
            .filter(move |r| r.is_applicable(kind))
    }

    /// Render a template
    ///
    /// Only cancellation is returned as an error; every other problem is
    /// reported in the output's diagnostics.
    pub async fn render(
        &self,
        kind: TemplateKind,
        text: &str,
        context: &RenderContext,
    ) -> Result<RenderOutput, RenderError> {
        self.render_with_cancellation(kind, text, context, CancellationToken::new())
            .await
    }

    /// Render a template, stopping at the next suspension point once `cancel` fires
    pub async fn render_with_cancellation(
        &self,
        kind: TemplateKind,
        text: &str,
        context: &RenderContext,
        cancel: CancellationToken,
    ) -> Result<RenderOutput, RenderError> {
        let mut session = RenderSession::new(self.clone(), cancel);
        let text = self.run(kind, text.to_string(), context, &mut session).await?;
        Ok(RenderOutput {
            text,
            diagnostics: session.into_errors().into_entries(),
        })
    }

    /// Placeholders understood for a kind, de-duplicated by name
    pub fn placeholder_catalog(&self, kind: TemplateKind) -> Vec<PlaceholderInfo> {
        let mut seen = HashSet::new();
        self.applicable(kind)
            .flat_map(|r| r.placeholder_catalog(kind))
            .filter(|info| seen.insert(info.name.clone()))
            .collect()
    }

    /// Check block pairing and delimiters without rendering
    pub fn validate(&self, text: &str) -> ValidationReport {
        validate(text, &self.inner.families)
    }

    pub(crate) async fn run(
        &self,
        kind: TemplateKind,
        text: String,
        context: &RenderContext,
        session: &mut RenderSession,
    ) -> Result<String, RenderError> {
        for issue in self.validate(&text).issues {
            session.errors_mut().record(
                DiagnosticKind::MalformedTemplate,
                format!("{} (byte {})", issue, issue.span().start),
            );
        }

        let mut text = text;
        for resolver in self.applicable(kind) {
            session.checkpoint()?;
            debug!(%kind, resolver = resolver.name(), depth = session.depth(), "resolving");
            match resolver.resolve(kind, text.clone(), context, session).await {
                Ok(resolved) => text = resolved,
                Err(RenderError::Cancelled) => return Err(RenderError::Cancelled),
                Err(err) => {
                    warn!(%kind, resolver = resolver.name(), error = %err, "resolver failed");
                    session
                        .errors_mut()
                        .record(err.diagnostic_kind(), format!("{}: {}", resolver.name(), err));
                }
            }
        }
        Ok(text)
    }
}
