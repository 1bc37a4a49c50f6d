//! Error types for rendering, collaborators and validation

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::diagnostics::DiagnosticKind;
use crate::parser::lexer::Span;

/// Failures reported by external collaborators
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported rendering engine '{tag}' for template kind {kind}")]
    UnsupportedEngine { tag: String, kind: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while resolving a template
#[derive(Error, Debug)]
pub enum RenderError {
    /// The caller cancelled the render
    #[error("render cancelled")]
    Cancelled,

    #[error(transparent)]
    Upstream(#[from] ServiceError),

    #[error("invalid placeholder pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("nested render depth exceeded {limit}")]
    RecursionLimit { limit: usize },

    #[error("{resolver} cannot render a {found} subject")]
    SubjectMismatch {
        resolver: &'static str,
        found: &'static str,
    },
}

impl RenderError {
    /// Category under which a folded resolver failure is reported
    pub fn diagnostic_kind(&self) -> DiagnosticKind {
        match self {
            RenderError::Upstream(ServiceError::NotFound { .. }) => {
                DiagnosticKind::MissingReference
            }
            RenderError::Upstream(_) => DiagnosticKind::UpstreamFailure,
            RenderError::Cancelled
            | RenderError::Pattern(_)
            | RenderError::RecursionLimit { .. }
            | RenderError::SubjectMismatch { .. } => DiagnosticKind::MalformedTemplate,
        }
    }
}

/// A structural problem found by static template validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    #[error("block start '{name}' has no matching end")]
    UnmatchedStart { name: String, span: Span },

    #[error("block end '{name}' has no matching start")]
    UnmatchedEnd { name: String, span: Span },

    #[error("placeholder opened but never closed on the same line")]
    UnterminatedPlaceholder { span: Span },
}

impl ValidationIssue {
    pub fn span(&self) -> &Span {
        match self {
            ValidationIssue::UnmatchedStart { span, .. }
            | ValidationIssue::UnmatchedEnd { span, .. }
            | ValidationIssue::UnterminatedPlaceholder { span } => span,
        }
    }

    fn hint(&self) -> &'static str {
        match self {
            ValidationIssue::UnmatchedStart { .. } => "this block is never closed",
            ValidationIssue::UnmatchedEnd { .. } => "nothing opens this block",
            ValidationIssue::UnterminatedPlaceholder { .. } => "expected '}}' before end of line",
        }
    }

    /// Format the issue with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let span = self.span().clone();
        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message(self.to_string())
            .with_label(
                Label::new((filename, span))
                    .with_message(self.hint())
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_missing_reference() {
        let err = RenderError::from(ServiceError::NotFound {
            what: "item",
            id: "7".to_string(),
        });
        assert_eq!(err.diagnostic_kind(), DiagnosticKind::MissingReference);
        assert_eq!(err.to_string(), "item not found: 7");
    }

    #[test]
    fn test_unavailable_maps_to_upstream_failure() {
        let err = RenderError::from(ServiceError::Unavailable("db".to_string()));
        assert_eq!(err.diagnostic_kind(), DiagnosticKind::UpstreamFailure);
    }

    #[test]
    fn test_recursion_limit_is_malformed_template() {
        let err = RenderError::RecursionLimit { limit: 16 };
        assert_eq!(err.diagnostic_kind(), DiagnosticKind::MalformedTemplate);
    }

    #[test]
    fn test_issue_format_mentions_message() {
        let issue = ValidationIssue::UnmatchedStart {
            name: "Inventory_Start".to_string(),
            span: 4..23,
        };
        let report = issue.format("abc {{Inventory_Start}}", "npc.lua");
        assert!(report.contains("block start 'Inventory_Start' has no matching end"));
        assert!(report.contains("npc.lua"));
    }
}
