//! Diagnostics collected while rendering
//!
//! A render never aborts on a missing attribute or an unused snippet. Each
//! problem is appended to an [`ErrorCollection`] together with the breadcrumb
//! of nested renders active at the time, and the caller decides what to do
//! with the list once the text is produced.

use std::fmt;

use serde::Serialize;

/// Category of a diagnostic entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// An identifier could not be found (attribute, snippet, collection entry)
    MissingReference,
    /// Input was supplied but no placeholder consumed it
    UnusedInput,
    /// Unpaired block markers or an unterminated placeholder
    MalformedTemplate,
    /// A collaborator lookup failed
    UpstreamFailure,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DiagnosticKind::MissingReference => "missing reference",
            DiagnosticKind::UnusedInput => "unused input",
            DiagnosticKind::MalformedTemplate => "malformed template",
            DiagnosticKind::UpstreamFailure => "upstream failure",
        };
        f.write_str(text)
    }
}

/// A single diagnostic entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Labels of the nested renders active when the entry was recorded, outermost first
    pub breadcrumb: Vec<String>,
    pub kind: DiagnosticKind,
    pub detail: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.breadcrumb.is_empty() {
            write!(f, "{}: {}", self.kind, self.detail)
        } else {
            write!(
                f,
                "[{}] {}: {}",
                self.breadcrumb.join(" > "),
                self.kind,
                self.detail
            )
        }
    }
}

/// Handle returned by [`ErrorCollection::push_context`]
///
/// Passing it back to [`ErrorCollection::restore`] truncates the breadcrumb to
/// what it was before the push, regardless of any pushes made in between.
#[must_use = "pass the scope to ErrorCollection::restore"]
#[derive(Debug)]
pub struct ContextScope {
    depth: usize,
}

/// Append-only diagnostic log with a breadcrumb stack
#[derive(Debug, Clone, Default)]
pub struct ErrorCollection {
    entries: Vec<Diagnostic>,
    context: Vec<String>,
}

/// Inline marker written into the output for an unresolved reference
pub fn missing_marker(subject: &str, field: &str) -> String {
    format!("<<{}[{}] MISSING>>", subject, field)
}

impl ErrorCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a named context
    pub fn push_context(&mut self, label: impl Into<String>) -> ContextScope {
        let depth = self.context.len();
        self.context.push(label.into());
        ContextScope { depth }
    }

    /// Leave a context entered with [`push_context`](Self::push_context)
    pub fn restore(&mut self, scope: ContextScope) {
        self.context.truncate(scope.depth);
    }

    /// Currently active breadcrumb, outermost first
    pub fn breadcrumb(&self) -> &[String] {
        &self.context
    }

    pub fn record(&mut self, kind: DiagnosticKind, detail: impl Into<String>) {
        self.entries.push(Diagnostic {
            breadcrumb: self.context.clone(),
            kind,
            detail: detail.into(),
        });
    }

    /// Record a missing reference and return the inline marker for it
    pub fn missing(&mut self, subject: &str, field: &str) -> String {
        self.record(
            DiagnosticKind::MissingReference,
            format!("{} has no field '{}'", subject, field),
        );
        missing_marker(subject, field)
    }

    /// Fold a nested render's diagnostics into this collection
    ///
    /// Every merged entry is prefixed with the breadcrumb active here.
    pub fn merge(&mut self, other: ErrorCollection) {
        for mut entry in other.entries {
            let mut breadcrumb = self.context.clone();
            breadcrumb.append(&mut entry.breadcrumb);
            entry.breadcrumb = breadcrumb;
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of entries of one kind
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }
}
