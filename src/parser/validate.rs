//! Static template validation
//!
//! Checks block pairing and delimiter termination without any render
//! context. Families whose end marker is a shared sentinel (e.g. every
//! `Npc_HasField_<F>_Start` closes with `Npc_HasField_End`) must be declared
//! up front; every other `X_Start` is paired with an `X_End` of the same stem.

use std::collections::HashMap;

use super::lexer::{tokenize, TokenKind, CLOSE_DELIMITER, OPEN_DELIMITER};
use super::pattern::Pattern;
use crate::error::ValidationIssue;

/// A `Start`/`End` marker pair family
#[derive(Debug, Clone)]
pub struct BlockFamily {
    pub start: Pattern,
    pub end: Pattern,
}

impl BlockFamily {
    pub fn new(start: Pattern, end: Pattern) -> Self {
        Self { start, end }
    }
}

/// Result of validating a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

/// Validate block pairing and delimiters in `text`
pub fn validate(text: &str, families: &[BlockFamily]) -> ValidationReport {
    let tokens = tokenize(text);
    let mut claimed = vec![false; tokens.len()];
    let mut issues = Vec::new();

    for family in families {
        let mut open: Vec<usize> = Vec::new();
        for (i, token) in tokens.iter().enumerate() {
            if claimed[i] {
                continue;
            }
            match token.kind {
                TokenKind::BlockStart if family.start.matches(&token.name) => {
                    claimed[i] = true;
                    open.push(i);
                }
                TokenKind::BlockEnd if family.end.matches(&token.name) => {
                    claimed[i] = true;
                    if open.pop().is_none() {
                        issues.push(ValidationIssue::UnmatchedEnd {
                            name: token.name.clone(),
                            span: token.span.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
        issues.extend(open.into_iter().map(|i| ValidationIssue::UnmatchedStart {
            name: tokens[i].name.clone(),
            span: tokens[i].span.clone(),
        }));
    }

    let mut open_by_stem: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, token) in tokens.iter().enumerate() {
        if claimed[i] {
            continue;
        }
        match token.kind {
            TokenKind::BlockStart => open_by_stem.entry(token.stem()).or_default().push(i),
            TokenKind::BlockEnd => {
                let matched = open_by_stem
                    .get_mut(token.stem())
                    .and_then(|open| open.pop())
                    .is_some();
                if !matched {
                    issues.push(ValidationIssue::UnmatchedEnd {
                        name: token.name.clone(),
                        span: token.span.clone(),
                    });
                }
            }
            _ => {}
        }
    }
    for open in open_by_stem.into_values() {
        issues.extend(open.into_iter().map(|i| ValidationIssue::UnmatchedStart {
            name: tokens[i].name.clone(),
            span: tokens[i].span.clone(),
        }));
    }

    for token in tokens.iter().filter(|t| t.kind == TokenKind::Literal) {
        let literal = &text[token.span.clone()];
        let mut from = 0;
        while let Some(pos) = literal[from..].find(OPEN_DELIMITER) {
            let start = token.span.start + from + pos;
            from += pos + OPEN_DELIMITER.len();
            if opens_placeholder(&literal[from..]) {
                issues.push(ValidationIssue::UnterminatedPlaceholder {
                    span: start..start + OPEN_DELIMITER.len(),
                });
            }
        }
    }

    issues.sort_by_key(|issue| issue.span().start);
    ValidationReport {
        valid: issues.is_empty(),
        issues,
    }
}

/// Check if the text after a literal `{{` reads as a placeholder cut short
///
/// Target-language code such as nested Lua tables also contains `{{`; it is
/// only reported when a name follows and the line never closes.
fn opens_placeholder(rest: &str) -> bool {
    let line = rest.split(['\r', '\n']).next().unwrap_or("");
    let starts_name = line
        .trim_start()
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    starts_name && !line.contains(CLOSE_DELIMITER)
}
