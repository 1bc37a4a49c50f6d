//! Placeholder name patterns
//!
//! A pattern is matched against the whole name of a placeholder token (the
//! text between the delimiters). Parametric names embed capture groups, e.g.
//! `Npc_Value_(.*)` captures the field name of `{{Npc_Value_Health}}`.
//! Marker names are matched case-sensitively.

use regex::Regex;

/// An anchored placeholder name pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// Build a pattern from a regex fragment; the fragment must match the full name
    pub fn new(name_pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", name_pattern))?;
        Ok(Self { regex })
    }

    /// Build a pattern matching exactly one literal name
    pub fn literal(name: &str) -> Result<Self, regex::Error> {
        Self::new(&regex::escape(name))
    }

    /// Build a pattern for `<prefix>_<rest>`, where `prefix` is literal and
    /// `rest` is a regex fragment
    pub fn prefixed(prefix: &str, rest: &str) -> Result<Self, regex::Error> {
        Self::new(&format!("{}_{}", regex::escape(prefix), rest))
    }

    /// Check if a placeholder name matches
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// Capture groups of a matching name, in group order
    ///
    /// Groups that did not participate in the match yield empty strings.
    pub fn captures(&self, name: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(name)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }
}
