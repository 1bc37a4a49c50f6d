//! Per-render memo cache for derived script functions

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::model::ScriptFunction;

/// Which derivation a memo entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoScope {
    /// Keyed by dialog id
    DialogFunctions,
    /// Keyed by schedule event id
    EventFunctions,
    /// Keyed by snippet id
    SnippetFunctions,
}

/// Functions derived once per domain object within one top-level render
#[derive(Debug, Default)]
pub struct MemoCache {
    entries: HashMap<(MemoScope, String), Arc<[ScriptFunction]>>,
}

impl MemoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, scope: MemoScope, id: &str) -> Option<Arc<[ScriptFunction]>> {
        let hit = self.entries.get(&(scope, id.to_string())).cloned();
        trace!(?scope, id, hit = hit.is_some(), "memo lookup");
        hit
    }

    /// Store derived functions and return the shared copy
    pub fn insert(
        &mut self,
        scope: MemoScope,
        id: &str,
        functions: Vec<ScriptFunction>,
    ) -> Arc<[ScriptFunction]> {
        let functions: Arc<[ScriptFunction]> = functions.into();
        self.entries
            .insert((scope, id.to_string()), Arc::clone(&functions));
        functions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str) -> ScriptFunction {
        ScriptFunction {
            name: name.to_string(),
            code: String::new(),
            parent_preview: String::new(),
        }
    }

    #[test]
    fn test_scopes_do_not_collide() {
        let mut memo = MemoCache::new();
        memo.insert(MemoScope::EventFunctions, "1", vec![function("a")]);
        assert!(memo.get(MemoScope::EventFunctions, "1").is_some());
        assert!(memo.get(MemoScope::SnippetFunctions, "1").is_none());
    }

    #[test]
    fn test_insert_returns_shared_copy() {
        let mut memo = MemoCache::new();
        let stored = memo.insert(MemoScope::DialogFunctions, "d", vec![function("a"), function("b")]);
        let fetched = memo.get(MemoScope::DialogFunctions, "d").unwrap();
        assert!(Arc::ptr_eq(&stored, &fetched));
        assert_eq!(fetched.len(), 2);
        assert_eq!(memo.len(), 1);
    }
}
