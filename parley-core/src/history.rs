//! Append-only log of executed actions.

use crate::{Action, ActionContext, ActionKey, ActionResult};

/// One executed step: the action, what it returned, and the context it ran in.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub action: Action,
    pub result: ActionResult,
    pub context: ActionContext,
}

/// Ordered, append-only sequence of executed steps.
///
/// The most recent entry defines the narrowing state. A deliberation is
/// finished once any entry holds the terminal action.
#[derive(Debug, Clone, Default)]
pub struct ActionHistory {
    entries: Vec<HistoryEntry>,
}

impl ActionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, action: Action, result: ActionResult, context: ActionContext) {
        self.entries.push(HistoryEntry {
            action,
            result,
            context,
        });
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Index into the history. Negative indices count from the end:
    /// `-1` is the most recent entry, `-2` the one before it.
    pub fn at(&self, index: isize) -> Option<&HistoryEntry> {
        let resolved = if index < 0 {
            self.entries.len().checked_sub(index.unsigned_abs())?
        } else {
            index as usize
        };
        self.entries.get(resolved)
    }

    /// Name-equality membership.
    pub fn has(&self, key: &ActionKey) -> bool {
        self.entries.iter().any(|e| e.action.key() == key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Keys of executed actions in execution order.
    pub fn keys(&self) -> Vec<ActionKey> {
        self.entries.iter().map(|e| e.action.key().clone()).collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
