//! Per-deliberation container for history and auxiliary state.

use crate::ActionHistory;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// Free-form state that actions persist across turns without polluting results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateBag {
    values: BTreeMap<String, Value>,
}

impl StateBag {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Decode a stored value; `None` when missing or of a different shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One resumable deliberation. Exclusively owned by the run that uses it.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub history: ActionHistory,
    pub state: StateBag,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop history and state so a fresh deliberation can start.
    pub fn reset(&mut self) {
        self.history.clear();
        self.state.clear();
    }
}
