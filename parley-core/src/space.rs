//! Ordered, de-duplicated collections of candidate actions.

use crate::{Action, ActionKey, ConfigurationError, ParleyResult};

/// Ordered set of actions; membership is checked by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSpace {
    actions: Vec<Action>,
}

impl ActionSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a space keeping the first occurrence of every key.
    pub fn from_actions(actions: impl IntoIterator<Item = Action>) -> Self {
        let mut space = Self::new();
        for action in actions {
            if !space.contains(action.key()) {
                space.actions.push(action);
            }
        }
        space
    }

    /// Append an action; a key already present is a configuration error.
    pub fn add(&mut self, action: Action) -> ParleyResult<()> {
        if self.contains(action.key()) {
            return Err(ConfigurationError::DuplicateAction {
                action: action.key().clone(),
            }
            .into());
        }
        self.actions.push(action);
        Ok(())
    }

    /// Append an action unless its key is already present. Returns whether it was added.
    pub fn add_if_absent(&mut self, action: Action) -> bool {
        if self.contains(action.key()) {
            return false;
        }
        self.actions.push(action);
        true
    }

    pub fn remove(&mut self, key: &ActionKey) -> Option<Action> {
        let idx = self.actions.iter().position(|a| a.key() == key)?;
        Some(self.actions.remove(idx))
    }

    pub fn contains(&self, key: &ActionKey) -> bool {
        self.actions.iter().any(|a| a.key() == key)
    }

    pub fn get(&self, key: &ActionKey) -> Option<&Action> {
        self.actions.iter().find(|a| a.key() == key)
    }

    /// Resolve `keys` against this space, preserving the order of `keys`.
    pub fn select_keys(&self, keys: &[ActionKey]) -> ParleyResult<ActionSpace> {
        let mut narrowed = ActionSpace::new();
        for key in keys {
            let action = self
                .get(key)
                .ok_or_else(|| ConfigurationError::UnknownAction { action: key.clone() })?;
            narrowed.add_if_absent(action.clone());
        }
        Ok(narrowed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    pub fn first(&self) -> Option<&Action> {
        self.actions.first()
    }

    pub fn get_index(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    pub fn keys(&self) -> Vec<ActionKey> {
        self.actions.iter().map(|a| a.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl FromIterator<Action> for ActionSpace {
    fn from_iter<T: IntoIterator<Item = Action>>(iter: T) -> Self {
        Self::from_actions(iter)
    }
}
