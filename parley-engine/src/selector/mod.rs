//! Selection policies: pick exactly one action from a narrowed space.

mod embedding;
mod prompted;
mod random;

pub use embedding::EmbeddingSelector;
pub use prompted::ModelPromptedSelector;
pub use random::RandomSelector;

use async_trait::async_trait;
use parley_core::{Action, ActionContext, ActionParams, ActionSpace, ConfigurationError, ParleyResult};

/// A chosen action together with the parameters it will be invoked with.
#[derive(Debug, Clone)]
pub struct Selection {
    pub action: Action,
    pub params: ActionParams,
}

impl Selection {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            params: ActionParams::new(),
        }
    }

    pub fn with_params(mut self, params: ActionParams) -> Self {
        self.params = params;
        self
    }
}

/// Picks one member of a non-empty action space.
#[async_trait]
pub trait ActionSelector: Send + Sync {
    async fn select(&self, space: &ActionSpace, ctx: &ActionContext) -> ParleyResult<Selection>;
}

/// Shared precondition of every selector: an empty space fails, a single
/// candidate is chosen without consulting the policy.
pub(crate) fn trivial_choice(space: &ActionSpace) -> ParleyResult<Option<Selection>> {
    match space.len() {
        0 => Err(ConfigurationError::EmptyActionSpace.into()),
        1 => Ok(space.first().cloned().map(Selection::new)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{noop, profile, FixedEmbedder, ScriptedModel};
    use parley_core::{ChatMessage, Conversation, ParleyError};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn space_of(n: usize) -> ActionSpace {
        (0..n).map(|i| noop(&format!("action_{i}"))).collect()
    }

    #[test]
    fn test_trivial_choice_rules() {
        assert_eq!(
            trivial_choice(&ActionSpace::new()).unwrap_err(),
            ParleyError::Configuration(ConfigurationError::EmptyActionSpace)
        );
        let single = trivial_choice(&space_of(1)).unwrap().unwrap();
        assert_eq!(single.action.name(), "action_0");
        assert!(trivial_choice(&space_of(2)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_selectors_reject_empty_space() {
        let ctx = ActionContext::new(profile("alice"));
        let selectors: Vec<Box<dyn ActionSelector>> = vec![
            Box::new(RandomSelector::seeded(1)),
            Box::new(EmbeddingSelector::new(Arc::new(FixedEmbedder::default()))),
            Box::new(ModelPromptedSelector::new(Arc::new(ScriptedModel::new(vec![])))),
        ];
        for selector in selectors {
            let err = selector.select(&ActionSpace::new(), &ctx).await.unwrap_err();
            assert!(err.is_configuration());
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Every selector returns a member of the exact space it was given.
        #[test]
        fn prop_selection_is_member_of_space(size in 1usize..12, seed in any::<u64>(), pick in 0usize..12) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let space = space_of(size);
            let ctx = ActionContext::new(profile("alice"))
                .with_conversation(Conversation::new().with(ChatMessage::user("anything")));
            let reply = format!(r#"{{"name": "action_{}"}}"#, pick % size);
            let selectors: Vec<Box<dyn ActionSelector>> = vec![
                Box::new(RandomSelector::seeded(seed)),
                Box::new(EmbeddingSelector::new(Arc::new(FixedEmbedder::default()))),
                Box::new(ModelPromptedSelector::new(Arc::new(ScriptedModel::new(vec![reply])))),
            ];
            for selector in selectors {
                let selection = runtime.block_on(selector.select(&space, &ctx)).unwrap();
                prop_assert!(space.contains(selection.action.key()));
            }
        }
    }
}
