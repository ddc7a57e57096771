//! PARLEY Engine - Deliberation Loop
//!
//! An [`Agent`] repeatedly narrows its action space with an
//! [`ActionNarrower`], picks one candidate with an [`ActionSelector`], runs
//! it, and records the step, until its terminal action has executed.

pub mod actions;
mod agent;
mod deliberator;
mod narrower;
pub mod selector;

pub use actions::{DiscoverTools, Finish, RetryGate, ToolCall};
pub use agent::{Agent, RunReport, ThinkingStep};
pub use deliberator::{Deliberator, RunHandle};
pub use narrower::{ActionNarrower, GraphNarrower};
pub use selector::{
    ActionSelector, EmbeddingSelector, ModelPromptedSelector, RandomSelector, Selection,
};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::narrower::ActionNarrower;
    use crate::selector::{ActionSelector, Selection};
    use async_trait::async_trait;
    use parley_core::{
        Action, ActionBody, ActionContext, ActionEnv, ActionError, ActionKey, ActionParams,
        ActionResult, ActionSpace, AgentProfile, ChatMessage, ConfigurationError, EmbeddingProvider,
        EmbeddingVector, LlmError, ModelClient, ParleyResult, ToolCatalog, ToolSpec, Workspace,
    };
    use serde_json::{json, Value};
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    pub fn profile(name: &str) -> AgentProfile {
        AgentProfile::new(name, format!("{name} test agent"))
    }

    struct Returning(ActionResult);

    #[async_trait]
    impl ActionBody for Returning {
        async fn execute(
            &self,
            _params: ActionParams,
            _ctx: &ActionContext,
            _env: &mut ActionEnv<'_>,
        ) -> ParleyResult<ActionResult> {
            Ok(self.0.clone())
        }
    }

    struct Failing(ActionKey, String);

    #[async_trait]
    impl ActionBody for Failing {
        async fn execute(
            &self,
            _params: ActionParams,
            _ctx: &ActionContext,
            _env: &mut ActionEnv<'_>,
        ) -> ParleyResult<ActionResult> {
            Err(ActionError::Failed {
                action: self.0.clone(),
                reason: self.1.clone(),
            }
            .into())
        }
    }

    struct Slow(Duration);

    #[async_trait]
    impl ActionBody for Slow {
        async fn execute(
            &self,
            _params: ActionParams,
            _ctx: &ActionContext,
            _env: &mut ActionEnv<'_>,
        ) -> ParleyResult<ActionResult> {
            tokio::time::sleep(self.0).await;
            Ok(ActionResult::new())
        }
    }

    pub fn noop(key: &str) -> Action {
        Action::new(key, format!("{key} action"), Returning(ActionResult::new()))
    }

    pub fn described(key: &str, description: &str) -> Action {
        Action::new(key, description, Returning(ActionResult::new()))
    }

    pub fn returning(key: &str, values: Value) -> Action {
        let mut result = ActionResult::new();
        if let Value::Object(map) = values {
            for (name, value) in map {
                result.insert(name, value);
            }
        }
        Action::new(key, format!("{key} action"), Returning(result))
    }

    pub fn failing(key: &str, reason: &str) -> Action {
        Action::new(
            key,
            format!("{key} action"),
            Failing(ActionKey::new(key), reason.to_string()),
        )
    }

    pub fn slow(key: &str, delay: Duration) -> Action {
        Action::new(key, format!("{key} action"), Slow(delay))
    }

    /// Text → vector table; unknown texts embed to `[1, 0]`.
    #[derive(Default)]
    pub struct FixedEmbedder {
        vectors: HashMap<String, Vec<f32>>,
    }

    impl FixedEmbedder {
        pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.vectors.insert(text.to_string(), vector);
            self
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, text: &str) -> ParleyResult<EmbeddingVector> {
            let data = self.vectors.get(text).cloned().unwrap_or_else(|| vec![1.0, 0.0]);
            Ok(EmbeddingVector::new(data, "fixed"))
        }

        fn model_id(&self) -> &str {
            "fixed"
        }
    }

    /// Replies in order; running out is an invalid-response error.
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<String>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }

        fn next(&self) -> ParleyResult<String> {
            self.replies
                .lock()
                .ok()
                .and_then(|mut r| r.pop_front())
                .ok_or_else(|| {
                    LlmError::InvalidResponse {
                        provider: "scripted".to_string(),
                        reason: "script exhausted".to_string(),
                    }
                    .into()
                })
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn call(&self, _prompt: &str) -> ParleyResult<String> {
            self.next()
        }

        async fn call_with_history(&self, _messages: &[ChatMessage]) -> ParleyResult<String> {
            self.next()
        }
    }

    pub struct MockTools {
        tools: Vec<ToolSpec>,
    }

    impl MockTools {
        pub fn new(names: &[&str]) -> Self {
            Self {
                tools: names
                    .iter()
                    .map(|name| ToolSpec {
                        name: name.to_string(),
                        description: format!("{name} tool"),
                        input_schema: json!({}),
                    })
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl ToolCatalog for MockTools {
        async fn list_tools(&self) -> ParleyResult<Vec<ToolSpec>> {
            Ok(self.tools.clone())
        }

        async fn call_tool(&self, name: &str, _params: &ActionParams) -> ParleyResult<Value> {
            Ok(json!({ "tool": name }))
        }
    }

    #[derive(Default)]
    pub struct CountingNarrower {
        calls: Arc<AtomicUsize>,
    }

    impl CountingNarrower {
        pub fn calls(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.calls)
        }
    }

    impl ActionNarrower for CountingNarrower {
        fn narrow(
            &self,
            _workspace: &Workspace,
            space: &ActionSpace,
            _ctx: &ActionContext,
        ) -> ParleyResult<ActionSpace> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(space.clone())
        }

        fn register(&mut self, _action: &Action, _producer: Option<&ActionKey>) {}
    }

    #[derive(Default)]
    pub struct CountingSelector {
        calls: Arc<AtomicUsize>,
    }

    impl CountingSelector {
        pub fn calls(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.calls)
        }
    }

    #[async_trait]
    impl ActionSelector for CountingSelector {
        async fn select(&self, space: &ActionSpace, _ctx: &ActionContext) -> ParleyResult<Selection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            space
                .first()
                .cloned()
                .map(Selection::new)
                .ok_or_else(|| ConfigurationError::EmptyActionSpace.into())
        }
    }
}
