//! PARLEY Test Utilities
//!
//! Shared test infrastructure for the PARLEY workspace:
//! - Scripted collaborators (model, embeddings, tools)
//! - Scripted action bodies
//! - Agent fixtures for common graph shapes
//! - Proptest generators
//! - Assertions over `ParleyResult`

pub use parley_core::{
    Action, ActionBody, ActionCapabilities, ActionContext, ActionEnv, ActionError, ActionKey,
    ActionParams, ActionResult, ActionSpace, AgentProfile, ChatMessage, Conversation,
    EmbeddingProvider, EmbeddingVector, LlmError, ModelClient, ParleyError, ParleyResult, Task,
    TaskPriority, TaskStatus, ToolCatalog, ToolError, ToolSpec,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

// ============================================================================
// SCRIPTED COLLABORATORS
// ============================================================================

/// Model client that answers from a fixed script and records every prompt.
///
/// Once the script runs out, calls fail with `LlmError::InvalidResponse`
/// unless a fallback reply is set.
#[derive(Debug, Default)]
pub struct ScriptedModelClient {
    replies: Mutex<VecDeque<String>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModelClient {
    pub fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Reply used once the script is exhausted.
    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn answer(&self, prompt: String) -> ParleyResult<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt);
        let scripted = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        scripted.or_else(|| self.fallback.clone()).ok_or_else(|| {
            LlmError::InvalidResponse {
                provider: "scripted".to_string(),
                reason: "script exhausted".to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn call(&self, prompt: &str) -> ParleyResult<String> {
        self.answer(prompt.to_string())
    }

    async fn call_with_history(&self, messages: &[ChatMessage]) -> ParleyResult<String> {
        let rendered = messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n");
        self.answer(rendered)
    }
}

/// Embedding provider backed by an explicit text → vector table.
#[derive(Debug, Clone)]
pub struct FixedEmbeddingProvider {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl FixedEmbeddingProvider {
    /// Unknown texts embed to `fallback`.
    pub fn new(fallback: Vec<f32>) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback,
        }
    }

    pub fn with(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbeddingProvider {
    async fn embed(&self, text: &str) -> ParleyResult<EmbeddingVector> {
        let data = self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());
        Ok(EmbeddingVector::new(data, "fixed"))
    }

    fn model_id(&self) -> &str {
        "fixed"
    }
}

/// Tool catalog whose tools echo their name and parameters.
#[derive(Debug, Default)]
pub struct MockToolCatalog {
    tools: Vec<ToolSpec>,
    calls: Mutex<Vec<String>>,
}

impl MockToolCatalog {
    pub fn new(names: &[&str]) -> Self {
        Self {
            tools: names
                .iter()
                .map(|name| ToolSpec {
                    name: name.to_string(),
                    description: format!("The {name} tool"),
                    input_schema: json!({"type": "object"}),
                })
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl ToolCatalog for MockToolCatalog {
    async fn list_tools(&self) -> ParleyResult<Vec<ToolSpec>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, params: &ActionParams) -> ParleyResult<Value> {
        if !self.tools.iter().any(|t| t.name == name) {
            return Err(ToolError::NotFound {
                name: name.to_string(),
            }
            .into());
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.to_string());
        Ok(json!({ "tool": name, "params": params.to_json() }))
    }
}

// ============================================================================
// SCRIPTED ACTION BODIES
// ============================================================================

/// Returns the same result every time and counts executions.
#[derive(Debug, Default)]
pub struct StaticAction {
    result: ActionResult,
    runs: Arc<AtomicUsize>,
}

impl StaticAction {
    pub fn new(result: ActionResult) -> Self {
        Self {
            result,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Build from a JSON object; other JSON values give an empty result.
    pub fn from_json(values: Value) -> Self {
        let mut result = ActionResult::new();
        if let Value::Object(map) = values {
            for (name, value) in map {
                result.insert(name, value);
            }
        }
        Self::new(result)
    }

    /// Shared execution counter, readable after the body moved into an action.
    pub fn runs(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }
}

#[async_trait]
impl ActionBody for StaticAction {
    async fn execute(
        &self,
        _params: ActionParams,
        _ctx: &ActionContext,
        _env: &mut ActionEnv<'_>,
    ) -> ParleyResult<ActionResult> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

/// Always fails with `ActionError::Failed`.
#[derive(Debug, Clone)]
pub struct FailingAction {
    action: ActionKey,
    reason: String,
}

impl FailingAction {
    pub fn new(action: impl Into<ActionKey>, reason: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ActionBody for FailingAction {
    async fn execute(
        &self,
        _params: ActionParams,
        _ctx: &ActionContext,
        _env: &mut ActionEnv<'_>,
    ) -> ParleyResult<ActionResult> {
        Err(ActionError::Failed {
            action: self.action.clone(),
            reason: self.reason.clone(),
        }
        .into())
    }
}

/// Sleeps before returning an empty result.
#[derive(Debug, Clone)]
pub struct SlowAction {
    delay: Duration,
}

impl SlowAction {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ActionBody for SlowAction {
    async fn execute(
        &self,
        _params: ActionParams,
        _ctx: &ActionContext,
        _env: &mut ActionEnv<'_>,
    ) -> ParleyResult<ActionResult> {
        tokio::time::sleep(self.delay).await;
        Ok(ActionResult::new())
    }
}

/// Echoes the latest user message as `answer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoUserAction;

#[async_trait]
impl ActionBody for EchoUserAction {
    async fn execute(
        &self,
        _params: ActionParams,
        ctx: &ActionContext,
        _env: &mut ActionEnv<'_>,
    ) -> ParleyResult<ActionResult> {
        let answer = ctx
            .conversation
            .latest_user_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(ActionResult::new().with("answer", answer))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating PARLEY types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_action_key() -> impl Strategy<Value = ActionKey> {
        "[a-z][a-z_]{0,15}".prop_map(ActionKey::new)
    }

    /// Distinct keys, in generation order.
    pub fn arb_distinct_keys(max: usize) -> impl Strategy<Value = Vec<ActionKey>> {
        prop::collection::btree_set("[a-z][a-z_]{0,15}", 1..=max.max(1))
            .prop_map(|set| set.into_iter().map(ActionKey::new).collect())
    }

    /// A space of no-op actions with distinct keys.
    pub fn arb_action_space(max: usize) -> impl Strategy<Value = ActionSpace> {
        arb_distinct_keys(max).prop_map(|keys| {
            keys.into_iter()
                .map(|key| {
                    let description = format!("{key} action");
                    Action::new(key, description, StaticAction::default())
                })
                .collect()
        })
    }

    pub fn arb_task_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Pending),
            Just(TaskStatus::InProgress),
            Just(TaskStatus::Completed),
            Just(TaskStatus::Failed),
        ]
    }

    pub fn arb_task_priority() -> impl Strategy<Value = TaskPriority> {
        prop_oneof![
            Just(TaskPriority::Low),
            Just(TaskPriority::Normal),
            Just(TaskPriority::High),
            Just(TaskPriority::Critical),
        ]
    }

    pub fn arb_task() -> impl Strategy<Value = Task> {
        (".{1,60}", arb_task_priority())
            .prop_map(|(description, priority)| Task::new(description).with_priority(priority))
    }

    /// Unit-length vector of the given dimensions.
    pub fn arb_embedding_vector(dimensions: usize) -> impl Strategy<Value = EmbeddingVector> {
        prop::collection::vec(-1.0f32..1.0, dimensions).prop_map(|mut data| {
            let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for x in &mut data {
                    *x /= norm;
                }
            }
            EmbeddingVector::new(data, "arb")
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built agents and contexts for common scenarios.

    use super::*;
    use parley_engine::{Agent, Finish, GraphNarrower, RandomSelector};

    pub fn profile(name: &str) -> AgentProfile {
        AgentProfile::new(name, format!("{name}, a test agent"))
    }

    /// Context whose conversation holds a single user message.
    pub fn user_context(agent: &Agent, message: &str) -> ActionContext {
        agent
            .fresh_context()
            .with_conversation(Conversation::new().with(ChatMessage::user(message)))
    }

    /// `work → finish`, where `work` returns `result`.
    pub fn answering_agent(name: &str, result: ActionResult) -> Agent {
        let space: ActionSpace = vec![
            Action::new("work", "Do the work", StaticAction::new(result)),
            Finish::action(),
        ]
        .into_iter()
        .collect();
        let narrower = GraphNarrower::new(["work"]).with_edge("work", [Finish::KEY]);
        Agent::new(profile(name), space, narrower, RandomSelector::seeded(0), Finish::KEY)
    }

    /// `answer → finish`, answering with the latest user message.
    pub fn echo_agent(name: &str) -> Agent {
        let space: ActionSpace = vec![
            Action::new("answer", "Answer the user", EchoUserAction),
            Finish::action(),
        ]
        .into_iter()
        .collect();
        let narrower = GraphNarrower::new(["answer"]).with_edge("answer", [Finish::KEY]);
        Agent::new(profile(name), space, narrower, RandomSelector::seeded(0), Finish::KEY)
    }

    /// `work → finish`, where `work` always fails.
    pub fn failing_agent(name: &str, reason: &str) -> Agent {
        let space: ActionSpace = vec![
            Action::new("work", "Do the work", FailingAction::new("work", reason)),
            Finish::action(),
        ]
        .into_iter()
        .collect();
        let narrower = GraphNarrower::new(["work"]).with_edge("work", [Finish::KEY]);
        Agent::new(profile(name), space, narrower, RandomSelector::seeded(0), Finish::KEY)
    }

    /// A linear chain `keys[0] → keys[1] → … → finish`.
    pub fn chain_agent(name: &str, keys: &[ActionKey]) -> Agent {
        let mut actions: Vec<Action> = keys
            .iter()
            .map(|k| Action::new(k.clone(), format!("{k} step"), StaticAction::default()))
            .collect();
        actions.push(Finish::action());

        let mut narrower = GraphNarrower::new(keys.first().cloned());
        for pair in keys.windows(2) {
            narrower.add_edge(pair[0].clone(), [pair[1].clone()]);
        }
        if let Some(last) = keys.last() {
            narrower.add_edge(last.clone(), [ActionKey::new(Finish::KEY)]);
        } else {
            narrower.set_default_entries([Finish::KEY]);
        }
        Agent::new(
            profile(name),
            actions.into_iter().collect(),
            narrower,
            RandomSelector::seeded(0),
            Finish::KEY,
        )
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over `ParleyResult` classification.

    use super::*;

    #[track_caller]
    pub fn assert_configuration_error<T: std::fmt::Debug>(result: &ParleyResult<T>) {
        match result {
            Err(e) if e.is_configuration() => {}
            other => panic!("Expected configuration error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_protocol_error<T: std::fmt::Debug>(result: &ParleyResult<T>) {
        match result {
            Err(e) if e.is_protocol() => {}
            other => panic!("Expected protocol error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_collaborator_error<T: std::fmt::Debug>(result: &ParleyResult<T>) {
        match result {
            Err(e) if e.is_collaborator() => {}
            other => panic!("Expected collaborator error, got: {:?}", other),
        }
    }
}
