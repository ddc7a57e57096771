//! Built-in actions: termination, tool discovery and invocation, bounded retry.

use async_trait::async_trait;
use parley_core::{
    Action, ActionBody, ActionCapabilities, ActionContext, ActionEnv, ActionKey, ActionParams,
    ActionResult, ParleyResult, ToolError, ToolSpec,
};
use serde_json::{json, Value};

// ============================================================================
// FINISH
// ============================================================================

/// Terminal action. Carries the previous result forward as the final answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Finish;

impl Finish {
    pub const KEY: &'static str = "finish";

    pub fn action() -> Action {
        Action::new(Self::KEY, "Stop deliberating and report the result so far.", Finish)
            .with_capabilities(ActionCapabilities::TERMINAL)
    }
}

#[async_trait]
impl ActionBody for Finish {
    async fn execute(
        &self,
        params: ActionParams,
        ctx: &ActionContext,
        _env: &mut ActionEnv<'_>,
    ) -> ParleyResult<ActionResult> {
        let mut result = ctx.previous_result.clone().unwrap_or_default();
        for (name, value) in params.iter() {
            result.insert(name.clone(), value.clone());
        }
        Ok(result)
    }
}

// ============================================================================
// TOOLS
// ============================================================================

/// Lists the tool catalog and announces one [`ToolCall`] action per tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoverTools;

impl DiscoverTools {
    pub const KEY: &'static str = "discover_tools";

    pub fn action() -> Action {
        Action::new(
            Self::KEY,
            "Look up which external tools are available.",
            DiscoverTools,
        )
        .with_capabilities(ActionCapabilities::TOOL)
    }
}

#[async_trait]
impl ActionBody for DiscoverTools {
    async fn execute(
        &self,
        _params: ActionParams,
        ctx: &ActionContext,
        env: &mut ActionEnv<'_>,
    ) -> ParleyResult<ActionResult> {
        let catalog = ctx.tools.as_ref().ok_or(ToolError::NotConfigured)?;
        let tools = catalog.list_tools().await?;

        let names: Vec<Value> = tools.iter().map(|t| json!(t.name)).collect();
        for spec in tools {
            env.discover(ToolCall::from_spec(spec));
        }
        Ok(ActionResult::new().with("tools", names))
    }
}

/// Invokes one named tool with the selected parameters.
#[derive(Debug, Clone)]
pub struct ToolCall {
    tool: String,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    /// Graph key of the action invoking `tool`.
    pub fn key_for(tool: &str) -> ActionKey {
        ActionKey::new(format!("tool:{tool}"))
    }

    pub fn from_spec(spec: ToolSpec) -> Action {
        Action::new(
            Self::key_for(&spec.name),
            spec.description,
            ToolCall::new(spec.name),
        )
        .with_params_schema(spec.input_schema)
        .with_capabilities(ActionCapabilities::TOOL)
    }
}

#[async_trait]
impl ActionBody for ToolCall {
    async fn execute(
        &self,
        params: ActionParams,
        ctx: &ActionContext,
        _env: &mut ActionEnv<'_>,
    ) -> ParleyResult<ActionResult> {
        let catalog = ctx.tools.as_ref().ok_or(ToolError::NotConfigured)?;
        let output = catalog.call_tool(&self.tool, &params).await?;
        Ok(ActionResult::new()
            .with("tool", self.tool.clone())
            .with("output", output))
    }
}

// ============================================================================
// RETRY GATE
// ============================================================================

/// Router that decides between success, another attempt, and giving up.
///
/// The previous result succeeded when its `success_field` is `true`. Failed
/// attempts increment a counter kept in the workspace state bag; after
/// `max_retries` failures the gate routes to the exhausted branch. The
/// previous result's values are passed through.
#[derive(Debug, Clone)]
pub struct RetryGate {
    key: ActionKey,
    success_field: String,
    max_retries: u32,
    on_success: Vec<ActionKey>,
    on_retry: Vec<ActionKey>,
    on_exhausted: Vec<ActionKey>,
}

impl RetryGate {
    pub fn new(key: impl Into<ActionKey>, max_retries: u32) -> Self {
        Self {
            key: key.into(),
            success_field: "ok".to_string(),
            max_retries,
            on_success: Vec::new(),
            on_retry: Vec::new(),
            on_exhausted: Vec::new(),
        }
    }

    pub fn success_field(mut self, field: impl Into<String>) -> Self {
        self.success_field = field.into();
        self
    }

    pub fn on_success<K: Into<ActionKey>>(mut self, route: impl IntoIterator<Item = K>) -> Self {
        self.on_success = route.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_retry<K: Into<ActionKey>>(mut self, route: impl IntoIterator<Item = K>) -> Self {
        self.on_retry = route.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_exhausted<K: Into<ActionKey>>(mut self, route: impl IntoIterator<Item = K>) -> Self {
        self.on_exhausted = route.into_iter().map(Into::into).collect();
        self
    }

    fn counter_key(&self) -> String {
        format!("retry_gate:{}", self.key)
    }

    pub fn into_action(self, description: impl Into<String>) -> Action {
        Action::new(self.key.clone(), description, self)
            .with_capabilities(ActionCapabilities::ROUTER)
    }
}

#[async_trait]
impl ActionBody for RetryGate {
    async fn execute(
        &self,
        _params: ActionParams,
        ctx: &ActionContext,
        env: &mut ActionEnv<'_>,
    ) -> ParleyResult<ActionResult> {
        let mut result = ActionResult::new();
        let succeeded = match &ctx.previous_result {
            Some(previous) => {
                result.merge(previous);
                previous.get(&self.success_field) == Some(&Value::Bool(true))
            }
            None => false,
        };

        let counter_key = self.counter_key();
        let failures: u32 = env.state().get_as(&counter_key).unwrap_or(0);

        let (outcome, route, attempts) = if succeeded {
            env.state().remove(&counter_key);
            ("success", self.on_success.clone(), failures)
        } else if failures < self.max_retries {
            env.state().insert(counter_key, json!(failures + 1));
            ("retry", self.on_retry.clone(), failures + 1)
        } else {
            ("exhausted", self.on_exhausted.clone(), failures)
        };

        tracing::debug!(gate = %self.key, outcome, attempts, "Retry gate decided");
        result.insert("outcome", outcome);
        result.insert("attempts", attempts);
        Ok(result.with_route(route))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{profile, MockTools};
    use parley_core::{ParleyError, StateBag};
    use std::sync::Arc;

    async fn run(action: &Action, ctx: &ActionContext, state: &mut StateBag) -> (ActionResult, Vec<Action>) {
        let mut env = ActionEnv::new(state);
        let result = action
            .execute(ActionParams::new(), ctx, &mut env)
            .await
            .unwrap();
        (result, env.into_discovered())
    }

    #[tokio::test]
    async fn test_finish_forwards_previous_result() {
        let ctx = ActionContext::new(profile("alice"))
            .with_previous_result(ActionResult::new().with("answer", "Oslo"));
        let (result, _) = run(&Finish::action(), &ctx, &mut StateBag::default()).await;
        assert_eq!(result.get_str("answer"), Some("Oslo"));
        assert!(Finish::action().is_terminal());
    }

    #[tokio::test]
    async fn test_discover_tools_announces_tool_actions() {
        let tools = Arc::new(MockTools::new(&["weather", "search"]));
        let ctx = ActionContext::new(profile("alice")).with_tools(tools);
        let (result, discovered) = run(&DiscoverTools::action(), &ctx, &mut StateBag::default()).await;

        assert_eq!(result.get("tools"), Some(&json!(["weather", "search"])));
        let keys: Vec<_> = discovered.iter().map(|a| a.key().clone()).collect();
        assert_eq!(keys, vec![ToolCall::key_for("weather"), ToolCall::key_for("search")]);
        assert!(discovered.iter().all(Action::is_tool));
    }

    #[tokio::test]
    async fn test_tool_actions_need_a_catalog() {
        let ctx = ActionContext::new(profile("alice"));
        let mut state = StateBag::default();
        let mut env = ActionEnv::new(&mut state);
        let err = DiscoverTools::action()
            .execute(ActionParams::new(), &ctx, &mut env)
            .await
            .unwrap_err();
        assert_eq!(err, ParleyError::Tool(ToolError::NotConfigured));
    }

    #[tokio::test]
    async fn test_tool_call_returns_output() {
        let tools = Arc::new(MockTools::new(&["weather"]));
        let ctx = ActionContext::new(profile("alice")).with_tools(tools);
        let action = ToolCall::from_spec(ToolSpec {
            name: "weather".to_string(),
            description: "Weather lookup".to_string(),
            input_schema: json!({}),
        });
        let (result, _) = run(&action, &ctx, &mut StateBag::default()).await;
        assert_eq!(result.get_str("tool"), Some("weather"));
        assert_eq!(result.get("output"), Some(&json!({"tool": "weather"})));
    }

    #[tokio::test]
    async fn test_retry_gate_counts_failures_then_gives_up() {
        let gate = RetryGate::new("gate", 2)
            .on_success(["finish"])
            .on_retry(["attempt"])
            .on_exhausted(["apologise"])
            .into_action("Decide whether to retry");
        let failed = ActionContext::new(profile("alice"))
            .with_previous_result(ActionResult::new().with("ok", false));
        let mut state = StateBag::default();

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            let (result, _) = run(&gate, &failed, &mut state).await;
            outcomes.push((
                result.get_str("outcome").map(str::to_string),
                result.route().map(<[ActionKey]>::to_vec),
            ));
        }
        assert_eq!(
            outcomes,
            vec![
                (Some("retry".to_string()), Some(vec![ActionKey::new("attempt")])),
                (Some("retry".to_string()), Some(vec![ActionKey::new("attempt")])),
                (Some("exhausted".to_string()), Some(vec![ActionKey::new("apologise")])),
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_gate_success_resets_counter() {
        let gate = RetryGate::new("gate", 1)
            .on_success(["finish"])
            .on_retry(["attempt"])
            .into_action("Decide whether to retry");
        let mut state = StateBag::default();
        let failed = ActionContext::new(profile("alice"))
            .with_previous_result(ActionResult::new().with("ok", false));
        run(&gate, &failed, &mut state).await;
        assert_eq!(state.get_as::<u32>("retry_gate:gate"), Some(1));

        let passed = ActionContext::new(profile("alice"))
            .with_previous_result(ActionResult::new().with("ok", true).with("answer", 3));
        let (result, _) = run(&gate, &passed, &mut state).await;
        assert_eq!(result.get_str("outcome"), Some("success"));
        assert_eq!(result.get("answer"), Some(&json!(3)));
        assert!(state.get("retry_gate:gate").is_none());
    }
}
