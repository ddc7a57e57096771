//! Action records and the key/value bags threaded through execution.

use crate::{ActionContext, ActionKey, ParleyResult, StateBag};
use async_trait::async_trait;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// CAPABILITY TAGS
// ============================================================================

bitflags! {
    /// Capability tags the engine consults instead of inspecting body types.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ActionCapabilities: u8 {
        /// Reaching this action finishes a deliberation
        const TERMINAL = 0b0000_0001;
        /// Invokes the tool catalog
        const TOOL = 0b0000_0010;
        /// Result carries an explicit route that overrides graph edges
        const ROUTER = 0b0000_0100;
        /// Drives a negotiation with another agent
        const COMMUNICATION = 0b0000_1000;
    }
}

impl Default for ActionCapabilities {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// PARAMS / RESULTS
// ============================================================================

/// Parameters built fresh for a single invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionParams(BTreeMap<String, Value>);

impl ActionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Build params from a JSON object; any other JSON value yields empty params.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map.into_iter().collect()),
            _ => Self::default(),
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }
}

/// Opaque multi-view content unit attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fragment(pub Value);

/// Output of one action execution. It becomes the next context's previous result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    values: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fragments: Vec<Fragment>,
    /// Explicit next candidates. Only honoured for actions tagged `ROUTER`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    route: Option<Vec<ActionKey>>,
}

impl ActionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn with_fragment(mut self, fragment: Fragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    pub fn with_route(mut self, route: Vec<ActionKey>) -> Self {
        self.route = Some(route);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn route(&self) -> Option<&[ActionKey]> {
        self.route.as_deref()
    }

    /// Copy every value of `other` into this result, overwriting shared names.
    pub fn merge(&mut self, other: &ActionResult) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
        self.fragments.extend(other.fragments.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.fragments.is_empty()
    }
}

// ============================================================================
// ACTION BODY
// ============================================================================

/// Mutable environment lent to an action body for the duration of one step.
pub struct ActionEnv<'a> {
    state: &'a mut StateBag,
    discovered: Vec<Action>,
}

impl<'a> ActionEnv<'a> {
    pub fn new(state: &'a mut StateBag) -> Self {
        Self {
            state,
            discovered: Vec::new(),
        }
    }

    /// Workspace state that survives across turns of one deliberation.
    pub fn state(&mut self) -> &mut StateBag {
        &mut *self.state
    }

    /// Announce a newly available action. The run-loop adds it to the agent's
    /// space and registers it with the narrower after this step.
    pub fn discover(&mut self, action: Action) {
        self.discovered.push(action);
    }

    pub fn into_discovered(self) -> Vec<Action> {
        self.discovered
    }
}

/// The behaviour behind an action record.
#[async_trait]
pub trait ActionBody: Send + Sync {
    async fn execute(
        &self,
        params: ActionParams,
        ctx: &ActionContext,
        env: &mut ActionEnv<'_>,
    ) -> ParleyResult<ActionResult>;
}

// ============================================================================
// ACTION
// ============================================================================

/// A named, described unit of agent behaviour. Equality is by key.
#[derive(Clone)]
pub struct Action {
    key: ActionKey,
    description: String,
    params_schema: Value,
    capabilities: ActionCapabilities,
    body: Arc<dyn ActionBody>,
}

impl Action {
    pub fn new(
        key: impl Into<ActionKey>,
        description: impl Into<String>,
        body: impl ActionBody + 'static,
    ) -> Self {
        Self::from_arc(key, description, Arc::new(body))
    }

    pub fn from_arc(
        key: impl Into<ActionKey>,
        description: impl Into<String>,
        body: Arc<dyn ActionBody>,
    ) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            params_schema: Value::Object(Default::default()),
            capabilities: ActionCapabilities::empty(),
            body,
        }
    }

    pub fn with_params_schema(mut self, schema: Value) -> Self {
        self.params_schema = schema;
        self
    }

    pub fn with_capabilities(mut self, capabilities: ActionCapabilities) -> Self {
        self.capabilities |= capabilities;
        self
    }

    pub fn key(&self) -> &ActionKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        self.key.as_str()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn params_schema(&self) -> &Value {
        &self.params_schema
    }

    pub fn capabilities(&self) -> ActionCapabilities {
        self.capabilities
    }

    pub fn is_terminal(&self) -> bool {
        self.capabilities.contains(ActionCapabilities::TERMINAL)
    }

    pub fn is_tool(&self) -> bool {
        self.capabilities.contains(ActionCapabilities::TOOL)
    }

    pub fn is_router(&self) -> bool {
        self.capabilities.contains(ActionCapabilities::ROUTER)
    }

    pub async fn execute(
        &self,
        params: ActionParams,
        ctx: &ActionContext,
        env: &mut ActionEnv<'_>,
    ) -> ParleyResult<ActionResult> {
        self.body.execute(params, ctx, env).await
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Action {}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("key", &self.key)
            .field("description", &self.description)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AgentProfile;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ActionBody for Echo {
        async fn execute(
            &self,
            params: ActionParams,
            _ctx: &ActionContext,
            env: &mut ActionEnv<'_>,
        ) -> ParleyResult<ActionResult> {
            env.state().insert("seen", json!(true));
            Ok(ActionResult::new().with("echo", params.to_json()))
        }
    }

    #[test]
    fn test_actions_compare_by_key_only() {
        let a = Action::new("respond", "first description", Echo);
        let b = Action::new("respond", "second description", Echo)
            .with_capabilities(ActionCapabilities::TOOL);
        let c = Action::new("finish", "first description", Echo);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_capabilities_accumulate() {
        let action = Action::new("gate", "", Echo)
            .with_capabilities(ActionCapabilities::ROUTER)
            .with_capabilities(ActionCapabilities::TERMINAL);
        assert!(action.is_router());
        assert!(action.is_terminal());
        assert!(!action.is_tool());
    }

    #[test]
    fn test_params_from_non_object_is_empty() {
        assert!(ActionParams::from_json(json!([1, 2])).is_empty());
        let params = ActionParams::from_json(json!({"city": "Oslo"}));
        assert_eq!(params.get_str("city"), Some("Oslo"));
    }

    #[test]
    fn test_result_merge_overwrites_shared_names() {
        let mut base = ActionResult::new().with("a", 1).with("b", 2);
        let other = ActionResult::new()
            .with("b", 3)
            .with_fragment(Fragment(json!({"view": "text"})));
        base.merge(&other);
        assert_eq!(base.get("a"), Some(&json!(1)));
        assert_eq!(base.get("b"), Some(&json!(3)));
        assert_eq!(base.fragments().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_lends_state_to_body() {
        let action = Action::new("echo", "echo params", Echo);
        let mut state = StateBag::default();
        let mut env = ActionEnv::new(&mut state);
        let ctx = ActionContext::new(AgentProfile::new("alice", ""));
        let result = action
            .execute(ActionParams::new().with("x", 1), &ctx, &mut env)
            .await
            .unwrap();
        assert_eq!(result.get("echo"), Some(&json!({"x": 1})));
        assert_eq!(state.get("seen"), Some(&json!(true)));
    }
}
