//! Narrowing policies: which actions are legal after the last one.

use parley_core::{
    Action, ActionContext, ActionKey, ActionSpace, ConfigurationError, ParleyResult, Workspace,
};
use std::collections::HashMap;

/// Maps the last executed action to the legal next candidates.
pub trait ActionNarrower: Send + Sync {
    /// Reduce `space` to the actions legal after the workspace's last step.
    fn narrow(
        &self,
        workspace: &Workspace,
        space: &ActionSpace,
        ctx: &ActionContext,
    ) -> ParleyResult<ActionSpace>;

    /// Make a newly discovered action reachable from `producer` without
    /// disturbing existing edges.
    fn register(&mut self, action: &Action, producer: Option<&ActionKey>);
}

// ============================================================================
// GRAPH NARROWER
// ============================================================================

/// Edge-table narrower.
///
/// - Empty history: the default entries.
/// - Last action tagged `ROUTER` whose result carries a route: that route.
/// - Otherwise the registered edge of the last action, in declared order.
///
/// No edge at all is a `MissingEdge` configuration error. An edge with zero
/// targets is a sink and narrows to an empty space.
#[derive(Debug, Clone, Default)]
pub struct GraphNarrower {
    default_entries: Vec<ActionKey>,
    edges: HashMap<ActionKey, Vec<ActionKey>>,
    registration_sink: Option<ActionKey>,
}

impl GraphNarrower {
    pub fn new<K: Into<ActionKey>>(default_entries: impl IntoIterator<Item = K>) -> Self {
        Self {
            default_entries: default_entries.into_iter().map(Into::into).collect(),
            edges: HashMap::new(),
            registration_sink: None,
        }
    }

    /// Builder form of [`GraphNarrower::add_edge`].
    pub fn with_edge<K: Into<ActionKey>>(
        mut self,
        from: impl Into<ActionKey>,
        targets: impl IntoIterator<Item = K>,
    ) -> Self {
        self.add_edge(from, targets);
        self
    }

    /// Actions registered through discovery lead here.
    pub fn with_registration_sink(mut self, sink: impl Into<ActionKey>) -> Self {
        self.registration_sink = Some(sink.into());
        self
    }

    /// Append `targets` to the edge of `from`, creating it if needed.
    /// Targets already present are not duplicated. An empty `targets`
    /// registers a sink when `from` had no edge.
    pub fn add_edge<K: Into<ActionKey>>(
        &mut self,
        from: impl Into<ActionKey>,
        targets: impl IntoIterator<Item = K>,
    ) {
        let edge = self.edges.entry(from.into()).or_default();
        for target in targets {
            let target = target.into();
            if !edge.contains(&target) {
                edge.push(target);
            }
        }
    }

    /// Remove one target from the edge of `from`. Returns whether it was present.
    pub fn remove_edge(&mut self, from: &ActionKey, target: &ActionKey) -> bool {
        match self.edges.get_mut(from) {
            Some(edge) => {
                let before = edge.len();
                edge.retain(|t| t != target);
                edge.len() != before
            }
            None => false,
        }
    }

    pub fn set_default_entries<K: Into<ActionKey>>(&mut self, entries: impl IntoIterator<Item = K>) {
        self.default_entries = entries.into_iter().map(Into::into).collect();
    }

    pub fn default_entries(&self) -> &[ActionKey] {
        &self.default_entries
    }

    /// Declared successors of `from`; `None` when no edge is registered.
    pub fn successors(&self, from: &ActionKey) -> Option<&[ActionKey]> {
        self.edges.get(from).map(Vec::as_slice)
    }
}

impl ActionNarrower for GraphNarrower {
    fn narrow(
        &self,
        workspace: &Workspace,
        space: &ActionSpace,
        _ctx: &ActionContext,
    ) -> ParleyResult<ActionSpace> {
        let Some(last) = workspace.history.last() else {
            return space.select_keys(&self.default_entries);
        };

        let from = last.action.key();
        if last.action.is_router() {
            if let Some(route) = last.result.route() {
                tracing::debug!(from = %from, route = ?route, "Following routed result");
                return space.select_keys(route);
            }
        }

        match self.edges.get(from) {
            Some(targets) => space.select_keys(targets),
            None => {
                tracing::warn!(from = %from, "No narrowing edge registered");
                Err(ConfigurationError::MissingEdge {
                    action: from.clone(),
                }
                .into())
            }
        }
    }

    fn register(&mut self, action: &Action, producer: Option<&ActionKey>) {
        if let Some(producer) = producer {
            self.add_edge(producer.clone(), [action.key().clone()]);
        }
        if !self.edges.contains_key(action.key()) {
            let sink: Vec<ActionKey> = self.registration_sink.iter().cloned().collect();
            self.edges.insert(action.key().clone(), sink);
        }
        tracing::debug!(action = %action.key(), producer = ?producer, "Registered action");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{noop, profile};
    use parley_core::{ActionCapabilities, ActionResult, ParleyError};

    fn space(keys: &[&str]) -> ActionSpace {
        keys.iter().map(|k| noop(k)).collect()
    }

    fn after(key: &str, result: ActionResult, caps: ActionCapabilities) -> Workspace {
        let mut workspace = Workspace::new();
        let ctx = ActionContext::new(profile("alice"));
        workspace
            .history
            .add(noop(key).with_capabilities(caps), result, ctx);
        workspace
    }

    fn ctx() -> ActionContext {
        ActionContext::new(profile("alice"))
    }

    #[test]
    fn test_empty_history_uses_default_entries() {
        let narrower = GraphNarrower::new(["b", "a"]).with_edge("a", ["c"]);
        let narrowed = narrower
            .narrow(&Workspace::new(), &space(&["a", "b", "c"]), &ctx())
            .unwrap();
        assert_eq!(narrowed.keys(), vec![ActionKey::new("b"), ActionKey::new("a")]);
    }

    #[test]
    fn test_add_edge_appends_and_remove_keeps_others() {
        let mut narrower = GraphNarrower::new(["x"]);
        narrower.add_edge("x", ["y"]);
        narrower.add_edge("x", ["z"]);

        let workspace = after("x", ActionResult::new(), ActionCapabilities::empty());
        let all = space(&["x", "y", "z"]);
        let narrowed = narrower.narrow(&workspace, &all, &ctx()).unwrap();
        assert_eq!(narrowed.keys(), vec![ActionKey::new("y"), ActionKey::new("z")]);

        assert!(narrower.remove_edge(&"x".into(), &"y".into()));
        assert!(!narrower.remove_edge(&"x".into(), &"y".into()));
        let narrowed = narrower.narrow(&workspace, &all, &ctx()).unwrap();
        assert_eq!(narrowed.keys(), vec![ActionKey::new("z")]);
    }

    #[test]
    fn test_missing_edge_is_configuration_error() {
        let narrower = GraphNarrower::new(["x"]);
        let workspace = after("x", ActionResult::new(), ActionCapabilities::empty());
        let err = narrower.narrow(&workspace, &space(&["x"]), &ctx()).unwrap_err();
        assert_eq!(
            err,
            ParleyError::Configuration(ConfigurationError::MissingEdge { action: "x".into() })
        );
    }

    #[test]
    fn test_empty_edge_is_a_sink() {
        let narrower = GraphNarrower::new(["x"]).with_edge("x", Vec::<ActionKey>::new());
        let workspace = after("x", ActionResult::new(), ActionCapabilities::empty());
        let narrowed = narrower.narrow(&workspace, &space(&["x"]), &ctx()).unwrap();
        assert!(narrowed.is_empty());
    }

    #[test]
    fn test_edge_target_outside_space_is_unknown_action() {
        let narrower = GraphNarrower::new(["ghost"]);
        let err = narrower
            .narrow(&Workspace::new(), &space(&["x"]), &ctx())
            .unwrap_err();
        assert_eq!(
            err,
            ParleyError::Configuration(ConfigurationError::UnknownAction {
                action: "ghost".into()
            })
        );
    }

    #[test]
    fn test_route_only_honoured_for_routers() {
        let narrower = GraphNarrower::new(["gate"]).with_edge("gate", ["a"]);
        let routed = ActionResult::new().with_route(vec!["b".into()]);
        let all = space(&["gate", "a", "b"]);

        let plain = after("gate", routed.clone(), ActionCapabilities::empty());
        let narrowed = narrower.narrow(&plain, &all, &ctx()).unwrap();
        assert_eq!(narrowed.keys(), vec![ActionKey::new("a")]);

        let router = after("gate", routed, ActionCapabilities::ROUTER);
        let narrowed = narrower.narrow(&router, &all, &ctx()).unwrap();
        assert_eq!(narrowed.keys(), vec![ActionKey::new("b")]);
    }

    #[test]
    fn test_register_links_producer_and_sink_without_overwriting() {
        let mut narrower = GraphNarrower::new(["discover"])
            .with_edge("discover", ["finish"])
            .with_registration_sink("finish");
        narrower.register(&noop("tool:search"), Some(&"discover".into()));

        assert_eq!(
            narrower.successors(&"discover".into()),
            Some(&[ActionKey::new("finish"), ActionKey::new("tool:search")][..])
        );
        assert_eq!(
            narrower.successors(&"tool:search".into()),
            Some(&[ActionKey::new("finish")][..])
        );

        narrower.add_edge("tool:search", ["discover"]);
        narrower.register(&noop("tool:search"), Some(&"discover".into()));
        assert_eq!(narrower.successors(&"tool:search".into()).map(<[_]>::len), Some(2));
        assert_eq!(narrower.successors(&"discover".into()).map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_register_without_sink_creates_empty_edge() {
        let mut narrower = GraphNarrower::new(["a"]);
        narrower.register(&noop("late"), None);
        assert_eq!(narrower.successors(&"late".into()), Some(&[][..]));
    }
}
