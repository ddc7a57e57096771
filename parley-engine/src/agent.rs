//! The agent and its narrow → select → execute run-loop.

use crate::narrower::ActionNarrower;
use crate::selector::{ActionSelector, Selection};
use parley_core::{
    Action, ActionContext, ActionEnv, ActionHistory, ActionKey, ActionParams, ActionResult,
    ActionSpace, AgentProfile, ConfigurationError, ParleyError, ParleyResult, Task, ToolCatalog,
    Workspace,
};
use std::sync::Arc;

// ============================================================================
// OBSERVATION
// ============================================================================

/// One executed step as reported to a front end.
#[derive(Debug, Clone)]
pub struct ThinkingStep {
    /// Zero-based position in the deliberation
    pub index: usize,
    pub action: ActionKey,
    pub description: String,
    pub params: ActionParams,
    pub result: ActionResult,
}

/// Outcome of an observed run. A failure is reported, not raised; the
/// workspace keeps the partial history for inspection.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub steps: usize,
    pub result: Option<ActionResult>,
    pub context: Option<ActionContext>,
    pub error: Option<ParleyError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ============================================================================
// AGENT
// ============================================================================

/// An action space, its narrowing and selection policies, and one workspace.
pub struct Agent {
    profile: AgentProfile,
    space: ActionSpace,
    narrower: Box<dyn ActionNarrower>,
    selector: Box<dyn ActionSelector>,
    workspace: Workspace,
    terminal: ActionKey,
    tools: Option<Arc<dyn ToolCatalog>>,
    tasks: Vec<Task>,
}

impl Agent {
    pub fn new(
        profile: AgentProfile,
        space: ActionSpace,
        narrower: impl ActionNarrower + 'static,
        selector: impl ActionSelector + 'static,
        terminal: impl Into<ActionKey>,
    ) -> Self {
        Self {
            profile,
            space,
            narrower: Box::new(narrower),
            selector: Box::new(selector),
            workspace: Workspace::new(),
            terminal: terminal.into(),
            tools: None,
            tasks: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolCatalog>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn space(&self) -> &ActionSpace {
        &self.space
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn history(&self) -> &ActionHistory {
        &self.workspace.history
    }

    pub fn terminal(&self) -> &ActionKey {
        &self.terminal
    }

    pub fn tools(&self) -> Option<&Arc<dyn ToolCatalog>> {
        self.tools.as_ref()
    }

    /// A context for a fresh deliberation by this agent.
    pub fn fresh_context(&self) -> ActionContext {
        let ctx = ActionContext::new(self.profile.clone());
        match &self.tools {
            Some(tools) => ctx.with_tools(Arc::clone(tools)),
            None => ctx,
        }
    }

    /// Add an action after assembly and make it reachable from `producer`.
    pub fn add_action(&mut self, action: Action, producer: Option<&ActionKey>) -> ParleyResult<()> {
        self.space.add(action.clone())?;
        self.narrower.register(&action, producer);
        Ok(())
    }

    /// Bidirectional friendship edge.
    pub fn befriend(&mut self, other: &mut Agent) {
        self.profile.friends.insert(other.profile.name.clone());
        other.profile.friends.insert(self.profile.name.clone());
    }

    // ------------------------------------------------------------------------
    // Task stack
    // ------------------------------------------------------------------------

    pub fn push_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn pop_task(&mut self) -> Option<Task> {
        self.tasks.pop()
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.tasks.last()
    }

    pub fn current_task_mut(&mut self) -> Option<&mut Task> {
        self.tasks.last_mut()
    }

    // ------------------------------------------------------------------------
    // Run-loop
    // ------------------------------------------------------------------------

    fn ensure_terminal(&self) -> ParleyResult<()> {
        let agent = self.profile.name.clone();
        let terminal = self.terminal.clone();
        match self.space.get(&self.terminal) {
            Some(action) if action.is_terminal() => Ok(()),
            Some(_) => Err(ConfigurationError::UntaggedTerminal { agent, terminal }.into()),
            None => Err(ConfigurationError::MissingTerminal { agent, terminal }.into()),
        }
    }

    /// True once any TERMINAL-tagged action has run in this workspace.
    pub fn is_finished(&self) -> bool {
        self.workspace.history.iter().any(|entry| entry.action.is_terminal())
    }

    /// Narrow the space for the current workspace and choose one action.
    pub async fn select_action(&self, ctx: &ActionContext) -> ParleyResult<Selection> {
        let narrowed = self.narrower.narrow(&self.workspace, &self.space, ctx)?;
        let selection = self.selector.select(&narrowed, ctx).await?;
        tracing::debug!(
            agent = %self.profile.name,
            action = %selection.action.key(),
            candidates = narrowed.len(),
            "Selected action"
        );
        Ok(selection)
    }

    /// Execute a selection, record it, and register anything it discovered.
    /// Returns the result and the context for the next step.
    pub async fn do_selected_action(
        &mut self,
        selection: Selection,
        ctx: ActionContext,
    ) -> ParleyResult<(ActionResult, ActionContext)> {
        let Selection { action, params } = selection;

        let mut env = ActionEnv::new(&mut self.workspace.state);
        let result = match action.execute(params, &ctx, &mut env).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    agent = %self.profile.name,
                    action = %action.key(),
                    error = %e,
                    "Action failed"
                );
                return Err(e);
            }
        };
        let discovered = env.into_discovered();

        self.workspace
            .history
            .add(action.clone(), result.clone(), ctx.clone());
        for found in discovered {
            if !self.space.add_if_absent(found.clone()) {
                tracing::debug!(action = %found.key(), "Discovered action already known");
            }
            self.narrower.register(&found, Some(action.key()));
        }

        Ok((result.clone(), ctx.with_previous_result(result)))
    }

    /// Deliberate until the terminal action has run.
    ///
    /// The workspace is reset first. Fails before any narrowing when the
    /// terminal action is not in the space. Errors from actions propagate
    /// without retry.
    pub async fn run(&mut self, ctx: ActionContext) -> ParleyResult<(ActionResult, ActionContext)> {
        let mut ignore = |_: &ThinkingStep| {};
        self.deliberate(ctx, &mut ignore).await
    }

    /// Like [`Agent::run`], reporting each step to `on_step` and converting a
    /// failure into a report.
    pub async fn run_observed<F>(&mut self, ctx: ActionContext, mut on_step: F) -> RunReport
    where
        F: FnMut(&ThinkingStep) + Send,
    {
        match self.deliberate(ctx, &mut on_step).await {
            Ok((result, context)) => RunReport {
                steps: self.workspace.history.len(),
                result: Some(result),
                context: Some(context),
                error: None,
            },
            Err(e) => {
                tracing::error!(agent = %self.profile.name, error = %e, "Deliberation failed");
                RunReport {
                    steps: self.workspace.history.len(),
                    result: None,
                    context: None,
                    error: Some(e),
                }
            }
        }
    }

    async fn deliberate(
        &mut self,
        ctx: ActionContext,
        on_step: &mut (dyn FnMut(&ThinkingStep) + Send),
    ) -> ParleyResult<(ActionResult, ActionContext)> {
        self.ensure_terminal()?;
        self.workspace.reset();
        tracing::info!(agent = %self.profile.name, terminal = %self.terminal, "Deliberation started");

        let mut ctx = ctx;
        let mut last = ActionResult::new();
        while !self.is_finished() {
            let selection = self.select_action(&ctx).await?;
            let key = selection.action.key().clone();
            let description = selection.action.description().to_string();
            let params = selection.params.clone();

            let (result, next) = self.do_selected_action(selection, ctx).await?;
            on_step(&ThinkingStep {
                index: self.workspace.history.len() - 1,
                action: key,
                description,
                params,
                result: result.clone(),
            });
            last = result;
            ctx = next;
        }

        tracing::info!(
            agent = %self.profile.name,
            steps = self.workspace.history.len(),
            "Deliberation finished"
        );
        Ok((last, ctx))
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("profile", &self.profile)
            .field("actions", &self.space.keys())
            .field("terminal", &self.terminal)
            .field("history_len", &self.workspace.history.len())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
