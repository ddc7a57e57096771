use super::{trivial_choice, ActionSelector, Selection};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use parley_core::{
    Action, ActionContext, ActionKey, ActionParams, ActionSpace, ConfigurationError, ModelClient,
    ParleyResult,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;

static FENCED_BLOCK: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(.*?)```").ok());

/// The structured choice a model is asked to produce.
#[derive(Debug, Deserialize)]
struct ModelChoice {
    name: String,
    #[serde(default)]
    params: Value,
}

/// Asks a language model to choose among the rendered candidates.
pub struct ModelPromptedSelector {
    model: Arc<dyn ModelClient>,
    history_window: usize,
}

impl ModelPromptedSelector {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            history_window: 10,
        }
    }

    /// Number of most recent conversation entries included in the prompt.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    fn render_prompt(&self, space: &ActionSpace, ctx: &ActionContext) -> String {
        let mut prompt = String::new();
        let _ = writeln!(
            prompt,
            "You are {}, {}. Choose the single next action.",
            ctx.agent.name, ctx.agent.description
        );

        let recent = ctx.conversation.last_n(self.history_window);
        if !recent.is_empty() {
            prompt.push_str("\nConversation:\n");
            for message in recent {
                let author = message.sender.as_deref().unwrap_or(message.role.as_str());
                let _ = writeln!(prompt, "{}: {}", author, message.content);
            }
        }

        prompt.push_str("\nActions:\n");
        for action in space.iter() {
            let _ = writeln!(prompt, "- name: {}", action.name());
            let _ = writeln!(prompt, "  description: {}", action.description());
            let _ = writeln!(prompt, "  params: {}", action.params_schema());
        }

        prompt.push_str(
            "\nAnswer with a JSON object {\"name\": <action name>, \"params\": {...}} and nothing else.\n",
        );
        prompt
    }
}

/// Decode a model reply into a choice. Code fences are stripped; failing a
/// direct decode, the outermost `{...}` span is tried.
fn parse_choice(reply: &str) -> Option<ModelChoice> {
    let body = FENCED_BLOCK
        .as_ref()
        .and_then(|re| re.captures(reply))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply)
        .trim();

    if let Ok(choice) = serde_json::from_str::<ModelChoice>(body) {
        return Some(choice);
    }
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<ModelChoice>(&body[start..=end]).ok()
}

/// Exact key first, then a case-insensitive name match.
fn resolve<'a>(space: &'a ActionSpace, name: &str) -> Option<&'a Action> {
    let name = name.trim();
    space
        .get(&ActionKey::new(name))
        .or_else(|| space.iter().find(|a| a.name().eq_ignore_ascii_case(name)))
}

#[async_trait]
impl ActionSelector for ModelPromptedSelector {
    async fn select(&self, space: &ActionSpace, ctx: &ActionContext) -> ParleyResult<Selection> {
        if let Some(selection) = trivial_choice(space)? {
            return Ok(selection);
        }

        let prompt = self.render_prompt(space, ctx);
        let reply = self.model.call(&prompt).await?;

        let unresolvable = || ConfigurationError::UnresolvableChoice {
            choice: reply.trim().to_string(),
        };
        let choice = parse_choice(&reply).ok_or_else(unresolvable)?;
        let action = resolve(space, &choice.name).ok_or_else(unresolvable)?;

        tracing::debug!(action = %action.key(), "Model-prompted selection");
        Ok(Selection::new(action.clone()).with_params(ActionParams::from_json(choice.params)))
    }
}

impl std::fmt::Debug for ModelPromptedSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelPromptedSelector")
            .field("history_window", &self.history_window)
            .finish()
    }
}
