//! Per-turn execution environment and the conversation collaborator.

use crate::{ActionResult, Timestamp, ToolCatalog};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// CONVERSATION
// ============================================================================

/// Author role of a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Agent,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Agent => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Name of the agent or user that authored this entry
    pub sender: Option<String>,
    pub created_at: Timestamp,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            sender: None,
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn agent(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Agent, content).with_sender(sender)
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }
}

/// Ordered, append-only conversation log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn with(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// The last `n` entries, oldest first.
    pub fn last_n(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn latest_from(&self, role: Role) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    pub fn latest_user_message(&self) -> Option<&ChatMessage> {
        self.latest_from(Role::User)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ============================================================================
// PARTICIPANTS
// ============================================================================

/// Public identity of an agent, including its friendship edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    pub friends: BTreeSet<String>,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            friends: BTreeSet::new(),
        }
    }

    pub fn is_friend(&self, name: &str) -> bool {
        self.friends.contains(name)
    }
}

/// The human the deliberation acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
}

// ============================================================================
// ACTION CONTEXT
// ============================================================================

/// Environment of one turn. Passed by value; `context(N).previous_result`
/// is always `result(N-1)`.
#[derive(Clone)]
pub struct ActionContext {
    pub conversation: Conversation,
    pub previous_result: Option<ActionResult>,
    pub tools: Option<Arc<dyn ToolCatalog>>,
    pub agent: AgentProfile,
    pub user: Option<UserProfile>,
    /// Nesting level of negotiations that led to this deliberation.
    pub depth: u32,
}

impl ActionContext {
    pub fn new(agent: AgentProfile) -> Self {
        Self {
            conversation: Conversation::new(),
            previous_result: None,
            tools: None,
            agent,
            user: None,
            depth: 0,
        }
    }

    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = conversation;
        self
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolCatalog>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Context for the next turn.
    pub fn with_previous_result(mut self, result: ActionResult) -> Self {
        self.previous_result = Some(result);
        self
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("agent", &self.agent.name)
            .field("conversation_len", &self.conversation.len())
            .field("previous_result", &self.previous_result)
            .field("tools", &self.tools.is_some())
            .field("depth", &self.depth)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
