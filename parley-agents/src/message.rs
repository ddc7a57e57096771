//! Typed protocol messages and the legal-reply table.

use chrono::Utc;
use parley_core::{new_entity_id, ActionResult, ChatMessage, EntityId, Task, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

// ============================================================================
// MESSAGE TYPE
// ============================================================================

/// Vertex of the negotiation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Offer a task to the counterpart
    Proposal,
    /// The counterpart takes the proposed task
    Acceptance,
    /// The counterpart declines the proposed task
    Rejection,
    /// Ask the counterpart a question without delegating a task
    Query,
    /// Hand over an accepted task for execution
    Task,
    /// Result of a task or an answer to a query
    Information,
    /// Acknowledge useful information
    Thanks,
    /// Note a failed step; handled by the sender itself
    Disappointment,
    /// The counterpart failed while working
    Error,
    /// Close the exchange
    End,
    /// Unstructured chat between agents
    FreeForm,
}

impl MessageType {
    pub const ALL: [MessageType; 11] = [
        Self::Proposal,
        Self::Acceptance,
        Self::Rejection,
        Self::Query,
        Self::Task,
        Self::Information,
        Self::Thanks,
        Self::Disappointment,
        Self::Error,
        Self::End,
        Self::FreeForm,
    ];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Proposal => "PROPOSAL",
            Self::Acceptance => "ACCEPTANCE",
            Self::Rejection => "REJECTION",
            Self::Query => "QUERY",
            Self::Task => "TASK",
            Self::Information => "INFORMATION",
            Self::Thanks => "THANKS",
            Self::Disappointment => "DISAPPOINTMENT",
            Self::Error => "ERROR",
            Self::End => "END",
            Self::FreeForm => "FREE_FORM",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_db_str().eq_ignore_ascii_case(s))
    }

    /// Types a handler may answer this type with.
    pub fn allowed_replies(&self) -> &'static [MessageType] {
        match self {
            Self::Proposal => &[Self::Acceptance, Self::Rejection],
            Self::Rejection => &[Self::Disappointment],
            Self::Acceptance => &[Self::Task],
            Self::Query | Self::Task => &[Self::Information, Self::Error],
            Self::Information => &[Self::Thanks, Self::Disappointment],
            Self::Thanks => &[Self::End],
            Self::Disappointment => &[Self::Proposal, Self::End],
            Self::Error => &[Self::Disappointment],
            Self::End => &[],
            Self::FreeForm => &[Self::FreeForm, Self::End],
        }
    }

    pub fn can_reply_with(&self, reply: MessageType) -> bool {
        self.allowed_replies().contains(&reply)
    }

    /// Delivered back to its sender's own interface instead of the counterpart.
    pub fn is_self_directed(&self) -> bool {
        matches!(self, Self::Disappointment)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

// ============================================================================
// PAYLOAD
// ============================================================================

/// Type-specific body of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessagePayload {
    Proposal { task: Task },
    Acceptance { task: Task },
    Rejection { reason: String },
    Query { question: String },
    Task { task: Task },
    Information { result: ActionResult },
    Thanks,
    Disappointment { reason: String },
    Error { error: String },
    End,
    FreeForm,
}

impl MessagePayload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Proposal { .. } => MessageType::Proposal,
            Self::Acceptance { .. } => MessageType::Acceptance,
            Self::Rejection { .. } => MessageType::Rejection,
            Self::Query { .. } => MessageType::Query,
            Self::Task { .. } => MessageType::Task,
            Self::Information { .. } => MessageType::Information,
            Self::Thanks => MessageType::Thanks,
            Self::Disappointment { .. } => MessageType::Disappointment,
            Self::Error { .. } => MessageType::Error,
            Self::End => MessageType::End,
            Self::FreeForm => MessageType::FreeForm,
        }
    }
}

// ============================================================================
// MESSAGE
// ============================================================================

/// One protocol message. `content` is the human-readable rendering relayed
/// into conversations; `payload` is what handlers act on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: EntityId,
    /// Name of the sending agent
    pub sender: String,
    pub content: String,
    pub payload: MessagePayload,
    pub created_at: Timestamp,
}

impl Message {
    pub fn new(sender: impl Into<String>, content: impl Into<String>, payload: MessagePayload) -> Self {
        Self {
            message_id: new_entity_id(),
            sender: sender.into(),
            content: content.into(),
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn proposal(sender: impl Into<String>, task: Task) -> Self {
        let content = format!("Could you take on this task: {}", task.description);
        Self::new(sender, content, MessagePayload::Proposal { task })
    }

    pub fn acceptance(sender: impl Into<String>, task: Task) -> Self {
        let content = format!("I accept the task: {}", task.description);
        Self::new(sender, content, MessagePayload::Acceptance { task })
    }

    pub fn rejection(sender: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(sender, format!("I must decline: {reason}"), MessagePayload::Rejection { reason })
    }

    pub fn query(sender: impl Into<String>, question: impl Into<String>) -> Self {
        let question = question.into();
        Self::new(sender, question.clone(), MessagePayload::Query { question })
    }

    pub fn task(sender: impl Into<String>, task: Task) -> Self {
        let content = task.description.clone();
        Self::new(sender, content, MessagePayload::Task { task })
    }

    pub fn information(sender: impl Into<String>, result: ActionResult) -> Self {
        let content = Value::Object(result.values().clone().into_iter().collect()).to_string();
        Self::new(sender, content, MessagePayload::Information { result })
    }

    pub fn thanks(sender: impl Into<String>) -> Self {
        Self::new(sender, "Thank you.", MessagePayload::Thanks)
    }

    pub fn disappointment(sender: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(sender, reason.clone(), MessagePayload::Disappointment { reason })
    }

    pub fn error(sender: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(sender, format!("Something went wrong: {error}"), MessagePayload::Error { error })
    }

    pub fn end(sender: impl Into<String>) -> Self {
        Self::new(sender, "Goodbye.", MessagePayload::End)
    }

    pub fn free_form(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(sender, content, MessagePayload::FreeForm)
    }

    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }

    /// The task carried by a PROPOSAL, ACCEPTANCE or TASK message.
    pub fn task_ref(&self) -> Option<&Task> {
        match &self.payload {
            MessagePayload::Proposal { task }
            | MessagePayload::Acceptance { task }
            | MessagePayload::Task { task } => Some(task),
            _ => None,
        }
    }

    /// Conversation entry for relaying this message.
    pub fn to_chat(&self) -> ChatMessage {
        ChatMessage::agent(self.sender.clone(), self.content.clone())
    }

    /// Compact JSON form used in transcripts.
    pub fn summary(&self) -> Value {
        json!({
            "sender": self.sender,
            "type": self.message_type().as_db_str(),
            "content": self.content,
        })
    }
}
