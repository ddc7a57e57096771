//! Error types for PARLEY operations

use crate::{ActionKey, TaskStatus};
use thiserror::Error;

/// Assembly-time mistakes. These fail fast and are never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Terminal action {terminal} is not a member of the action space of agent {agent}")]
    MissingTerminal { agent: String, terminal: ActionKey },

    #[error("Terminal action {terminal} of agent {agent} lacks the TERMINAL capability")]
    UntaggedTerminal { agent: String, terminal: ActionKey },

    #[error("No narrowing edge registered for action {action}")]
    MissingEdge { action: ActionKey },

    #[error("Action {action} is referenced by the graph but absent from the action space")]
    UnknownAction { action: ActionKey },

    #[error("Cannot select from an empty action space")]
    EmptyActionSpace,

    #[error("Selector choice {choice:?} does not name a candidate action")]
    UnresolvableChoice { choice: String },

    #[error("Action {action} is already a member of the action space")]
    DuplicateAction { action: ActionKey },
}

/// Model and embedding collaborator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No LLM provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: i64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Embedding failed: {reason}")]
    EmbeddingFailed { reason: String },
}

/// Tool catalog collaborator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("No tool catalog configured")]
    NotConfigured,

    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Tool {name} failed: {reason}")]
    CallFailed { name: String, reason: String },
}

/// Vector operation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VectorError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Negotiation protocol errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Agent {agent} has no handler for {message_type} messages")]
    UnhandledMessageType { agent: String, message_type: String },

    #[error("Illegal transition: {received} cannot be answered with {reply}")]
    IllegalTransition { received: String, reply: String },

    #[error("Nested exchange depth {depth} exceeds the limit of {max_depth}")]
    RecursionLimit { depth: u32, max_depth: u32 },

    #[error("Agent {agent} is already deliberating")]
    AgentBusy { agent: String },

    #[error("Agent {agent} has no reachable peer")]
    NoPeer { agent: String },

    #[error("Agent {agent} is not registered in the directory")]
    UnknownAgent { agent: String },

    #[error("No task is under negotiation")]
    MissingTask,
}

/// Task lifecycle errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task cannot move from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

/// Failures raised by action bodies.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("Action {action} failed: {reason}")]
    Failed { action: ActionKey, reason: String },
}

/// Configuration file errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or PARLEY_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file: {reason}")]
    Io { reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Master error type for all PARLEY errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParleyError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl ParleyError {
    /// Assembly mistakes: missing terminal, missing edge, unresolvable choice.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Config(_))
    }

    /// Failures of the model, embedding or tool collaborators.
    pub fn is_collaborator(&self) -> bool {
        matches!(self, Self::Llm(_) | Self::Tool(_) | Self::Action(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

/// Result type alias for PARLEY operations.
pub type ParleyResult<T> = Result<T, ParleyError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_edge_display() {
        let err = ConfigurationError::MissingEdge {
            action: ActionKey::new("plan"),
        };
        assert_eq!(err.to_string(), "No narrowing edge registered for action plan");
    }

    #[test]
    fn test_wrapping_preserves_classification() {
        let err: ParleyError = ConfigurationError::EmptyActionSpace.into();
        assert!(err.is_configuration());
        assert!(!err.is_protocol());

        let err: ParleyError = ProtocolError::MissingTask.into();
        assert!(err.is_protocol());

        let err: ParleyError = LlmError::ProviderNotConfigured.into();
        assert!(err.is_collaborator());
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_task_error_display_uses_status_names() {
        let err = TaskError::InvalidTransition {
            from: TaskStatus::Completed,
            to: TaskStatus::InProgress,
        };
        assert_eq!(err.to_string(), "Task cannot move from completed to in_progress");
    }
}
