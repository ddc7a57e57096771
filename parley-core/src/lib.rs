//! PARLEY Core - Action, History and Collaborator Types
//!
//! Data structures shared by the deliberation engine and the negotiation
//! protocol. Collaborator traits (model, embeddings, tools) are declared here
//! and implemented elsewhere.

mod action;
mod config;
mod context;
mod embedding;
mod error;
mod history;
mod identity;
mod provider;
mod space;
mod task;
mod workspace;

pub use action::{
    Action, ActionBody, ActionCapabilities, ActionEnv, ActionParams, ActionResult, Fragment,
};
pub use config::{EngineConfig, ParleyConfig, ProtocolConfig, ProviderConfig};
pub use context::{
    ActionContext, AgentProfile, ChatMessage, Conversation, Role, UserProfile,
};
pub use embedding::EmbeddingVector;
pub use error::{
    ActionError, ConfigError, ConfigurationError, LlmError, ParleyError, ParleyResult,
    ProtocolError, TaskError, ToolError, VectorError,
};
pub use history::{ActionHistory, HistoryEntry};
pub use identity::{compute_content_hash, new_entity_id, ActionKey, ContentHash, EntityId, Timestamp};
pub use provider::{EmbeddingProvider, ModelClient, ToolCatalog, ToolSpec};
pub use space::ActionSpace;
pub use task::{Task, TaskPriority, TaskStatus, TaskStatusParseError};
pub use workspace::{StateBag, Workspace};
