//! Delegated units of work.
//!
//! # State Transition Diagram
//!
//! ```text
//! new() → Pending ── start() ──→ InProgress ──┬── complete() → Completed
//!                                             └── fail() ────→ Failed
//! ```

use crate::{new_entity_id, EntityId, ParleyResult, TaskError, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// TASK STATUS
// ============================================================================

/// Lifecycle status of a task. Transitions are monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, TaskStatusParseError> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "inprogress" | "in_progress" | "in-progress" => Ok(TaskStatus::InProgress),
            "completed" | "complete" => Ok(TaskStatus::Completed),
            "failed" | "failure" => Ok(TaskStatus::Failed),
            _ => Err(TaskStatusParseError(s.to_string())),
        }
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid task status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid task status: {}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ============================================================================
// TASK PRIORITY
// ============================================================================

/// Priority level for tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Low priority - can be delayed
    Low,
    /// Normal priority
    Normal,
    /// High priority - should be processed soon
    High,
    /// Critical - must be processed immediately
    Critical,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl TaskPriority {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(TaskPriority::Low),
            "normal" => Some(TaskPriority::Normal),
            "high" => Some(TaskPriority::High),
            "critical" => Some(TaskPriority::Critical),
            _ => None,
        }
    }
}

// ============================================================================
// TASK
// ============================================================================

/// A delegated unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: EntityId,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    /// Agent that accepted the task
    pub assignee: Option<String>,
    pub error: Option<String>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            task_id: new_entity_id(),
            description: description.into(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Normal,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            assignee: None,
            error: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    fn transition(&mut self, next: TaskStatus) -> ParleyResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to: next,
            }
            .into());
        }
        self.status = next;
        Ok(())
    }

    /// Pending → InProgress, recording who works on it.
    pub fn start(&mut self, assignee: impl Into<String>) -> ParleyResult<()> {
        self.transition(TaskStatus::InProgress)?;
        self.started_at = Some(Utc::now());
        self.assignee = Some(assignee.into());
        Ok(())
    }

    pub fn complete(&mut self) -> ParleyResult<()> {
        self.transition(TaskStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> ParleyResult<()> {
        self.transition(TaskStatus::Failed)?;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

// ============================================================================
// TESTS
// ============================================================================
