//! Shared state of one exchange between two agents.

use parley_core::{ActionResult, AgentProfile, Conversation, Task};
use std::mem;

/// State carried across every delivery of one exchange.
///
/// `agent` is the side currently handling a message and `counterpart` the
/// side that sent it. The driver calls [`swap`](Self::swap) whenever a
/// message crosses to the other side.
#[derive(Debug, Clone)]
pub struct CommunicationState {
    pub agent: AgentProfile,
    pub counterpart: AgentProfile,
    /// The task under negotiation, owned by the exchange
    pub current_task: Option<Task>,
    /// Nesting level of the deliberation that opened this exchange
    pub depth: u32,
    pub max_depth: u32,
    /// Re-proposals made after a disappointment
    pub proposal_attempts: u32,
    /// Latest INFORMATION result received by either side
    pub last_result: Option<ActionResult>,
    /// Every delivered message, relayed as a conversation entry
    pub conversation: Conversation,
}

impl CommunicationState {
    pub fn new(agent: AgentProfile, counterpart: AgentProfile) -> Self {
        Self {
            agent,
            counterpart,
            current_task: None,
            depth: 0,
            max_depth: u32::MAX,
            proposal_attempts: 0,
            last_result: None,
            conversation: Conversation::new(),
        }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.current_task = Some(task);
        self
    }

    pub fn with_depth(mut self, depth: u32, max_depth: u32) -> Self {
        self.depth = depth;
        self.max_depth = max_depth;
        self
    }

    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = conversation;
        self
    }

    /// Flip perspective: the handler becomes the counterpart.
    pub fn swap(&mut self) {
        mem::swap(&mut self.agent, &mut self.counterpart);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> CommunicationState {
        CommunicationState::new(AgentProfile::new("alice", "a"), AgentProfile::new("bob", "b"))
    }

    #[test]
    fn test_swap_flips_perspective() {
        let mut s = state();
        s.swap();
        assert_eq!(s.agent.name, "bob");
        assert_eq!(s.counterpart.name, "alice");
        s.swap();
        assert_eq!(s.agent.name, "alice");
    }

    #[test]
    fn test_swap_keeps_shared_fields() {
        let mut s = state().with_task(Task::new("t")).with_depth(1, 4);
        s.proposal_attempts = 2;
        s.swap();
        assert_eq!(s.current_task.as_ref().map(|t| t.description.as_str()), Some("t"));
        assert_eq!(s.depth, 1);
        assert_eq!(s.proposal_attempts, 2);
    }
}
