//! Default handlers for every message type of the negotiation.
//!
//! The proposer side handles ACCEPTANCE, REJECTION, INFORMATION, ERROR and
//! its own DISAPPOINTMENT; the worker side handles PROPOSAL, TASK, QUERY and
//! THANKS. [`standard_interface`] installs both sides, so one interface can
//! play either role.

use crate::interface::{CommunicationInterface, MessageHandler};
use crate::message::{Message, MessagePayload, MessageType};
use crate::state::CommunicationState;
use async_trait::async_trait;
use parley_core::{
    ChatMessage, Conversation, ModelClient, ParleyResult, ProtocolError, Role, Task, TaskStatus,
};
use parley_engine::Agent;
use std::sync::Arc;
use tokio::sync::Mutex;

// ============================================================================
// PROPOSAL POLICIES
// ============================================================================

/// Outcome of considering a proposed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject { reason: String },
}

/// Decides whether an agent takes on a proposed task.
#[async_trait]
pub trait ProposalPolicy: Send + Sync {
    async fn consider(&self, task: &Task, state: &CommunicationState) -> ParleyResult<Verdict>;
}

/// Takes every task.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllProposals;

#[async_trait]
impl ProposalPolicy for AcceptAllProposals {
    async fn consider(&self, _task: &Task, _state: &CommunicationState) -> ParleyResult<Verdict> {
        Ok(Verdict::Accept)
    }
}

/// Asks a model whether the task fits the agent. Any reply starting with
/// "yes" accepts; everything else is a rejection carrying the reply.
pub struct ModelJudgedProposals {
    model: Arc<dyn ModelClient>,
}

impl ModelJudgedProposals {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }

    fn render_prompt(task: &Task, state: &CommunicationState) -> String {
        format!(
            "You are {name}: {description}\n\
             {peer} asks you to take on this task: {task}\n\
             Answer \"yes\" or \"no\", followed by a short reason.",
            name = state.agent.name,
            description = state.agent.description,
            peer = state.counterpart.name,
            task = task.description,
        )
    }

    fn parse_verdict(reply: &str) -> Verdict {
        let normalized = reply
            .trim()
            .trim_start_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if normalized.starts_with("yes") {
            Verdict::Accept
        } else {
            Verdict::Reject {
                reason: reply.trim().to_string(),
            }
        }
    }
}

#[async_trait]
impl ProposalPolicy for ModelJudgedProposals {
    async fn consider(&self, task: &Task, state: &CommunicationState) -> ParleyResult<Verdict> {
        let reply = self.model.call(&Self::render_prompt(task, state)).await?;
        Ok(Self::parse_verdict(&reply))
    }
}

// ============================================================================
// WORKER SIDE
// ============================================================================

/// PROPOSAL → ACCEPTANCE | REJECTION, decided by a [`ProposalPolicy`].
pub struct ProposalHandler {
    policy: Arc<dyn ProposalPolicy>,
}

impl ProposalHandler {
    pub fn new(policy: Arc<dyn ProposalPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl MessageHandler for ProposalHandler {
    async fn handle(
        &self,
        message: &Message,
        state: &mut CommunicationState,
    ) -> ParleyResult<Option<Message>> {
        let MessagePayload::Proposal { task } = &message.payload else {
            return Err(ProtocolError::MissingTask.into());
        };
        let me = state.agent.name.clone();
        let reply = match self.policy.consider(task, state).await? {
            Verdict::Accept => Message::acceptance(me, task.clone()),
            Verdict::Reject { reason } => Message::rejection(me, reason),
        };
        Ok(Some(reply))
    }
}

/// TASK | QUERY → INFORMATION | ERROR, by running the owner's agent.
///
/// Every failure, including a busy agent, is reified as an ERROR message.
pub struct RunAgentHandler {
    agent: Arc<Mutex<Agent>>,
}

impl RunAgentHandler {
    pub fn new(agent: Arc<Mutex<Agent>>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl MessageHandler for RunAgentHandler {
    async fn handle(
        &self,
        message: &Message,
        state: &mut CommunicationState,
    ) -> ParleyResult<Option<Message>> {
        let (request, task) = match &message.payload {
            MessagePayload::Task { task } => (task.description.clone(), Some(task.clone())),
            MessagePayload::Query { question } => (question.clone(), None),
            _ => return Err(ProtocolError::MissingTask.into()),
        };
        let me = state.agent.name.clone();

        let Ok(mut agent) = self.agent.try_lock() else {
            let busy = ProtocolError::AgentBusy { agent: me.clone() };
            tracing::warn!(agent = %me, "Agent busy, refusing nested request");
            return Ok(Some(Message::error(me, busy.to_string())));
        };

        let ctx = agent
            .fresh_context()
            .with_conversation(
                Conversation::new()
                    .with(ChatMessage::user(request).with_sender(state.counterpart.name.clone())),
            )
            .with_depth(state.depth.saturating_add(1));

        let has_task = task.is_some();
        if let Some(task) = task {
            agent.push_task(task);
        }
        let outcome = agent.run(ctx).await;
        if has_task {
            agent.pop_task();
        }

        let reply = match outcome {
            Ok((result, _)) => Message::information(me, result),
            Err(e) => {
                tracing::warn!(agent = %me, error = %e, "Delegated run failed");
                Message::error(me, e.to_string())
            }
        };
        Ok(Some(reply))
    }
}

/// THANKS → END.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThanksHandler;

#[async_trait]
impl MessageHandler for ThanksHandler {
    async fn handle(
        &self,
        _message: &Message,
        state: &mut CommunicationState,
    ) -> ParleyResult<Option<Message>> {
        Ok(Some(Message::end(state.agent.name.clone())))
    }
}

// ============================================================================
// PROPOSER SIDE
// ============================================================================

/// ACCEPTANCE → TASK. Starts the task under the accepting agent's name.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptanceHandler;

#[async_trait]
impl MessageHandler for AcceptanceHandler {
    async fn handle(
        &self,
        _message: &Message,
        state: &mut CommunicationState,
    ) -> ParleyResult<Option<Message>> {
        let assignee = state.counterpart.name.clone();
        let task = state.current_task.as_mut().ok_or(ProtocolError::MissingTask)?;
        task.start(assignee)?;
        Ok(Some(Message::task(state.agent.name.clone(), task.clone())))
    }
}

/// REJECTION → DISAPPOINTMENT, keeping the rejection reason.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectionHandler;

#[async_trait]
impl MessageHandler for RejectionHandler {
    async fn handle(
        &self,
        message: &Message,
        state: &mut CommunicationState,
    ) -> ParleyResult<Option<Message>> {
        let reason = match &message.payload {
            MessagePayload::Rejection { reason } => reason.clone(),
            _ => message.content.clone(),
        };
        Ok(Some(Message::disappointment(state.agent.name.clone(), reason)))
    }
}

/// INFORMATION → THANKS, or DISAPPOINTMENT when the result is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct InformationHandler;

#[async_trait]
impl MessageHandler for InformationHandler {
    async fn handle(
        &self,
        message: &Message,
        state: &mut CommunicationState,
    ) -> ParleyResult<Option<Message>> {
        let MessagePayload::Information { result } = &message.payload else {
            return Err(ProtocolError::MissingTask.into());
        };
        let useful = !result.is_empty();
        state.last_result = Some(result.clone());

        if let Some(task) = state.current_task.as_mut() {
            if task.status == TaskStatus::InProgress {
                if useful {
                    task.complete()?;
                } else {
                    task.fail("empty result")?;
                }
            }
        }

        let me = state.agent.name.clone();
        let reply = if useful {
            Message::thanks(me)
        } else {
            Message::disappointment(me, format!("{} returned nothing", message.sender))
        };
        Ok(Some(reply))
    }
}

/// ERROR → DISAPPOINTMENT, failing the task in progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorHandler;

#[async_trait]
impl MessageHandler for ErrorHandler {
    async fn handle(
        &self,
        message: &Message,
        state: &mut CommunicationState,
    ) -> ParleyResult<Option<Message>> {
        let error = match &message.payload {
            MessagePayload::Error { error } => error.clone(),
            _ => message.content.clone(),
        };
        if let Some(task) = state.current_task.as_mut() {
            if task.status == TaskStatus::InProgress {
                task.fail(error.clone())?;
            }
        }
        Ok(Some(Message::disappointment(state.agent.name.clone(), error)))
    }
}

/// Self-directed DISAPPOINTMENT → PROPOSAL while the task is still pending
/// and retries remain, else END.
#[derive(Debug, Clone, Copy)]
pub struct DisappointmentHandler {
    max_retries: u32,
}

impl DisappointmentHandler {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }
}

#[async_trait]
impl MessageHandler for DisappointmentHandler {
    async fn handle(
        &self,
        _message: &Message,
        state: &mut CommunicationState,
    ) -> ParleyResult<Option<Message>> {
        let me = state.agent.name.clone();
        let retry = state
            .current_task
            .as_ref()
            .filter(|task| task.is_pending() && state.proposal_attempts < self.max_retries)
            .cloned();

        match retry {
            Some(task) => {
                state.proposal_attempts += 1;
                tracing::debug!(agent = %me, attempt = state.proposal_attempts, "Re-proposing task");
                Ok(Some(Message::proposal(me, task)))
            }
            None => Ok(Some(Message::end(me))),
        }
    }
}

// ============================================================================
// FREE FORM
// ============================================================================

/// FREE_FORM → FREE_FORM, answered by a model over the relayed conversation.
/// An empty model reply closes the exchange.
pub struct FreeFormHandler {
    model: Arc<dyn ModelClient>,
}

impl FreeFormHandler {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl MessageHandler for FreeFormHandler {
    async fn handle(
        &self,
        _message: &Message,
        state: &mut CommunicationState,
    ) -> ParleyResult<Option<Message>> {
        let me = state.agent.name.clone();
        let mut history = vec![ChatMessage::new(
            Role::System,
            format!("You are {me}: {}", state.agent.description),
        )];
        history.extend(state.conversation.messages().iter().cloned());

        let reply = self.model.call_with_history(&history).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Ok(Some(Message::end(me)));
        }
        Ok(Some(Message::free_form(me, reply)))
    }
}

// ============================================================================
// ASSEMBLY
// ============================================================================

/// An interface that can both propose tasks and work on them.
///
/// TASK and QUERY run `agent`; PROPOSAL is decided by `policy`; a
/// disappointment re-proposes up to `proposal_retries` times.
pub fn standard_interface(
    owner: impl Into<String>,
    agent: Arc<Mutex<Agent>>,
    policy: Arc<dyn ProposalPolicy>,
    proposal_retries: u32,
) -> CommunicationInterface {
    let runner: Arc<dyn MessageHandler> = Arc::new(RunAgentHandler::new(agent));
    let mut interface = CommunicationInterface::new(owner)
        .with_handler(MessageType::Proposal, ProposalHandler { policy })
        .with_handler(MessageType::Acceptance, AcceptanceHandler)
        .with_handler(MessageType::Rejection, RejectionHandler)
        .with_handler(MessageType::Information, InformationHandler)
        .with_handler(MessageType::Thanks, ThanksHandler)
        .with_handler(MessageType::Disappointment, DisappointmentHandler::new(proposal_retries))
        .with_handler(MessageType::Error, ErrorHandler);
    interface.register(MessageType::Task, Arc::clone(&runner));
    interface.register(MessageType::Query, runner);
    interface
}
