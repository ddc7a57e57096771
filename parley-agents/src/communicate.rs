//! Exchange driver and the action that opens a negotiation.

use crate::directory::AgentDirectory;
use crate::message::Message;
use crate::state::CommunicationState;
use async_trait::async_trait;
use parley_core::{
    Action, ActionBody, ActionCapabilities, ActionContext, ActionEnv, ActionParams, ActionResult,
    ParleyResult, ProtocolConfig, ProtocolError, Task,
};
use serde_json::{json, Value};
use std::sync::Arc;

// ============================================================================
// EXCHANGE DRIVER
// ============================================================================

/// How an exchange stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// A handler replied END
    Ended,
    /// A handler produced no reply
    Silent,
    /// The turn cap was hit before END
    TurnCapReached,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ended => "ended",
            Self::Silent => "silent",
            Self::TurnCapReached => "turn_cap_reached",
        }
    }

    pub fn is_abnormal(&self) -> bool {
        matches!(self, Self::TurnCapReached)
    }
}

/// Everything an exchange produced.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    /// Delivered messages in order, followed by the closing END if any
    pub transcript: Vec<Message>,
    /// Number of deliveries
    pub turns: u32,
    pub termination: Termination,
}

/// Deliver `opening` and every following reply until END, silence, or
/// `max_turns` deliveries.
///
/// `state.agent` must be the sender of `opening`. Messages cross to the
/// other side with a perspective swap, except self-directed ones, which go
/// back to their sender's own interface. Every delivered message is relayed
/// into `state.conversation`.
pub async fn drive_exchange(
    directory: &AgentDirectory,
    opening: Message,
    state: &mut CommunicationState,
    max_turns: u32,
) -> ParleyResult<ExchangeOutcome> {
    let mut transcript = Vec::new();
    let mut message = opening;
    let mut turns = 0;

    let termination = loop {
        if turns >= max_turns {
            tracing::warn!(
                agent = %state.agent.name,
                counterpart = %state.counterpart.name,
                max_turns,
                "Exchange hit the turn cap"
            );
            break Termination::TurnCapReached;
        }

        let message_type = message.message_type();
        if !message_type.is_self_directed() {
            state.swap();
        }
        let recipient = state.agent.name.clone();
        let interface = directory.interface(&recipient)?;
        tracing::debug!(
            sender = %message.sender,
            recipient = %recipient,
            message_type = %message_type,
            turn = turns + 1,
            "Delivering message"
        );

        state.conversation.push(message.to_chat());
        let reply = interface.handle(&message, state).await?;
        transcript.push(message);
        turns += 1;

        match reply {
            None => break Termination::Silent,
            Some(reply) if reply.message_type().is_terminal() => {
                state.conversation.push(reply.to_chat());
                transcript.push(reply);
                break Termination::Ended;
            }
            Some(reply) => message = reply,
        }
    };

    tracing::info!(turns, termination = termination.as_str(), "Exchange finished");
    Ok(ExchangeOutcome {
        transcript,
        turns,
        termination,
    })
}

// ============================================================================
// COMMUNICATE ACTION
// ============================================================================

/// Opens a negotiation with a peer and drives it to completion.
///
/// Params: `peer` (defaults to the first registered friend), `task`
/// (defaults to the latest user message), `mode` (`"query"` asks instead of
/// proposing).
///
/// The result merges the peer's last INFORMATION with `peer`, `turns`,
/// `termination`, `transcript` and, for proposals, `task_status`. When the
/// turn cap is hit the previous result is carried forward instead.
pub struct Communicate {
    directory: Arc<AgentDirectory>,
    protocol: ProtocolConfig,
}

impl Communicate {
    pub const KEY: &'static str = "communicate";

    pub fn new(directory: Arc<AgentDirectory>, protocol: ProtocolConfig) -> Self {
        Self {
            directory,
            protocol,
        }
    }

    pub fn into_action(self) -> Action {
        Action::new(
            Self::KEY,
            "Ask another agent to take on a task or answer a question.",
            self,
        )
        .with_capabilities(ActionCapabilities::COMMUNICATION)
        .with_params_schema(json!({
            "type": "object",
            "properties": {
                "peer": {"type": "string", "description": "Name of the agent to contact"},
                "task": {"type": "string", "description": "What to ask for"},
                "mode": {"type": "string", "enum": ["propose", "query"]}
            }
        }))
    }

    fn resolve_peer(&self, params: &ActionParams, ctx: &ActionContext) -> ParleyResult<String> {
        if let Some(peer) = params.get_str("peer") {
            return Ok(peer.to_string());
        }
        ctx.agent
            .friends
            .iter()
            .find(|friend| self.directory.contains(friend))
            .cloned()
            .ok_or_else(|| {
                ProtocolError::NoPeer {
                    agent: ctx.agent.name.clone(),
                }
                .into()
            })
    }

    fn resolve_request(params: &ActionParams, ctx: &ActionContext) -> ParleyResult<String> {
        params
            .get_str("task")
            .map(str::to_string)
            .or_else(|| ctx.conversation.latest_user_message().map(|m| m.content.clone()))
            .ok_or_else(|| ProtocolError::MissingTask.into())
    }
}

#[async_trait]
impl ActionBody for Communicate {
    async fn execute(
        &self,
        params: ActionParams,
        ctx: &ActionContext,
        _env: &mut ActionEnv<'_>,
    ) -> ParleyResult<ActionResult> {
        if ctx.depth >= self.protocol.max_depth {
            return Err(ProtocolError::RecursionLimit {
                depth: ctx.depth,
                max_depth: self.protocol.max_depth,
            }
            .into());
        }

        let peer = self.directory.peer(&self.resolve_peer(&params, ctx)?)?;
        let request = Self::resolve_request(&params, ctx)?;
        let me = ctx.agent.name.clone();

        let mut state = CommunicationState::new(ctx.agent.clone(), peer.profile.clone())
            .with_depth(ctx.depth, self.protocol.max_depth)
            .with_conversation(ctx.conversation.clone());
        let opening = if params.get_str("mode") == Some("query") {
            Message::query(me, request)
        } else {
            let task = Task::new(request);
            state.current_task = Some(task.clone());
            Message::proposal(me, task)
        };

        tracing::info!(
            agent = %ctx.agent.name,
            peer = %peer.profile.name,
            depth = ctx.depth,
            "Opening exchange"
        );
        let outcome = drive_exchange(&self.directory, opening, &mut state, self.protocol.max_turns).await?;

        let mut result = if outcome.termination.is_abnormal() {
            ctx.previous_result.clone().unwrap_or_default()
        } else {
            state.last_result.clone().unwrap_or_default()
        };
        let transcript: Vec<Value> = outcome.transcript.iter().map(Message::summary).collect();
        result.insert("peer", peer.profile.name.clone());
        result.insert("turns", outcome.turns);
        result.insert("termination", outcome.termination.as_str());
        result.insert("transcript", transcript);
        if let Some(task) = &state.current_task {
            result.insert("task_status", task.status.as_db_str());
        }
        Ok(result)
    }
}
