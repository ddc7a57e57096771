//! Per-agent entry point for protocol deliveries.

use crate::message::{Message, MessageType};
use crate::state::CommunicationState;
use async_trait::async_trait;
use parley_core::{ParleyResult, ProtocolError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Reaction to one message type.
///
/// Returning `None` ends the exchange silently.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(
        &self,
        message: &Message,
        state: &mut CommunicationState,
    ) -> ParleyResult<Option<Message>>;
}

/// Dispatch table from message type to handler, owned by one agent.
#[derive(Clone)]
pub struct CommunicationInterface {
    owner: String,
    handlers: HashMap<MessageType, Arc<dyn MessageHandler>>,
}

impl CommunicationInterface {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            handlers: HashMap::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Register `handler` for `message_type`, replacing any previous one.
    pub fn register(&mut self, message_type: MessageType, handler: Arc<dyn MessageHandler>) {
        self.handlers.insert(message_type, handler);
    }

    pub fn with_handler(mut self, message_type: MessageType, handler: impl MessageHandler + 'static) -> Self {
        self.register(message_type, Arc::new(handler));
        self
    }

    pub fn handles(&self, message_type: MessageType) -> bool {
        self.handlers.contains_key(&message_type)
    }

    /// Deliver `message` and return the reply, stamped with this owner.
    ///
    /// A type without a handler, or a reply that is not a legal successor
    /// of the received type, is a protocol error.
    pub async fn handle(
        &self,
        message: &Message,
        state: &mut CommunicationState,
    ) -> ParleyResult<Option<Message>> {
        let received = message.message_type();
        let handler = self.handlers.get(&received).ok_or_else(|| ProtocolError::UnhandledMessageType {
            agent: self.owner.clone(),
            message_type: received.to_string(),
        })?;

        let Some(mut reply) = handler.handle(message, state).await? else {
            tracing::debug!(agent = %self.owner, received = %received, "Handler stayed silent");
            return Ok(None);
        };

        let reply_type = reply.message_type();
        if !received.can_reply_with(reply_type) {
            return Err(ProtocolError::IllegalTransition {
                received: received.to_string(),
                reply: reply_type.to_string(),
            }
            .into());
        }
        reply.sender = self.owner.clone();
        Ok(Some(reply))
    }
}

impl fmt::Debug for CommunicationInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort();
        f.debug_struct("CommunicationInterface")
            .field("owner", &self.owner)
            .field("handlers", &types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{AgentProfile, ParleyError};

    struct Reply(fn(&str) -> Message);

    #[async_trait]
    impl MessageHandler for Reply {
        async fn handle(
            &self,
            _message: &Message,
            state: &mut CommunicationState,
        ) -> ParleyResult<Option<Message>> {
            Ok(Some((self.0)(&state.agent.name)))
        }
    }

    struct Silent;

    #[async_trait]
    impl MessageHandler for Silent {
        async fn handle(
            &self,
            _message: &Message,
            _state: &mut CommunicationState,
        ) -> ParleyResult<Option<Message>> {
            Ok(None)
        }
    }

    fn state() -> CommunicationState {
        CommunicationState::new(AgentProfile::new("bob", "b"), AgentProfile::new("alice", "a"))
    }

    #[tokio::test]
    async fn test_unregistered_type_is_protocol_error() {
        let interface = CommunicationInterface::new("bob");
        let err = interface
            .handle(&Message::thanks("alice"), &mut state())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ParleyError::Protocol(ProtocolError::UnhandledMessageType { ref agent, ref message_type })
                if agent == "bob" && message_type == "THANKS"
        ));
    }

    #[tokio::test]
    async fn test_reply_is_stamped_with_owner() {
        let interface = CommunicationInterface::new("bob")
            .with_handler(MessageType::Thanks, Reply(|_| Message::end("someone-else")));
        let reply = interface
            .handle(&Message::thanks("alice"), &mut state())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.sender, "bob");
        assert_eq!(reply.message_type(), MessageType::End);
    }

    #[tokio::test]
    async fn test_illegal_reply_is_rejected() {
        let interface = CommunicationInterface::new("bob")
            .with_handler(MessageType::Thanks, Reply(|me| Message::thanks(me)));
        let err = interface
            .handle(&Message::thanks("alice"), &mut state())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ParleyError::Protocol(ProtocolError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_silent_handler() {
        let interface = CommunicationInterface::new("bob").with_handler(MessageType::Thanks, Silent);
        assert!(interface.handles(MessageType::Thanks));
        assert!(!interface.handles(MessageType::End));
        let reply = interface.handle(&Message::thanks("alice"), &mut state()).await.unwrap();
        assert!(reply.is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut interface = CommunicationInterface::new("bob").with_handler(MessageType::Thanks, Silent);
        interface.register(MessageType::Thanks, Arc::new(Reply(|me| Message::end(me))));
        assert!(format!("{interface:?}").contains("Thanks"));
    }
}
