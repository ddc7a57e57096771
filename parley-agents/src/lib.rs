//! PARLEY Agents - Negotiation Protocol
//!
//! Two agents negotiate, delegate and report on a [`parley_core::Task`] by
//! exchanging typed [`Message`]s. Each agent owns a
//! [`CommunicationInterface`] that dispatches on [`MessageType`]; the
//! [`Communicate`] action drives an exchange from inside a deliberation and
//! TASK/QUERY handlers bridge back into the peer's run-loop.

mod communicate;
mod directory;
pub mod handlers;
mod interface;
mod message;
mod state;
pub mod telemetry;

pub use communicate::{drive_exchange, Communicate, ExchangeOutcome, Termination};
pub use directory::{AgentDirectory, Peer};
pub use handlers::{
    standard_interface, AcceptAllProposals, ModelJudgedProposals, ProposalPolicy, Verdict,
};
pub use interface::{CommunicationInterface, MessageHandler};
pub use message::{Message, MessagePayload, MessageType};
pub use state::CommunicationState;
