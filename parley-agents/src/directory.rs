//! In-process relay: name → profile and interface.

use crate::interface::CommunicationInterface;
use parley_core::{AgentProfile, ParleyResult, ProtocolError};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A registered participant.
#[derive(Debug, Clone)]
pub struct Peer {
    pub profile: AgentProfile,
    pub interface: Arc<CommunicationInterface>,
}

/// Agents reachable by name within one process.
#[derive(Debug, Default)]
pub struct AgentDirectory {
    peers: RwLock<HashMap<String, Peer>>,
}

impl AgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the peer named by `profile.name`.
    pub fn register(&self, profile: AgentProfile, interface: CommunicationInterface) {
        let name = profile.name.clone();
        let peer = Peer {
            profile,
            interface: Arc::new(interface),
        };
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), peer);
        tracing::debug!(agent = %name, "Registered agent in directory");
    }

    pub fn unregister(&self, name: &str) -> Option<Peer> {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn peer(&self, name: &str) -> ParleyResult<Peer> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| {
                ProtocolError::UnknownAgent {
                    agent: name.to_string(),
                }
                .into()
            })
    }

    pub fn interface(&self, name: &str) -> ParleyResult<Arc<CommunicationInterface>> {
        self.peer(name).map(|p| p.interface)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
