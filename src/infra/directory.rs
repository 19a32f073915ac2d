//! In-memory agent directory for development and testing.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::core::agent::{AgentDirectory, AgentId};

/// Agent directory backed by process-local maps.
///
/// Sessions are cloned out on lookup, so `S` is typically a cheap handle
/// such as an `Arc` or a channel sender.
pub struct InMemoryAgentDirectory<S> {
    sessions: RwLock<HashMap<AgentId, S>>,
    paused: RwLock<HashMap<AgentId, bool>>,
}

impl<S> InMemoryAgentDirectory<S> {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            paused: RwLock::new(HashMap::new()),
        }
    }

    /// Make `agent_id` reachable through `session`.
    pub fn connect(&self, agent_id: AgentId, session: S) {
        self.sessions.write().insert(agent_id, session);
    }

    /// Make `agent_id` unreachable.
    pub fn disconnect(&self, agent_id: AgentId) {
        self.sessions.write().remove(&agent_id);
    }

    /// Persist a pause flag.
    pub fn set_paused(&self, agent_id: AgentId, paused: bool) {
        self.paused.write().insert(agent_id, paused);
    }
}

impl<S> Default for InMemoryAgentDirectory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> AgentDirectory for InMemoryAgentDirectory<S>
where
    S: Clone + Send + Sync,
{
    type Session = S;

    fn session(&self, agent_id: AgentId) -> Option<S> {
        self.sessions.read().get(&agent_id).cloned()
    }

    fn paused_flags(&self) -> Vec<(AgentId, bool)> {
        self.paused.read().iter().map(|(id, p)| (*id, *p)).collect()
    }
}
