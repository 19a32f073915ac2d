//! Request-scoped cache of agents matching a filter.

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::agent::{AgentId, AgentQuery, AgentRecord};

/// Agents currently connected and matching one pending request's filter.
///
/// Seeded from a single scan when the request starts and then kept current
/// by connect/disconnect callbacks, so a blocked request never re-evaluates
/// its filter against every agent on wakeup.
pub struct QueryCache {
    query: Arc<dyn AgentQuery>,
    matching: HashSet<AgentId>,
}

impl QueryCache {
    /// Seed a cache by evaluating `query` once over `connected`.
    pub fn new<'a>(
        query: Arc<dyn AgentQuery>,
        connected: impl IntoIterator<Item = &'a AgentRecord>,
    ) -> Self {
        let matching = connected
            .into_iter()
            .filter(|agent| query.matches(agent))
            .map(|agent| agent.id)
            .collect();
        Self { query, matching }
    }

    /// Track `agent` if it matches the filter.
    pub fn on_agent_connected(&mut self, agent: &AgentRecord) {
        if self.query.matches(agent) {
            self.matching.insert(agent.id);
        }
    }

    /// Stop tracking `agent_id`.
    pub fn on_agent_disconnected(&mut self, agent_id: AgentId) {
        self.matching.remove(&agent_id);
    }

    /// Whether `agent_id` is in the match set.
    #[must_use]
    pub fn contains(&self, agent_id: AgentId) -> bool {
        self.matching.contains(&agent_id)
    }

    /// Current match set.
    #[must_use]
    pub const fn matching_ids(&self) -> &HashSet<AgentId> {
        &self.matching
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("matching", &self.matching)
            .finish_non_exhaustive()
    }
}
