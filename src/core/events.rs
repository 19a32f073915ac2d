//! Event intake for the resource manager.
//!
//! Connect/disconnect, pause and capacity notifications arrive on a
//! `crossbeam-channel` and are applied by one dedicated thread, so events
//! are applied in the order they were sent.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::agent::{AgentDirectory, AgentId, AgentRecord};
use crate::core::error::SchedulerError;
use crate::core::resource_manager::ResourceManager;
use crate::core::settings::BuildSetting;

/// A change the scheduler must observe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceEvent {
    /// An agent connected, advertising its capacity.
    AgentConnected(AgentRecord),
    /// An agent's connection went away.
    AgentDisconnected(AgentId),
    /// An agent's pause flag was saved.
    AgentPauseChanged {
        /// Agent identifier.
        agent_id: AgentId,
        /// New pause flag.
        paused: bool,
    },
    /// An agent was deleted.
    AgentRemoved(AgentId),
    /// The server build capacity setting was saved.
    BuildSettingChanged(BuildSetting),
}

/// Apply every event received on `events` to `manager`, on a dedicated
/// thread. The thread exits once all senders are dropped.
///
/// # Errors
///
/// Returns [`SchedulerError::Io`] if the thread cannot be spawned.
pub fn spawn_event_listener<D>(
    manager: Arc<ResourceManager<D>>,
    events: Receiver<ResourceEvent>,
) -> Result<JoinHandle<()>, SchedulerError>
where
    D: AgentDirectory + 'static,
{
    let handle = thread::Builder::new()
        .name("admission-events".into())
        .spawn(move || {
            debug!("event listener started");
            for event in &events {
                debug!(?event, "applying resource event");
                manager.apply(event);
            }
            debug!("event channel closed, listener exiting");
        })?;
    Ok(handle)
}
