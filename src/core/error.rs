//! Error types for admission and event intake.

use std::time::Duration;

use thiserror::Error;

use crate::core::agent::AgentId;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The admission wait was cancelled before any resource was acquired.
    #[error("admission cancelled while waiting for resources")]
    Cancelled,
    /// The resource manager was shut down before the request was admitted.
    #[error("resource manager shut down")]
    Shutdown,
    /// The configured admission deadline elapsed before capacity was found.
    #[error("no capacity became available within {0:?}")]
    AdmissionTimeout(Duration),
    /// The selected agent was no longer reachable when work was handed to it.
    #[error("agent {0} went offline")]
    AgentUnavailable(AgentId),
    /// An agent attribute name collides with a built-in agent field.
    #[error("'{0}' is reserved")]
    ReservedAttribute(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// OS-level failure, e.g. the event listener thread could not be spawned.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The admitted unit of work failed; the error is carried unchanged.
    #[error(transparent)]
    Work(anyhow::Error),
}

impl SchedulerError {
    /// True when the request never got admitted (cancel, shutdown or deadline),
    /// as opposed to being admitted and then failing.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Shutdown | Self::AdmissionTimeout(_)
        )
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
