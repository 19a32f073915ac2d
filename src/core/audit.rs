//! Audit trail of admission decisions.

use std::collections::VecDeque;

use crate::core::requirement::ResourceRequirement;
use crate::util::clock::now_ms;

/// What happened to an admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// The request found no capacity and started waiting.
    Waiting,
    /// Capacity was committed and the work is about to run.
    Admitted,
    /// The work finished and its capacity was returned.
    Released,
    /// The chosen agent was unreachable when work was handed over.
    DispatchFailed,
    /// The wait ended without admission (cancel, shutdown or deadline).
    Aborted,
}

impl AuditAction {
    /// Lowercase action name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Admitted => "admitted",
            Self::Released => "released",
            Self::DispatchFailed => "dispatch_failed",
            Self::Aborted => "aborted",
        }
    }
}

/// Audit event structure.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// `server` or `agent:<id>`.
    pub target: String,
    /// Action taken.
    pub action: AuditAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Requirement involved, as JSON.
    pub payload: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Helper to build an audit event for a requirement.
pub fn build_audit_event(
    target: impl Into<String>,
    action: AuditAction,
    requirement: Option<&ResourceRequirement>,
) -> AuditEvent {
    AuditEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        target: target.into(),
        action,
        created_at_ms: now_ms(),
        payload: requirement.and_then(|r| serde_json::to_string(r).ok()),
    }
}
