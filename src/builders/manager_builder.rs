//! Builder to construct a resource manager from configuration.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::SchedulerConfig;
use crate::core::{
    AgentDirectory, AuditEvent, AuditSink, InMemoryAuditSink, ResourceManager, SchedulerError,
};

/// Shared handle to the in-memory audit ring attached by [`build_manager`].
pub type AuditLog = Arc<Mutex<InMemoryAuditSink>>;

impl AuditSink for AuditLog {
    fn record(&mut self, event: AuditEvent) {
        self.lock().record(event);
    }
}

/// Build a resource manager from configuration.
///
/// Returns the manager and, when `audit_buffer > 0`, a handle to the audit
/// ring it records into.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidConfig`] if `cfg` fails validation.
pub fn build_manager<D: AgentDirectory>(
    cfg: &SchedulerConfig,
    directory: D,
) -> Result<(ResourceManager<D>, Option<AuditLog>), SchedulerError> {
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;

    let mut manager = ResourceManager::new(directory, cfg.server)
        .with_admission_timeout(cfg.admission_timeout());

    let audit: Option<AuditLog> = (cfg.audit_buffer > 0)
        .then(|| Arc::new(Mutex::new(InMemoryAuditSink::new(cfg.audit_buffer))));
    if let Some(log) = &audit {
        manager = manager.with_audit(Box::new(Arc::clone(log)));
    }

    tracing::info!(
        cpu = cfg.server.cpu,
        memory = cfg.server.memory,
        timeout_secs = ?cfg.admission_timeout_secs,
        audit_buffer = cfg.audit_buffer,
        "resource manager built"
    );
    Ok((manager, audit))
}
