//! Tests for audit sink

use prometheus_admission::core::{
    build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, ResourceRequirement,
};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    let req = ResourceRequirement::cpu_memory(2, 4);

    sink.record(build_audit_event("server", AuditAction::Admitted, Some(&req)));
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].target, "server");
    assert_eq!(events[0].action, AuditAction::Admitted);
    assert_eq!(events[0].payload.as_deref(), Some(r#"{"cpu":2,"memory":4}"#));
    assert!(events[0].created_at_ms > 0);
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);
    for target in ["agent:1", "agent:2", "agent:3"] {
        sink.record(build_audit_event(target, AuditAction::Waiting, None));
    }

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].target, "agent:2");
    assert_eq!(events[1].target, "agent:3");
}

#[test]
fn test_zero_capacity_sink_records_nothing() {
    let mut sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event("server", AuditAction::Released, None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_event_ids_are_unique() {
    let a = build_audit_event("server", AuditAction::Aborted, None);
    let b = build_audit_event("server", AuditAction::Aborted, None);
    assert_ne!(a.event_id, b.event_id);
    assert_eq!(a.action.as_str(), "aborted");
    assert_eq!(AuditAction::DispatchFailed.as_str(), "dispatch_failed");
}
