//! Tests for error types

use std::time::Duration;

use prometheus_admission::core::SchedulerError;

#[test]
fn test_agent_unavailable_message() {
    let err = SchedulerError::AgentUnavailable(12);
    assert_eq!(format!("{err}"), "agent 12 went offline");
    assert!(!err.is_aborted());
}

#[test]
fn test_abort_kinds() {
    assert!(SchedulerError::Cancelled.is_aborted());
    assert!(SchedulerError::Shutdown.is_aborted());
    assert!(SchedulerError::AdmissionTimeout(Duration::from_secs(1)).is_aborted());
    assert!(!SchedulerError::InvalidConfig("x".into()).is_aborted());
}

#[test]
fn test_work_error_is_transparent() {
    let err = SchedulerError::Work(anyhow::anyhow!("exit code 1"));
    assert_eq!(err.to_string(), "exit code 1");
}

#[test]
fn test_io_error_converts() {
    let io = std::io::Error::other("spawn failed");
    let err: SchedulerError = io.into();
    assert!(matches!(err, SchedulerError::Io(_)));
    assert_eq!(err.to_string(), "io error: spawn failed");
}

#[test]
fn test_reserved_attribute_message() {
    let err = SchedulerError::ReservedAttribute("Name".into());
    assert_eq!(err.to_string(), "'Name' is reserved");
}
