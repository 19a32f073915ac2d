//! Tests for builder modules

use std::time::Duration;

use prometheus_admission::builders::build_manager;
use prometheus_admission::config::SchedulerConfig;
use prometheus_admission::core::{
    AuditAction, BuildSetting, ResourceKind, ResourceRequirement, SchedulerError,
};
use prometheus_admission::infra::InMemoryAgentDirectory;

#[test]
fn test_build_manager_sizes_server_and_attaches_audit() {
    let cfg = SchedulerConfig {
        server: BuildSetting { cpu: 2, memory: 2 },
        audit_buffer: 8,
        ..SchedulerConfig::default()
    };
    let (manager, audit) = build_manager(&cfg, InMemoryAgentDirectory::<()>::new()).unwrap();
    assert_eq!(manager.snapshot().server.total(ResourceKind::Cpu), 2);

    manager
        .run_on_server(&ResourceRequirement::cpu_memory(1, 1), || Ok(()))
        .unwrap();
    let actions: Vec<_> = audit
        .unwrap()
        .lock()
        .events()
        .iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(actions, vec![AuditAction::Admitted, AuditAction::Released]);
}

#[test]
fn test_build_manager_without_audit() {
    let cfg = SchedulerConfig {
        server: BuildSetting { cpu: 2, memory: 2 },
        audit_buffer: 0,
        ..SchedulerConfig::default()
    };
    let (_, audit) = build_manager(&cfg, InMemoryAgentDirectory::<()>::new()).unwrap();
    assert!(audit.is_none());
}

#[test]
fn test_build_manager_applies_timeout() {
    let cfg = SchedulerConfig {
        server: BuildSetting { cpu: 2, memory: 2 },
        admission_timeout_secs: Some(1),
        audit_buffer: 16,
    };
    let (manager, audit) = build_manager(&cfg, InMemoryAgentDirectory::<()>::new()).unwrap();
    let err = manager
        .run_on_server(&ResourceRequirement::cpu_memory(3, 1), || Ok(()))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::AdmissionTimeout(d) if d == Duration::from_secs(1)));

    let actions: Vec<_> = audit
        .unwrap()
        .lock()
        .events()
        .iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(actions, vec![AuditAction::Waiting, AuditAction::Aborted]);
}

#[test]
fn test_build_manager_rejects_invalid_config() {
    let cfg = SchedulerConfig {
        server: BuildSetting { cpu: 0, memory: 2 },
        ..SchedulerConfig::default()
    };
    let err = build_manager(&cfg, InMemoryAgentDirectory::<()>::new())
        .err()
        .unwrap();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
}
