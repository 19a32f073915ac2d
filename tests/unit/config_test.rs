//! Tests for configuration validation

use std::time::Duration;

use prometheus_admission::config::SchedulerConfig;
use prometheus_admission::core::BuildSetting;

fn config(cpu: u32, memory: u32) -> SchedulerConfig {
    SchedulerConfig {
        server: BuildSetting { cpu, memory },
        ..SchedulerConfig::default()
    }
}

#[test]
fn test_default_config_is_valid() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.admission_timeout(), None);
    assert_eq!(cfg.audit_buffer, 1024);
}

#[test]
fn test_zero_capacity_rejected() {
    assert!(config(0, 1024).validate().is_err());
    assert!(config(1000, 0).validate().is_err());
}

#[test]
fn test_zero_timeout_rejected() {
    let cfg = SchedulerConfig {
        admission_timeout_secs: Some(0),
        ..config(1000, 1024)
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "server": { "cpu": 8000, "memory": 16384 },
        "admission_timeout_secs": 30
    }"#;

    let cfg = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.server, BuildSetting { cpu: 8000, memory: 16384 });
    assert_eq!(cfg.admission_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(cfg.audit_buffer, 1024);
}

#[test]
fn test_scheduler_config_from_bad_json() {
    let err = SchedulerConfig::from_json_str(r#"{ "server": { "cpu": "lots" } }"#).unwrap_err();
    assert!(err.starts_with("parse error"));

    let err = SchedulerConfig::from_json_str(r#"{ "server": { "cpu": 0, "memory": 1 } }"#)
        .unwrap_err();
    assert!(err.contains("cpu"));
}
