//! Tests for utility functions and shared value types

use prometheus_admission::core::{BuildSetting, ResourceHolder, ResourceKind, ResourceRequirement};
use prometheus_admission::util::{init_tracing, now_ms};

#[test]
fn test_now_ms_is_monotonic_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(a > 0);
    assert!(b >= a);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}

#[test]
fn test_build_setting_capacity() {
    let setting = BuildSetting { cpu: 4000, memory: 8192 };
    let holder = ResourceHolder::new(&setting.capacity());
    assert_eq!(holder.total(ResourceKind::Cpu), 4000);
    assert_eq!(holder.total(ResourceKind::Memory), 8192);
    assert_eq!(holder.spare_score(&ResourceRequirement::cpu_memory(1000, 1024)), 4000);
}

#[test]
fn test_requirement_display_lists_dimensions() {
    let req = ResourceRequirement::new().with(ResourceKind::Memory, 512);
    assert_eq!(req.to_string(), "memory=512");
    assert_eq!(req.get(ResourceKind::Cpu), 0);
}
