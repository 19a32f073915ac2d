//! Tests for the Tokio bridge: admission from async code runs on the
//! blocking pool and never stalls runtime workers.

#![cfg(feature = "tokio-runtime")]

use std::sync::Arc;
use std::time::Duration;

use prometheus_admission::core::{
    AgentCriteria, AgentRecord, BuildSetting, ResourceKind, ResourceManager, ResourceRequirement,
    SchedulerError,
};
use prometheus_admission::infra::InMemoryAgentDirectory;
use prometheus_admission::runtime::{run_on_agent_async, run_on_server_async};
use tokio_util::sync::CancellationToken;

fn manager() -> Arc<ResourceManager<InMemoryAgentDirectory<String>>> {
    Arc::new(ResourceManager::new(
        InMemoryAgentDirectory::new(),
        BuildSetting { cpu: 2, memory: 2 },
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_work_runs_on_blocking_pool() {
    let manager = manager();
    let value = run_on_server_async(
        Arc::clone(&manager),
        ResourceRequirement::cpu_memory(2, 2),
        CancellationToken::new(),
        || Ok(7),
    )
    .await
    .unwrap();
    assert_eq!(value, 7);
    assert_eq!(manager.snapshot().server.committed(ResourceKind::Cpu), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_agent_work_receives_session() {
    let manager = manager();
    manager.directory().connect(1, "ws-1".into());
    manager.on_agent_connected(AgentRecord::new(
        1,
        "agent-1",
        ResourceRequirement::cpu_memory(4, 4),
    ));

    let session = run_on_agent_async(
        Arc::clone(&manager),
        ResourceRequirement::new(),
        Arc::new(AgentCriteria::All),
        ResourceRequirement::cpu_memory(1, 1),
        CancellationToken::new(),
        |lease| Ok(lease.session),
    )
    .await
    .unwrap();
    assert_eq!(session, "ws-1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_while_waiting_from_async() {
    let manager = manager();
    let token = CancellationToken::new();
    let pending = tokio::spawn(run_on_server_async(
        Arc::clone(&manager),
        ResourceRequirement::cpu_memory(3, 1),
        token.clone(),
        || Ok(()),
    ));

    while manager.snapshot().waiters == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    manager.cancel(&token);

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(SchedulerError::Cancelled)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_future_stops_waiting() {
    let manager = manager();
    let caller_token = CancellationToken::new();

    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        run_on_server_async(
            Arc::clone(&manager),
            ResourceRequirement::cpu_memory(5, 1),
            caller_token.clone(),
            || Ok(()),
        ),
    )
    .await;
    assert!(outcome.is_err());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while manager.snapshot().waiters > 0 {
        assert!(tokio::time::Instant::now() < deadline, "abandoned request still waiting");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(manager.snapshot().server.committed(ResourceKind::Cpu), 0);
    assert!(!caller_token.is_cancelled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_completed_request_leaves_caller_token_alone() {
    let manager = manager();
    let caller_token = CancellationToken::new();
    run_on_server_async(
        Arc::clone(&manager),
        ResourceRequirement::cpu_memory(1, 1),
        caller_token.clone(),
        || Ok(()),
    )
    .await
    .unwrap();
    assert!(!caller_token.is_cancelled());
}
