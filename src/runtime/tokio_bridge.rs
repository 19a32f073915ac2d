//! Tokio bridge for blocking admission.
//!
//! Admission parks the calling thread on a condition variable, so async
//! callers must not call it on a runtime worker. These helpers move the
//! whole admit-run-release cycle onto Tokio's blocking pool.
//!
//! Each request waits on a child of the caller's token. Dropping the
//! returned future (timeout, `select!`, task abort) cancels that child, so
//! a request nobody awaits any more stops waiting instead of being admitted
//! later. The caller's own token is never cancelled by the bridge.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::{
    AgentDirectory, AgentLease, AgentQuery, AppResult, ResourceManager, ResourceRequirement,
    SchedulerError,
};

/// Async form of [`ResourceManager::run_on_server_cancellable`].
///
/// # Errors
///
/// As for the blocking call. A panic in `work` is resumed on the caller.
pub async fn run_on_server_async<D, T, F>(
    manager: Arc<ResourceManager<D>>,
    requirement: ResourceRequirement,
    cancel: CancellationToken,
    work: F,
) -> Result<T, SchedulerError>
where
    D: AgentDirectory + 'static,
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    let request = cancel.child_token();
    let _abandon = request.clone().drop_guard();
    let joined = tokio::task::spawn_blocking(move || {
        manager.run_on_server_cancellable(&requirement, &request, work)
    })
    .await;
    flatten(joined)
}

/// Async form of [`ResourceManager::run_on_agent_cancellable`].
///
/// # Errors
///
/// As for the blocking call. A panic in `work` is resumed on the caller.
pub async fn run_on_agent_async<D, T, F>(
    manager: Arc<ResourceManager<D>>,
    server_requirement: ResourceRequirement,
    query: Arc<dyn AgentQuery>,
    agent_requirement: ResourceRequirement,
    cancel: CancellationToken,
    work: F,
) -> Result<T, SchedulerError>
where
    D: AgentDirectory + 'static,
    T: Send + 'static,
    F: FnOnce(AgentLease<D::Session>) -> AppResult<T> + Send + 'static,
{
    let request = cancel.child_token();
    let _abandon = request.clone().drop_guard();
    let joined = tokio::task::spawn_blocking(move || {
        manager.run_on_agent_cancellable(
            &server_requirement,
            query,
            &agent_requirement,
            &request,
            work,
        )
    })
    .await;
    flatten(joined)
}

fn flatten<T>(
    joined: Result<Result<T, SchedulerError>, tokio::task::JoinError>,
) -> Result<T, SchedulerError> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(SchedulerError::Cancelled),
    }
}
