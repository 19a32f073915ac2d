//! Blocking admission onto the server pool or onto connected agents.
//!
//! One `parking_lot::Mutex` guards every holder, the agent registry and the
//! live query caches; one `parking_lot::Condvar` parks requests that cannot
//! be admitted yet. Every state change that could satisfy some waiter
//! (release, agent connect, resize, unpause) wakes all of them, and each
//! re-evaluates its own predicate. There is no FIFO ordering among waiters.
//!
//! Work always runs outside the lock, and its capacity is returned by a drop
//! guard, so neither an error nor a panic in the work can leak capacity.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::agent::{AgentDirectory, AgentId, AgentQuery, AgentRecord};
use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::error::{AppResult, SchedulerError};
use crate::core::events::ResourceEvent;
use crate::core::query_cache::QueryCache;
use crate::core::requirement::ResourceRequirement;
use crate::core::resource_holder::ResourceHolder;
use crate::core::settings::{BuildSetting, SettingStore};

const SERVER_TARGET: &str = "server";

/// Longest a waiter sleeps before re-checking its cancellation token.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What agent-aware work receives once admitted.
#[derive(Debug)]
pub struct AgentLease<S> {
    /// The selected agent.
    pub agent_id: AgentId,
    /// Live handle to the agent, resolved at dispatch time.
    pub session: S,
    /// The agent record as it was when the agent was selected.
    pub agent: AgentRecord,
}

/// Read-only view of the scheduler's bookkeeping.
#[derive(Debug, Clone)]
pub struct CapacitySnapshot {
    /// Server holder.
    pub server: ResourceHolder,
    /// Holders of connected agents.
    pub agents: BTreeMap<AgentId, ResourceHolder>,
    /// Known pause flags, including those of disconnected agents.
    pub paused: BTreeMap<AgentId, bool>,
    /// Number of live request-scoped query caches.
    pub query_caches: usize,
    /// Number of requests currently parked on the condition variable.
    pub waiters: usize,
}

struct ConnectedAgent {
    record: AgentRecord,
    holder: ResourceHolder,
    generation: u64,
}

struct SchedulerState {
    server: ResourceHolder,
    agents: HashMap<AgentId, ConnectedAgent>,
    paused: HashMap<AgentId, bool>,
    query_caches: HashMap<Uuid, QueryCache>,
    next_generation: u64,
    waiters: usize,
    shutdown: bool,
}

struct Selection {
    agent_id: AgentId,
    generation: u64,
    record: AgentRecord,
}

impl SchedulerState {
    /// Pick the eligible matching agent with the most slack and commit both
    /// requirements. `None` if the server or every candidate is short.
    fn select_agent(
        &mut self,
        cache_id: Uuid,
        server_requirement: &ResourceRequirement,
        agent_requirement: &ResourceRequirement,
    ) -> Option<Selection> {
        if self.server.spare_score(server_requirement) == 0 {
            return None;
        }
        let cache = self.query_caches.get(&cache_id)?;

        let mut best: Option<(AgentId, u32)> = None;
        for &agent_id in cache.matching_ids() {
            let Some(agent) = self.agents.get(&agent_id) else {
                continue;
            };
            if self.paused.get(&agent_id).copied() != Some(false) {
                continue;
            }
            let score = agent.holder.spare_score(agent_requirement);
            if score > best.map_or(0, |(_, s)| s) {
                best = Some((agent_id, score));
            }
        }

        let (agent_id, _) = best?;
        let agent = self.agents.get_mut(&agent_id)?;
        agent.holder.acquire(agent_requirement);
        self.server.acquire(server_requirement);
        Some(Selection {
            agent_id,
            generation: agent.generation,
            record: agent.record.clone(),
        })
    }
}

/// Coordinates admission of work onto the server and onto agents.
pub struct ResourceManager<D: AgentDirectory> {
    directory: D,
    state: Mutex<SchedulerState>,
    /// Signaled (broadcast) on every state change that may admit a waiter.
    wake: Condvar,
    admission_timeout: Option<Duration>,
    audit: Option<Mutex<Box<dyn AuditSink>>>,
}

impl<D: AgentDirectory> ResourceManager<D> {
    /// Create a manager whose server holder offers `server_capacity`.
    pub fn new(directory: D, server_capacity: BuildSetting) -> Self {
        Self {
            directory,
            state: Mutex::new(SchedulerState {
                server: ResourceHolder::new(&server_capacity.capacity()),
                agents: HashMap::new(),
                paused: HashMap::new(),
                query_caches: HashMap::new(),
                next_generation: 0,
                waiters: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
            admission_timeout: None,
            audit: None,
        }
    }

    /// Fail waits that last longer than `timeout`. `None` waits forever.
    #[must_use]
    pub fn with_admission_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.admission_timeout = timeout;
        self
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Mutex::new(audit));
        self
    }

    /// The agent directory this manager dispatches through.
    pub const fn directory(&self) -> &D {
        &self.directory
    }

    /// Size the server holder from `settings` and load every known agent's
    /// pause flag from the directory.
    pub fn start(&self, settings: &dyn SettingStore) {
        let setting = settings.build_setting();
        let paused = self.directory.paused_flags();
        {
            let mut state = self.state.lock();
            for (kind, total) in setting.totals() {
                state.server.update_total(kind, total);
            }
            state.paused.extend(paused);
        }
        self.wake.notify_all();
        info!(
            cpu = setting.cpu,
            memory = setting.memory,
            "resource manager started"
        );
    }

    /// Run `work` once `requirement` fits on the server.
    ///
    /// Blocks until admitted. Capacity is committed before `work` runs and
    /// returned after it finishes, whatever the outcome.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Work`] carries the error returned by `work`;
    /// [`SchedulerError::Shutdown`] and [`SchedulerError::AdmissionTimeout`]
    /// mean the work never ran.
    pub fn run_on_server<T, F>(
        &self,
        requirement: &ResourceRequirement,
        work: F,
    ) -> Result<T, SchedulerError>
    where
        F: FnOnce() -> AppResult<T>,
    {
        self.run_on_server_cancellable(requirement, &CancellationToken::new(), work)
    }

    /// [`run_on_server`](Self::run_on_server) whose wait ends once `cancel`
    /// is cancelled, directly or through [`cancel`](Self::cancel).
    ///
    /// # Errors
    ///
    /// As for `run_on_server`, plus [`SchedulerError::Cancelled`].
    pub fn run_on_server_cancellable<T, F>(
        &self,
        requirement: &ResourceRequirement,
        cancel: &CancellationToken,
        work: F,
    ) -> Result<T, SchedulerError>
    where
        F: FnOnce() -> AppResult<T>,
    {
        {
            let mut state = self.state.lock();
            let admitted =
                self.wait_for_admission(&mut state, cancel, SERVER_TARGET, requirement, |s| {
                    (s.server.spare_score(requirement) > 0).then(|| s.server.acquire(requirement))
                });
            if let Err(e) = admitted {
                drop(state);
                self.record_audit(SERVER_TARGET, AuditAction::Aborted, Some(requirement));
                return Err(e);
            }
        }

        let _lease = ServerLeaseGuard {
            manager: self,
            requirement,
        };
        debug!(requirement = %requirement, "admitted on server");
        self.record_audit(SERVER_TARGET, AuditAction::Admitted, Some(requirement));
        work().map_err(SchedulerError::Work)
    }

    /// Run `work` on the matching agent with the most slack.
    ///
    /// An agent is eligible when it matches `query`, is connected, is known
    /// to be unpaused and can hold `agent_requirement`, and the server can
    /// hold `server_requirement` at the same time.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::AgentUnavailable`] if the selected agent has no live
    /// session at dispatch time; otherwise as for
    /// [`run_on_server`](Self::run_on_server).
    pub fn run_on_agent<T, F>(
        &self,
        server_requirement: &ResourceRequirement,
        query: Arc<dyn AgentQuery>,
        agent_requirement: &ResourceRequirement,
        work: F,
    ) -> Result<T, SchedulerError>
    where
        F: FnOnce(AgentLease<D::Session>) -> AppResult<T>,
    {
        self.run_on_agent_cancellable(
            server_requirement,
            query,
            agent_requirement,
            &CancellationToken::new(),
            work,
        )
    }

    /// [`run_on_agent`](Self::run_on_agent) whose wait can be cancelled
    /// through `cancel`.
    ///
    /// # Errors
    ///
    /// As for `run_on_agent`, plus [`SchedulerError::Cancelled`].
    pub fn run_on_agent_cancellable<T, F>(
        &self,
        server_requirement: &ResourceRequirement,
        query: Arc<dyn AgentQuery>,
        agent_requirement: &ResourceRequirement,
        cancel: &CancellationToken,
        work: F,
    ) -> Result<T, SchedulerError>
    where
        F: FnOnce(AgentLease<D::Session>) -> AppResult<T>,
    {
        let selection = {
            let mut state = self.state.lock();
            let cache_id = Uuid::new_v4();
            let cache = QueryCache::new(query, state.agents.values().map(|a| &a.record));
            state.query_caches.insert(cache_id, cache);

            let selected = self.wait_for_admission(
                &mut state,
                cancel,
                "agent",
                agent_requirement,
                |s| s.select_agent(cache_id, server_requirement, agent_requirement),
            );
            state.query_caches.remove(&cache_id);
            drop(state);

            match selected {
                Ok(selection) => selection,
                Err(e) => {
                    self.record_audit("agent", AuditAction::Aborted, Some(agent_requirement));
                    return Err(e);
                }
            }
        };

        let agent_id = selection.agent_id;
        let target = format!("agent:{agent_id}");
        let _lease = AgentLeaseGuard {
            manager: self,
            agent_id,
            generation: selection.generation,
            server_requirement,
            agent_requirement,
        };
        debug!(agent_id, requirement = %agent_requirement, "admitted on agent");

        let Some(session) = self.directory.session(agent_id) else {
            warn!(agent_id, "selected agent went offline before dispatch");
            self.record_audit(&target, AuditAction::DispatchFailed, Some(agent_requirement));
            return Err(SchedulerError::AgentUnavailable(agent_id));
        };

        self.record_audit(&target, AuditAction::Admitted, Some(agent_requirement));
        work(AgentLease {
            agent_id,
            session,
            agent: selection.record,
        })
        .map_err(SchedulerError::Work)
    }

    /// Apply one externally delivered event.
    pub fn apply(&self, event: ResourceEvent) {
        match event {
            ResourceEvent::AgentConnected(agent) => self.on_agent_connected(agent),
            ResourceEvent::AgentDisconnected(agent_id) => self.on_agent_disconnected(agent_id),
            ResourceEvent::AgentPauseChanged { agent_id, paused } => {
                self.on_agent_pause_changed(agent_id, paused);
            }
            ResourceEvent::AgentRemoved(agent_id) => self.on_agent_removed(agent_id),
            ResourceEvent::BuildSettingChanged(setting) => self.on_build_setting_changed(setting),
        }
    }

    /// Register a newly connected agent and offer it to pending requests.
    pub fn on_agent_connected(&self, agent: AgentRecord) {
        let agent_id = agent.id;
        {
            let mut state = self.state.lock();
            state.next_generation += 1;
            let generation = state.next_generation;
            state.paused.entry(agent_id).or_insert(false);
            for cache in state.query_caches.values_mut() {
                cache.on_agent_disconnected(agent_id);
                cache.on_agent_connected(&agent);
            }
            let replaced = state.agents.insert(
                agent_id,
                ConnectedAgent {
                    holder: ResourceHolder::new(&agent.resources),
                    record: agent,
                    generation,
                },
            );
            if replaced.is_some() {
                warn!(agent_id, "agent reconnected without disconnect; holder reset");
            }
        }
        self.wake.notify_all();
        info!(agent_id, "agent connected");
    }

    /// Drop a disconnected agent's holder and withdraw it from pending requests.
    pub fn on_agent_disconnected(&self, agent_id: AgentId) {
        {
            let mut state = self.state.lock();
            state.agents.remove(&agent_id);
            for cache in state.query_caches.values_mut() {
                cache.on_agent_disconnected(agent_id);
            }
        }
        self.wake.notify_all();
        info!(agent_id, "agent disconnected");
    }

    /// Record an agent's pause flag.
    pub fn on_agent_pause_changed(&self, agent_id: AgentId, paused: bool) {
        self.state.lock().paused.insert(agent_id, paused);
        self.wake.notify_all();
        debug!(agent_id, paused, "agent pause flag changed");
    }

    /// Forget a deleted agent's pause flag.
    pub fn on_agent_removed(&self, agent_id: AgentId) {
        self.state.lock().paused.remove(&agent_id);
        self.wake.notify_all();
        debug!(agent_id, "agent removed");
    }

    /// Resize the server holder in place; commitments are kept.
    pub fn on_build_setting_changed(&self, setting: BuildSetting) {
        {
            let mut state = self.state.lock();
            for (kind, total) in setting.totals() {
                state.server.update_total(kind, total);
            }
        }
        self.wake.notify_all();
        info!(cpu = setting.cpu, memory = setting.memory, "server capacity changed");
    }

    /// Cancel `token` and wake waiters so a request waiting on it returns
    /// [`SchedulerError::Cancelled`] at once. A token cancelled directly is
    /// noticed within one poll interval (50 ms).
    pub fn cancel(&self, token: &CancellationToken) {
        let _state = self.state.lock();
        token.cancel();
        self.wake.notify_all();
    }

    /// Abort every current and future wait with [`SchedulerError::Shutdown`].
    /// Work that is already running is unaffected.
    pub fn shutdown(&self) {
        let waiters = {
            let mut state = self.state.lock();
            state.shutdown = true;
            state.waiters
        };
        self.wake.notify_all();
        info!(waiters, "resource manager shut down");
    }

    /// Copy of the current bookkeeping.
    pub fn snapshot(&self) -> CapacitySnapshot {
        let state = self.state.lock();
        CapacitySnapshot {
            server: state.server.clone(),
            agents: state
                .agents
                .iter()
                .map(|(id, agent)| (*id, agent.holder.clone()))
                .collect(),
            paused: state.paused.iter().map(|(id, p)| (*id, *p)).collect(),
            query_caches: state.query_caches.len(),
            waiters: state.waiters,
        }
    }

    /// Park until `try_admit` succeeds, the token is cancelled, the manager
    /// shuts down or the admission deadline passes.
    fn wait_for_admission<R>(
        &self,
        state: &mut MutexGuard<'_, SchedulerState>,
        cancel: &CancellationToken,
        pool: &str,
        requirement: &ResourceRequirement,
        mut try_admit: impl FnMut(&mut SchedulerState) -> Option<R>,
    ) -> Result<R, SchedulerError> {
        let deadline = self
            .admission_timeout
            .map(|timeout| (timeout, Instant::now() + timeout));
        let mut announced = false;
        loop {
            if state.shutdown {
                return Err(SchedulerError::Shutdown);
            }
            if cancel.is_cancelled() {
                return Err(SchedulerError::Cancelled);
            }
            if let Some(admitted) = try_admit(&mut **state) {
                return Ok(admitted);
            }
            let now = Instant::now();
            if let Some((timeout, at)) = deadline {
                if now >= at {
                    warn!(pool, ?timeout, "admission deadline elapsed");
                    return Err(SchedulerError::AdmissionTimeout(timeout));
                }
            }
            if !announced {
                info!(pool, requirement = %requirement, "waiting for resources");
                self.record_audit(pool, AuditAction::Waiting, Some(requirement));
                announced = true;
            }

            // Tokens cancelled without going through `cancel` never signal
            // the condvar, so no single wait may outlast one poll interval.
            let slice_end = now + CANCEL_POLL_INTERVAL;
            let wake_at = deadline.map_or(slice_end, |(_, at)| at.min(slice_end));
            state.waiters += 1;
            self.wake.wait_until(state, wake_at);
            state.waiters -= 1;
        }
    }

    fn record_audit(
        &self,
        target: &str,
        action: AuditAction,
        requirement: Option<&ResourceRequirement>,
    ) {
        if let Some(audit) = &self.audit {
            audit
                .lock()
                .record(build_audit_event(target, action, requirement));
        }
    }
}

/// Returns server capacity when admitted work ends.
struct ServerLeaseGuard<'a, D: AgentDirectory> {
    manager: &'a ResourceManager<D>,
    requirement: &'a ResourceRequirement,
}

impl<D: AgentDirectory> Drop for ServerLeaseGuard<'_, D> {
    fn drop(&mut self) {
        self.manager.state.lock().server.release(self.requirement);
        self.manager.wake.notify_all();
        self.manager
            .record_audit(SERVER_TARGET, AuditAction::Released, Some(self.requirement));
    }
}

/// Returns server and agent capacity when agent work ends or fails to
/// dispatch. Agent capacity goes back only to the connection it came from.
struct AgentLeaseGuard<'a, D: AgentDirectory> {
    manager: &'a ResourceManager<D>,
    agent_id: AgentId,
    generation: u64,
    server_requirement: &'a ResourceRequirement,
    agent_requirement: &'a ResourceRequirement,
}

impl<D: AgentDirectory> Drop for AgentLeaseGuard<'_, D> {
    fn drop(&mut self) {
        {
            let mut state = self.manager.state.lock();
            state.server.release(self.server_requirement);
            match state.agents.get_mut(&self.agent_id) {
                Some(agent) if agent.generation == self.generation => {
                    agent.holder.release(self.agent_requirement);
                }
                _ => debug!(
                    agent_id = self.agent_id,
                    "agent connection gone; its holder was discarded"
                ),
            }
        }
        self.manager.wake.notify_all();
        self.manager.record_audit(
            &format!("agent:{}", self.agent_id),
            AuditAction::Released,
            Some(self.agent_requirement),
        );
    }
}
