//! Per-job execution handle.
//!
//! A [`JobContext`] exists from dispatch until the job finishes. It reports
//! the job's combined resource requirement to the scheduler, keeps the job's
//! cache bookkeeping, and owns a registry of cancellation tokens for steps
//! running in-process on the server, all triggered by
//! [`JobContext::on_job_finished`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::agent::AgentId;
use crate::core::error::AppResult;
use crate::core::requirement::ResourceRequirement;

/// A service container started alongside the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Service name.
    pub name: String,
    /// CPU in millicores.
    pub cpu_requirement: u32,
    /// Memory in megabytes.
    pub memory_requirement: u32,
}

/// A directory cached between builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSpec {
    /// Cache key.
    pub key: String,
    /// Path inside the job workspace.
    pub path: String,
}

/// One executable step of the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Step name.
    pub name: String,
    /// Position of the step in the step tree.
    pub position: Vec<usize>,
}

/// Everything known about a job when it is dispatched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Owning project.
    pub project_name: String,
    /// Build number within the project.
    pub build_number: u64,
    /// Location of the project's git repository on the server.
    pub project_git_dir: PathBuf,
    /// Commit being built.
    pub commit_id: String,
    /// Steps to execute.
    pub actions: Vec<Action>,
    /// CPU for the job itself, in millicores.
    pub cpu_requirement: u32,
    /// Memory for the job itself, in megabytes.
    pub memory_requirement: u32,
    /// Attached services.
    pub services: Vec<Service>,
    /// Caches the job may use.
    pub cache_specs: Vec<CacheSpec>,
    /// Days an unused cache is kept.
    pub cache_ttl_days: u32,
    /// How many times this job has been retried.
    pub retried: u32,
}

/// A server step invocation.
#[derive(Debug, Clone, Default)]
pub struct ServerStep {
    /// Position of the step in the step tree.
    pub position: Vec<usize>,
    /// Directory holding files passed to and from the step.
    pub files_dir: PathBuf,
    /// Values substituted into the step definition.
    pub placeholder_values: HashMap<String, String>,
}

/// Pipeline-side behaviour a [`JobContext`] delegates to.
pub trait JobHooks: Send + Sync {
    /// The job started running, on `agent_id` or on the server if `None`.
    fn notify_job_running(&self, agent_id: Option<AgentId>);

    /// The executor chose `workspace` as the job workspace.
    fn report_job_workspace(&self, workspace: &str);

    /// Execute one server step. Implementations must check `cancel`
    /// regularly and return early once it is cancelled.
    ///
    /// # Errors
    ///
    /// Any failure of the step.
    fn run_server_step(
        &self,
        step: &ServerStep,
        cancel: &CancellationToken,
    ) -> AppResult<HashMap<String, Vec<u8>>>;

    /// Copy the job's dependency artifacts into `target_dir`.
    ///
    /// # Errors
    ///
    /// Any I/O failure while copying.
    fn copy_dependencies(&self, target_dir: &Path) -> AppResult<()>;
}

#[derive(Debug, Default)]
struct CacheBook {
    allocated: HashSet<String>,
    counts: HashMap<String, u32>,
}

/// Per-job execution handle.
pub struct JobContext {
    descriptor: JobDescriptor,
    hooks: Arc<dyn JobHooks>,
    caches: Mutex<CacheBook>,
    step_tokens: Mutex<HashMap<u64, CancellationToken>>,
    next_step: AtomicU64,
    job_token: CancellationToken,
}

impl JobContext {
    /// Create the context for a dispatched job.
    pub fn new(descriptor: JobDescriptor, hooks: Arc<dyn JobHooks>) -> Self {
        Self {
            descriptor,
            hooks,
            caches: Mutex::new(CacheBook::default()),
            step_tokens: Mutex::new(HashMap::new()),
            next_step: AtomicU64::new(0),
            job_token: CancellationToken::new(),
        }
    }

    /// Job metadata.
    pub const fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    /// Own cpu/memory plus that of every attached service.
    pub fn resource_requirement(&self) -> ResourceRequirement {
        let (cpu, memory) = self.descriptor.services.iter().fold(
            (
                self.descriptor.cpu_requirement,
                self.descriptor.memory_requirement,
            ),
            |(cpu, memory), service| {
                (
                    cpu.saturating_add(service.cpu_requirement),
                    memory.saturating_add(service.memory_requirement),
                )
            },
        );
        ResourceRequirement::cpu_memory(cpu, memory)
    }

    /// Token cancelled when the job finishes. Pass it to the scheduler's
    /// cancellable admission calls so an aborted job stops waiting.
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.job_token
    }

    /// Forward to [`JobHooks::notify_job_running`].
    pub fn notify_job_running(&self, agent_id: Option<AgentId>) {
        self.hooks.notify_job_running(agent_id);
    }

    /// Forward to [`JobHooks::report_job_workspace`].
    pub fn report_job_workspace(&self, workspace: &str) {
        self.hooks.report_job_workspace(workspace);
    }

    /// Forward to [`JobHooks::copy_dependencies`].
    ///
    /// # Errors
    ///
    /// Whatever the hook returns.
    pub fn copy_dependencies(&self, target_dir: &Path) -> AppResult<()> {
        self.hooks.copy_dependencies(target_dir)
    }

    /// Run a step in-process, registered for cancellation while it runs.
    ///
    /// # Errors
    ///
    /// Whatever the step returns.
    pub fn run_server_step(&self, step: &ServerStep) -> AppResult<HashMap<String, Vec<u8>>> {
        let token = self.job_token.child_token();
        let step_id = self.next_step.fetch_add(1, Ordering::Relaxed);
        self.step_tokens.lock().insert(step_id, token.clone());
        let _registration = StepRegistration {
            tokens: &self.step_tokens,
            step_id,
        };

        debug!(
            project = %self.descriptor.project_name,
            build = self.descriptor.build_number,
            position = ?step.position,
            "running server step"
        );
        self.hooks.run_server_step(step, &token)
    }

    /// Number of server steps currently running.
    pub fn running_server_steps(&self) -> usize {
        self.step_tokens.lock().len()
    }

    /// Cancel the job token and every running server step.
    pub fn on_job_finished(&self) {
        self.job_token.cancel();
        let tokens = self.step_tokens.lock();
        for token in tokens.values() {
            token.cancel();
        }
        info!(
            project = %self.descriptor.project_name,
            build = self.descriptor.build_number,
            cancelled_steps = tokens.len(),
            "job finished"
        );
    }

    /// Record that cache `key` was allocated to this job.
    /// Returns false if it already was.
    pub fn mark_cache_allocated(&self, key: impl Into<String>) -> bool {
        self.caches.lock().allocated.insert(key.into())
    }

    /// Caches allocated to this job.
    pub fn allocated_caches(&self) -> HashSet<String> {
        self.caches.lock().allocated.clone()
    }

    /// Count one more use of cache `key`; returns the new count.
    pub fn increment_cache_usage(&self, key: &str) -> u32 {
        let mut book = self.caches.lock();
        let count = book.counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Count one use of cache `key` less; returns the new count. The entry
    /// is dropped when it reaches zero.
    pub fn decrement_cache_usage(&self, key: &str) -> u32 {
        let mut book = self.caches.lock();
        let Some(count) = book.counts.get_mut(key) else {
            return 0;
        };
        *count = count.saturating_sub(1);
        let remaining = *count;
        if remaining == 0 {
            book.counts.remove(key);
        }
        remaining
    }

    /// Current usage count per cache key.
    pub fn cache_usage_counts(&self) -> HashMap<String, u32> {
        self.caches.lock().counts.clone()
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("descriptor", &self.descriptor)
            .field("cancelled", &self.job_token.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Removes a step's token from the registry on every exit path.
struct StepRegistration<'a> {
    tokens: &'a Mutex<HashMap<u64, CancellationToken>>,
    step_id: u64,
}

impl Drop for StepRegistration<'_> {
    fn drop(&mut self) {
        self.tokens.lock().remove(&self.step_id);
    }
}
