//! Integration tests for per-job bookkeeping.
//!
//! A finishing job must cancel its in-flight server steps and any admission
//! wait tied to its token.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use prometheus_admission::core::{
    AgentId, AppResult, BuildSetting, JobContext, JobDescriptor, JobHooks, ResourceManager,
    SchedulerError, ServerStep, Service,
};
use prometheus_admission::infra::InMemoryAgentDirectory;
use tokio_util::sync::CancellationToken;

/// Hooks whose server step blocks until cancelled.
struct BlockingHooks {
    started: Sender<()>,
    running_on: Mutex<Vec<Option<AgentId>>>,
    workspaces: Mutex<Vec<String>>,
}

impl JobHooks for BlockingHooks {
    fn notify_job_running(&self, agent_id: Option<AgentId>) {
        self.running_on.lock().push(agent_id);
    }

    fn report_job_workspace(&self, workspace: &str) {
        self.workspaces.lock().push(workspace.to_string());
    }

    fn run_server_step(
        &self,
        step: &ServerStep,
        cancel: &CancellationToken,
    ) -> AppResult<HashMap<String, Vec<u8>>> {
        self.started.send(())?;
        while !cancel.is_cancelled() {
            thread::sleep(Duration::from_millis(2));
        }
        anyhow::bail!("step {:?} cancelled", step.position)
    }

    fn copy_dependencies(&self, target_dir: &Path) -> AppResult<()> {
        anyhow::ensure!(target_dir.is_absolute(), "relative target {}", target_dir.display());
        Ok(())
    }
}

fn context() -> (Arc<JobContext>, Arc<BlockingHooks>, crossbeam_channel::Receiver<()>) {
    let (started, started_rx) = bounded(8);
    let hooks = Arc::new(BlockingHooks {
        started,
        running_on: Mutex::new(Vec::new()),
        workspaces: Mutex::new(Vec::new()),
    });
    let ctx = JobContext::new(
        JobDescriptor {
            project_name: "backend".into(),
            build_number: 42,
            cpu_requirement: 1000,
            memory_requirement: 512,
            services: vec![Service {
                name: "postgres".into(),
                cpu_requirement: 500,
                memory_requirement: 256,
            }],
            ..JobDescriptor::default()
        },
        hooks.clone(),
    );
    (Arc::new(ctx), hooks, started_rx)
}

#[test]
fn test_job_finish_cancels_running_steps() {
    let (ctx, _hooks, started) = context();

    let steps: Vec<_> = (0..2usize)
        .map(|i| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                ctx.run_server_step(&ServerStep {
                    position: vec![i],
                    ..ServerStep::default()
                })
            })
        })
        .collect();
    started.recv().unwrap();
    started.recv().unwrap();
    assert_eq!(ctx.running_server_steps(), 2);

    ctx.on_job_finished();

    for step in steps {
        let err = step.join().unwrap().unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
    assert_eq!(ctx.running_server_steps(), 0);
}

#[test]
fn test_job_finish_aborts_admission_wait() {
    let (ctx, _hooks, _started) = context();
    let manager = Arc::new(ResourceManager::new(
        InMemoryAgentDirectory::<()>::new(),
        BuildSetting {
            cpu: 1000,
            memory: 1024,
        },
    ));

    let waiter = {
        let manager = Arc::clone(&manager);
        let ctx = Arc::clone(&ctx);
        thread::spawn(move || {
            manager.run_on_server_cancellable(
                &ctx.resource_requirement(),
                ctx.cancel_token(),
                || Ok(()),
            )
        })
    };

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while manager.snapshot().waiters == 0 {
        assert!(std::time::Instant::now() < deadline);
        thread::sleep(Duration::from_millis(5));
    }

    // No scheduler event follows; finishing the job alone must end the wait.
    ctx.on_job_finished();

    assert!(matches!(
        waiter.join().unwrap(),
        Err(SchedulerError::Cancelled)
    ));
    assert_eq!(manager.snapshot().waiters, 0);
}

#[test]
fn test_hooks_are_forwarded() {
    let (ctx, hooks, _started) = context();
    ctx.notify_job_running(Some(3));
    ctx.notify_job_running(None);
    ctx.report_job_workspace("/workspace/backend/42");

    assert_eq!(*hooks.running_on.lock(), vec![Some(3), None]);
    assert_eq!(*hooks.workspaces.lock(), vec!["/workspace/backend/42".to_string()]);
    assert!(ctx.copy_dependencies(Path::new("/tmp/deps")).is_ok());
    assert!(ctx.copy_dependencies(Path::new("deps")).is_err());
    assert_eq!(ctx.descriptor().build_number, 42);
}
