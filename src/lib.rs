//! # Prometheus Admission
//!
//! Resource-aware admission control for build jobs.
//!
//! Jobs either run on the server itself or on one of a changing set of remote
//! agents. Each execution target has a fixed CPU/memory capacity; this crate
//! decides *when* and *where* a job may run, commits its capacity for the
//! duration of the work and guarantees that capacity is returned afterwards,
//! while agents connect, disconnect, pause and get resized underneath it.
//!
//! ## Key Features
//!
//! - **Blocking admission**: callers park on a condition variable until their
//!   requirement fits, then run their work outside the lock
//! - **Best fit by slack**: agent jobs go to the matching agent with the most
//!   free capacity
//! - **Incremental filter caches**: a waiting request tracks its matching
//!   agents from connect/disconnect events instead of re-scanning
//! - **Scoped release**: capacity is returned on success, error and panic
//! - **Cooperative cancellation**: waits and in-process steps observe
//!   `tokio_util` cancellation tokens
//!
//! ## Server admission
//!
//! ```rust
//! use prometheus_admission::core::{BuildSetting, ResourceManager, ResourceRequirement};
//! use prometheus_admission::infra::InMemoryAgentDirectory;
//!
//! let directory = InMemoryAgentDirectory::<()>::new();
//! let manager = ResourceManager::new(directory, BuildSetting { cpu: 4, memory: 8 });
//!
//! let answer = manager
//!     .run_on_server(&ResourceRequirement::cpu_memory(3, 4), || Ok(42))
//!     .unwrap();
//! assert_eq!(answer, 42);
//! ```
//!
//! ## Agent admission
//!
//! ```rust,ignore
//! let result = manager.run_on_agent(
//!     &ResourceRequirement::cpu_memory(0, 0),
//!     Arc::new(AgentCriteria::Os("linux".into())),
//!     &job.resource_requirement(),
//!     |lease| dispatch(lease.session, &job),
//! )?;
//! ```
//!
//! For complete examples, see:
//! - `tests/server_admission_test.rs` - server pool scenarios
//! - `tests/agent_admission_test.rs` - agent selection and dispatch failures

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and capacity accounting.
pub mod core;
/// Configuration models for capacity, deadlines and auditing.
pub mod config;
/// Builders to construct scheduler components from configuration.
pub mod builders;
/// In-memory collaborator implementations.
pub mod infra;
/// Runtime adapters for async callers.
pub mod runtime;
/// Shared utilities.
pub mod util;
