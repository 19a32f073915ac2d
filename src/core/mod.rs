//! Core scheduling abstractions and capacity accounting.

pub mod agent;
pub mod audit;
pub mod error;
pub mod events;
pub mod job_context;
pub mod query_cache;
pub mod requirement;
pub mod resource_holder;
pub mod resource_manager;
pub mod settings;

pub use agent::{
    validate_attribute_name, AgentCriteria, AgentDirectory, AgentId, AgentQuery, AgentRecord,
    AGENT_FIELDS,
};
pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use error::{AppResult, SchedulerError};
pub use events::{spawn_event_listener, ResourceEvent};
pub use job_context::{
    Action, CacheSpec, JobContext, JobDescriptor, JobHooks, ServerStep, Service,
};
pub use query_cache::QueryCache;
pub use requirement::{ResourceKind, ResourceRequirement};
pub use resource_holder::ResourceHolder;
pub use resource_manager::{AgentLease, CapacitySnapshot, ResourceManager};
pub use settings::{BuildSetting, SettingStore, DEFAULT_MEMORY_PER_CORE};
