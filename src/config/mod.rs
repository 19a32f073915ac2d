//! Configuration models for server capacity, admission deadlines and auditing.

pub mod scheduler;

pub use scheduler::SchedulerConfig;
