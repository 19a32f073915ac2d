//! Runtime adapters for async callers.

#[cfg(feature = "tokio-runtime")]
pub mod tokio_bridge;

#[cfg(feature = "tokio-runtime")]
pub use tokio_bridge::{run_on_agent_async, run_on_server_async};
