//! In-memory implementations of the scheduler's collaborators.

pub mod directory;
pub mod settings;

pub use directory::InMemoryAgentDirectory;
pub use settings::InMemorySettingStore;
