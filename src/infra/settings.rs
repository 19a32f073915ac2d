//! In-memory setting store.

use parking_lot::RwLock;

use crate::core::events::ResourceEvent;
use crate::core::settings::{BuildSetting, SettingStore};

/// Setting store holding the build setting in memory.
#[derive(Debug, Default)]
pub struct InMemorySettingStore {
    build: RwLock<BuildSetting>,
}

impl InMemorySettingStore {
    /// Store starting at `build`.
    #[must_use]
    pub fn new(build: BuildSetting) -> Self {
        Self {
            build: RwLock::new(build),
        }
    }

    /// Save a new build setting and return the event announcing it.
    pub fn save(&self, build: BuildSetting) -> ResourceEvent {
        *self.build.write() = build;
        ResourceEvent::BuildSettingChanged(build)
    }
}

impl SettingStore for InMemorySettingStore {
    fn build_setting(&self) -> BuildSetting {
        *self.build.read()
    }
}
