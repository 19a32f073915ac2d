//! Server-side build capacity setting.

use serde::{Deserialize, Serialize};

use crate::core::requirement::{ResourceKind, ResourceRequirement};

/// Memory granted per CPU core when no explicit setting exists, in megabytes.
pub const DEFAULT_MEMORY_PER_CORE: u32 = 1024;

/// Capacity the server offers to jobs it runs itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSetting {
    /// CPU in millicores.
    pub cpu: u32,
    /// Memory in megabytes.
    pub memory: u32,
}

impl BuildSetting {
    /// The setting as a per-dimension capacity map.
    #[must_use]
    pub fn capacity(&self) -> ResourceRequirement {
        ResourceRequirement::cpu_memory(self.cpu, self.memory)
    }

    /// `(dimension, total)` pairs, in the order they are applied.
    #[must_use]
    pub const fn totals(&self) -> [(ResourceKind, u32); 2] {
        [(ResourceKind::Cpu, self.cpu), (ResourceKind::Memory, self.memory)]
    }
}

impl Default for BuildSetting {
    /// One thousand millicores and [`DEFAULT_MEMORY_PER_CORE`] per logical CPU.
    fn default() -> Self {
        let cores = u32::try_from(num_cpus::get()).unwrap_or(u32::MAX / 1000).max(1);
        Self {
            cpu: cores.saturating_mul(1000),
            memory: cores.saturating_mul(DEFAULT_MEMORY_PER_CORE),
        }
    }
}

/// Source of the current build setting.
pub trait SettingStore: Send + Sync {
    /// Current server build capacity.
    fn build_setting(&self) -> BuildSetting;
}
