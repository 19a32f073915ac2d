//! Scheduler configuration structures.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::settings::BuildSetting;

/// Default capacity of the in-memory audit ring.
pub const DEFAULT_AUDIT_BUFFER: usize = 1024;

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Initial server build capacity.
    #[serde(default)]
    pub server: BuildSetting,
    /// Seconds a request may wait for capacity; unbounded when absent.
    #[serde(default)]
    pub admission_timeout_secs: Option<u64>,
    /// Events kept by the in-memory audit sink; 0 disables auditing.
    #[serde(default = "default_audit_buffer")]
    pub audit_buffer: usize,
}

const fn default_audit_buffer() -> usize {
    DEFAULT_AUDIT_BUFFER
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            server: BuildSetting::default(),
            admission_timeout_secs: None,
            audit_buffer: DEFAULT_AUDIT_BUFFER,
        }
    }
}

impl SchedulerConfig {
    /// Admission deadline as a duration.
    #[must_use]
    pub fn admission_timeout(&self) -> Option<Duration> {
        self.admission_timeout_secs.map(Duration::from_secs)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.cpu == 0 {
            return Err("server cpu must be greater than 0".into());
        }
        if self.server.memory == 0 {
            return Err("server memory must be greater than 0".into());
        }
        if self.admission_timeout_secs == Some(0) {
            return Err("admission_timeout_secs must be greater than 0 when set".into());
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the environment, loading `.env` first.
    ///
    /// Reads `ADMISSION_SERVER_CPU`, `ADMISSION_SERVER_MEMORY`,
    /// `ADMISSION_TIMEOUT_SECS` and `ADMISSION_AUDIT_BUFFER`; unset variables
    /// keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a message naming a variable that does not parse, or a
    /// validation message.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let mut cfg = Self::default();
        if let Some(cpu) = env_number("ADMISSION_SERVER_CPU")? {
            cfg.server.cpu = cpu;
        }
        if let Some(memory) = env_number("ADMISSION_SERVER_MEMORY")? {
            cfg.server.memory = memory;
        }
        cfg.admission_timeout_secs = env_number("ADMISSION_TIMEOUT_SECS")?;
        if let Some(buffer) = env_number("ADMISSION_AUDIT_BUFFER")? {
            cfg.audit_buffer = buffer;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("{name} must be a valid number")),
        Err(_) => Ok(None),
    }
}
