use crate::config::types::{Result, SandboxConfig, SandboxError};
use std::path::{Path, PathBuf};

/// Environment variables recognised by [`SandboxConfig::apply_env_overrides`].
pub const ENV_CPU_TIME: &str = "SHEETBOX_CPU_TIME";
pub const ENV_MEMORY_BYTES: &str = "SHEETBOX_MEMORY_BYTES";
pub const ENV_USER: &str = "SHEETBOX_USER";
pub const ENV_SCRATCH_DIR: &str = "SHEETBOX_SCRATCH_DIR";
pub const ENV_TIMEOUT: &str = "SHEETBOX_TIMEOUT";
pub const ENV_INTERPRETER: &str = "SHEETBOX_INTERPRETER";

impl SandboxConfig {
    /// Load configuration from a JSON file; absent fields keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SandboxError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| SandboxError::Config(format!("Failed to parse config JSON: {}", e)))
    }

    /// Overlay `SHEETBOX_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Overlay values produced by `lookup`. Unparseable numbers are an error
    /// rather than a silent fallback.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_CPU_TIME) {
            self.cpu_time_seconds = parse_number(ENV_CPU_TIME, &value)?;
        }
        if let Some(value) = lookup(ENV_MEMORY_BYTES) {
            self.memory_bytes = parse_number(ENV_MEMORY_BYTES, &value)?;
        }
        if let Some(value) = lookup(ENV_TIMEOUT) {
            self.timeout_seconds = parse_number(ENV_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(ENV_USER) {
            self.run_as_identity = Some(value);
        }
        if let Some(value) = lookup(ENV_SCRATCH_DIR) {
            self.scratch_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_INTERPRETER) {
            self.interpreter = PathBuf::from(value);
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| SandboxError::Config(format!("{} must be a non-negative integer, got {:?}", key, value)))
}
