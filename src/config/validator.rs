// Startup validation: a sandbox refuses to come up with a config that
// could never run anything.

use crate::config::types::{Result, SandboxConfig, SandboxError};

const LOW_MEMORY_BYTES: u64 = 32 * 1024 * 1024;

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Validate config at sandbox construction. Errors are fatal; warnings are
/// returned for the caller to log.
pub fn validate_config(config: &SandboxConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_limits(config, &mut result);
    validate_paths(config, &mut result);

    if !result.is_valid() {
        return Err(SandboxError::Config(format!(
            "Config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}

fn validate_limits(config: &SandboxConfig, result: &mut ValidationResult) {
    if config.timeout_seconds == 0 {
        result.add_error("timeout_seconds cannot be zero".to_string());
    }

    if config.cpu_time_seconds == 0 {
        result.add_error("cpu_time_seconds cannot be zero".to_string());
    }

    if config.memory_bytes == 0 {
        result.add_error("memory_bytes cannot be zero".to_string());
    } else if config.memory_bytes < LOW_MEMORY_BYTES {
        result.add_warning(format!(
            "memory_bytes {} is very low (< 32MB), the interpreter may fail to start",
            config.memory_bytes
        ));
    }

    if config.cpu_time_seconds > config.timeout_seconds && config.timeout_seconds > 0 {
        result.add_warning(format!(
            "cpu_time_seconds ({}) exceeds timeout_seconds ({}); the wall clock will fire first",
            config.cpu_time_seconds, config.timeout_seconds
        ));
    }

    if config.max_output_bytes == 0 {
        result.add_warning("max_output_bytes is zero, all output will be discarded".to_string());
    }
}

fn validate_paths(config: &SandboxConfig, result: &mut ValidationResult) {
    if config.interpreter.as_os_str().is_empty() {
        result.add_error("interpreter cannot be empty".to_string());
    }

    if config.scratch_dir.as_os_str().is_empty() {
        result.add_error("scratch_dir cannot be empty".to_string());
    } else if !config.scratch_dir.is_absolute() {
        result.add_warning(format!(
            "scratch_dir {:?} is relative; it resolves against the current directory",
            config.scratch_dir
        ));
    }
}
