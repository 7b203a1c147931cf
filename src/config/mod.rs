//! Configuration
//!
//! Sandbox settings, file/env loading, and startup validation.

pub mod loader;
pub mod types;
pub mod validator;

pub use types::{ExecutionResult, ExecutionStatus, Result, SandboxConfig, SandboxError};
pub use validator::{validate_config, ValidationResult};
