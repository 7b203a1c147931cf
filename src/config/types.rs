/// Core types and structures for the sheetbox system
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::security::Violation;

/// Default prelude imports, matching what generated analysis code expects.
pub const DEFAULT_BASELINE_IMPORTS: &[&str] = &[
    "import pandas as pd",
    "import numpy as np",
    "from datetime import datetime",
];

/// Sandbox configuration.
///
/// Created once and handed to [`crate::exec::ProcessSandbox`], which owns it
/// for its whole lifetime and never mutates it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// RLIMIT_CPU applied to the child, in seconds
    pub cpu_time_seconds: u64,
    /// RLIMIT_AS applied to the child, in bytes.
    ///
    /// The 200MiB default suits plain scripts. On Linux `import pandas`
    /// (through numpy's thread pools) reserves more address space than that
    /// and fails at startup, so deployments that inject datasets need a
    /// larger value, typically a few GiB.
    pub memory_bytes: u64,
    /// Account to switch to before running user code (`None`, "" or "current" = no switch)
    pub run_as_identity: Option<String>,
    /// Directory holding scratch scripts, output captures and dataset blobs
    pub scratch_dir: PathBuf,
    /// Default wall-clock bound for one execution
    pub timeout_seconds: u64,
    /// Interpreter used to run the composed script
    pub interpreter: PathBuf,
    /// Import lines placed at the top of every prelude
    pub baseline_imports: Vec<String>,
    /// Per-stream capture bound
    pub max_output_bytes: u64,
    /// Scratch files older than this are removed by the sweep
    pub stale_scratch_age_seconds: u64,
    /// Optional JSON-lines audit trail
    pub audit_log: Option<PathBuf>,
}

impl SandboxConfig {
    /// Default scratch root, scoped by effective UID so root and non-root
    /// sandboxes never share files.
    pub fn default_scratch_dir() -> PathBuf {
        #[cfg(unix)]
        {
            let euid = nix::unistd::geteuid().as_raw();
            std::env::temp_dir().join(format!("sheetbox-uid-{}", euid))
        }

        #[cfg(not(unix))]
        {
            std::env::temp_dir().join("sheetbox")
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn stale_scratch_age(&self) -> Duration {
        Duration::from_secs(self.stale_scratch_age_seconds)
    }

    /// Requested run-as account, with the "no switch" spellings folded to `None`.
    pub fn requested_identity(&self) -> Option<&str> {
        match self.run_as_identity.as_deref().map(str::trim) {
            None | Some("") | Some("current") => None,
            Some(name) => Some(name),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            cpu_time_seconds: 2,
            memory_bytes: 200 * 1024 * 1024, // 200MB, too small for pandas on Linux
            run_as_identity: None,
            scratch_dir: Self::default_scratch_dir(),
            timeout_seconds: 5,
            interpreter: PathBuf::from("python3"),
            baseline_imports: DEFAULT_BASELINE_IMPORTS
                .iter()
                .map(|line| line.to_string())
                .collect(),
            max_output_bytes: 1024 * 1024, // 1MB per stream
            stale_scratch_age_seconds: 3600,
            audit_log: None,
        }
    }
}

/// Execution result from one `execute` call.
///
/// Ownership passes to the caller; the sandbox keeps nothing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Run identifier (also embedded in scratch file names and audit events)
    pub run_id: String,
    /// Terminal state of the call
    pub status: ExecutionStatus,
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Standard error, lossily decoded, or the sandbox's own failure message
    pub stderr: String,
    /// Exit code of the interpreter (if it exited normally)
    pub exit_code: Option<i32>,
    /// Signal that terminated the interpreter (if any)
    pub signal: Option<i32>,
    /// Wall time from validation start to result
    pub duration: Duration,
    /// Security violations; populated only for `Rejected`
    pub violations: Vec<Violation>,
}

impl ExecutionResult {
    pub(crate) fn new(run_id: String, status: ExecutionStatus) -> Self {
        Self {
            run_id,
            status,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            signal: None,
            duration: Duration::ZERO,
            violations: Vec::new(),
        }
    }

    /// The `(stdout, stderr)` pair callers historically consumed.
    pub fn output_pair(&self) -> (&str, &str) {
        (&self.stdout, &self.stderr)
    }

    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Completed && self.signal.is_none() && self.stderr.is_empty()
    }
}

/// Terminal states of one `execute` call - closed set
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Interpreter ran to completion (any exit code)
    #[serde(rename = "completed")]
    Completed,
    /// Static validation refused the code; nothing was spawned
    #[serde(rename = "rejected")]
    Rejected,
    /// Wall-clock bound exceeded; process group was killed
    #[serde(rename = "timed_out")]
    TimedOut,
    /// Scratch file or process could not be created
    #[serde(rename = "spawn_failed")]
    SpawnFailed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Rejected => write!(f, "rejected"),
            ExecutionStatus::TimedOut => write!(f, "timed_out"),
            ExecutionStatus::SpawnFailed => write!(f, "spawn_failed"),
        }
    }
}

/// Custom error types for sheetbox
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Scratch file error: {0}")]
    Scratch(String),

    #[error("Spawn error: {0}")]
    Spawn(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Privilege error: {0}")]
    Privilege(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for sheetbox operations
pub type Result<T> = std::result::Result<T, SandboxError>;
