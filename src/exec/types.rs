use crate::config::types::Result;
use crate::kernel::limits::ResourceLimiter;
use crate::kernel::signal::KillReport;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Everything a launcher needs to run one composed script.
#[derive(Debug)]
pub struct LaunchRequest<'a> {
    pub run_id: &'a str,
    pub interpreter: &'a Path,
    pub script: &'a Path,
    pub working_dir: &'a Path,
    /// Child stdout goes here
    pub stdout: &'a File,
    /// Child stderr goes here
    pub stderr: &'a File,
    pub timeout: Duration,
    pub limiter: &'a dyn ResourceLimiter,
}

/// How the launched process ended.
#[derive(Debug, Clone, Default)]
pub struct LaunchOutcome {
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub timed_out: bool,
    pub wall_time: Duration,
    pub kill_report: Option<KillReport>,
}

/// Seam between the sandbox and process creation. Implementations block
/// until the process has exited or been killed and reaped.
pub trait ProcessLauncher: Send + Sync {
    fn name(&self) -> &str;

    fn launch(&self, request: &LaunchRequest<'_>) -> Result<LaunchOutcome>;
}
