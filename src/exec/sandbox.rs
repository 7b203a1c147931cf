use crate::config::types::{ExecutionResult, ExecutionStatus, Result, SandboxConfig};
use crate::config::validator::validate_config;
use crate::dataset::injector::BLOB_PREFIX;
use crate::dataset::{Dataset, DatasetInjector, InjectedDataset};
use crate::exec::launcher::SubprocessLauncher;
use crate::exec::types::{LaunchRequest, ProcessLauncher};
use crate::kernel::credentials::{
    grant_group_access, resolve_identity, IdentityResolution, SHARED_DIR_MODE, SHARED_FILE_MODE,
};
use crate::kernel::limits::{platform_limiter, ResourceLimiter};
use crate::observability::audit::{AuditSink, SecurityEvent, SecurityEventType, SecuritySeverity};
use crate::safety::cleanup::{sweep_stale, SweepReport};
use crate::safety::workspace::{ensure_scratch_dir, read_capture, RunWorkspace, RUN_PREFIX};
use crate::security::{CodeValidator, ValidationVerdict};
use log::{error, info, warn};
use std::path::Path;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Validates and runs generated scripts under resource limits.
///
/// `execute` takes `&self` and may run concurrently from several threads;
/// `inject` and `clear` take `&mut self`, so they cannot overlap a run.
pub struct ProcessSandbox {
    config: SandboxConfig,
    validator: CodeValidator,
    injector: DatasetInjector,
    identity: IdentityResolution,
    limiter: Box<dyn ResourceLimiter>,
    launcher: Box<dyn ProcessLauncher>,
    audit: AuditSink,
}

impl ProcessSandbox {
    pub fn new(config: SandboxConfig) -> Result<Self> {
        Self::with_launcher(config, Box::new(SubprocessLauncher::default()))
    }

    pub fn with_launcher(config: SandboxConfig, launcher: Box<dyn ProcessLauncher>) -> Result<Self> {
        let validation = validate_config(&config)?;
        let audit = AuditSink::from_config(config.audit_log.as_deref())?;
        for warning in &validation.warnings {
            warn!("Configuration warning: {}", warning);
            audit.record(SecurityEvent::new(SecurityEventType::ConfigurationWarning, warning.clone()));
        }

        ensure_scratch_dir(&config.scratch_dir)?;

        let identity = share_scratch_dir(&config, resolve_identity(&config));
        match &identity {
            IdentityResolution::NotRequested => {}
            IdentityResolution::Switch(target) => audit.record(SecurityEvent::new(
                SecurityEventType::PrivilegeSwitchConfigured,
                format!("children run as {} (uid={}, gid={})", target.name, target.uid, target.gid),
            )),
            IdentityResolution::AlreadyCurrent(name) => audit.record(
                SecurityEvent::new(
                    SecurityEventType::PrivilegeSwitchSkipped,
                    format!("'{}' is the current user, no switch needed", name),
                )
                .with_severity(SecuritySeverity::Low),
            ),
            IdentityResolution::Unprivileged { name, reason } => audit.record(SecurityEvent::new(
                SecurityEventType::PrivilegeSwitchSkipped,
                format!("cannot share scratch files with '{}', children keep the current identity: {}", name, reason),
            )),
            IdentityResolution::Unknown(name) => audit.record(SecurityEvent::new(
                SecurityEventType::PrivilegeSwitchSkipped,
                format!("user '{}' does not exist, children keep the current identity", name),
            )),
            IdentityResolution::Unsupported(name) => audit.record(SecurityEvent::new(
                SecurityEventType::PrivilegeSwitchSkipped,
                format!("cannot switch to '{}' on this platform", name),
            )),
        }

        let limiter = platform_limiter(&config, identity.identity().cloned());
        let injector = DatasetInjector::new(config.scratch_dir.clone(), config.baseline_imports.clone())
            .readable_by(identity.identity().cloned());

        let sandbox = Self {
            validator: CodeValidator::new()?,
            injector,
            identity,
            limiter,
            launcher,
            audit,
            config,
        };

        info!(
            "Sandbox ready: scratch={}, limiter={}, launcher={}",
            sandbox.config.scratch_dir.display(),
            sandbox.limiter.name(),
            sandbox.launcher.name()
        );
        sandbox.sweep_stale();
        Ok(sandbox)
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn identity(&self) -> &IdentityResolution {
        &self.identity
    }

    /// Static validation only; nothing is spawned.
    pub fn validate(&self, code: &str) -> ValidationVerdict {
        self.validator.validate(code)
    }

    pub fn inject(&mut self, dataset: &dyn Dataset) -> Result<InjectedDataset> {
        self.injector.inject(dataset).cloned()
    }

    pub fn clear(&mut self) {
        self.injector.clear();
    }

    pub fn injected(&self) -> Option<&InjectedDataset> {
        self.injector.injected()
    }

    pub fn build_prelude(&self) -> String {
        self.injector.build_prelude()
    }

    /// Remove stale `run-`/`dataset-` files, sparing the active dataset.
    pub fn sweep_stale(&self) -> SweepReport {
        let keep: Vec<&Path> = self
            .injector
            .injected()
            .map(|active| active.serialized_blob_path.as_path())
            .into_iter()
            .collect();
        let report = sweep_stale(
            &self.config.scratch_dir,
            &[RUN_PREFIX, BLOB_PREFIX],
            self.config.stale_scratch_age(),
            &keep,
        );
        if !report.removed.is_empty() {
            self.audit.record(SecurityEvent::new(
                SecurityEventType::ScratchSweep,
                format!("removed {} stale scratch file(s)", report.removed.len()),
            ));
        }
        report
    }

    /// Run `code` with the configured timeout.
    pub fn execute(&self, code: &str) -> ExecutionResult {
        self.execute_with_timeout(code, self.config.timeout())
    }

    /// Validate, compose, spawn, wait. Every failure is reported in the
    /// returned result; nothing escapes as an error.
    pub fn execute_with_timeout(&self, code: &str, timeout: Duration) -> ExecutionResult {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();

        let verdict = self.validator.validate(code);
        if !verdict.allowed() {
            let mut result = ExecutionResult::new(run_id, ExecutionStatus::Rejected);
            result.stderr = verdict.summary();
            self.audit.record(
                SecurityEvent::new(SecurityEventType::CodeRejected, result.stderr.clone())
                    .with_run_id(&result.run_id),
            );
            result.violations = verdict.into_violations();
            result.duration = started.elapsed();
            return result;
        }

        let mut result = match self.run_validated(&run_id, code, timeout) {
            Ok(result) => result,
            Err(e) => {
                error!("[{}] execution could not start: {}", run_id, e);
                self.audit.record(
                    SecurityEvent::new(SecurityEventType::SpawnFailure, e.to_string()).with_run_id(&run_id),
                );
                let mut result = ExecutionResult::new(run_id, ExecutionStatus::SpawnFailed);
                result.stderr = e.to_string();
                result
            }
        };

        result.duration = started.elapsed();
        info!(
            "[{}] {} in {:.3}s (exit={:?}, signal={:?})",
            result.run_id,
            result.status,
            result.duration.as_secs_f64(),
            result.exit_code,
            result.signal
        );
        result
    }

    fn run_validated(&self, run_id: &str, code: &str, timeout: Duration) -> Result<ExecutionResult> {
        // Dropped on every path below, removing script and captures
        let workspace = RunWorkspace::new(&self.config.scratch_dir, run_id);

        let script = format!("{}\n{}", self.injector.build_prelude(), code);
        workspace.write_script(&script)?;
        if let Some(target) = self.identity.identity() {
            grant_group_access(workspace.script_path(), target, SHARED_FILE_MODE)?;
        }
        let (stdout, stderr) = workspace.create_captures()?;

        self.audit.record(
            SecurityEvent::new(
                SecurityEventType::ExecutionStart,
                format!("timeout={:?}, limiter={}", timeout, self.limiter.name()),
            )
            .with_run_id(run_id),
        );

        let request = LaunchRequest {
            run_id,
            interpreter: &self.config.interpreter,
            script: workspace.script_path(),
            working_dir: &self.config.scratch_dir,
            stdout: &stdout,
            stderr: &stderr,
            timeout,
            limiter: self.limiter.as_ref(),
        };
        let outcome = self.launcher.launch(&request)?;
        drop(stdout);
        drop(stderr);

        let mut result = ExecutionResult::new(run_id.to_string(), ExecutionStatus::Completed);
        result.exit_code = outcome.exit_code;
        result.signal = outcome.signal;

        if outcome.timed_out {
            result.status = ExecutionStatus::TimedOut;
            result.stderr = format!("timeout after {} seconds", timeout.as_secs_f64());
            self.audit.record(
                SecurityEvent::new(SecurityEventType::WallTimeLimitViolation, result.stderr.clone())
                    .with_run_id(run_id),
            );
            if let Some(report) = &outcome.kill_report {
                self.audit.record(
                    SecurityEvent::new(
                        SecurityEventType::ForcedKill,
                        format!(
                            "pid={:?} term_sent={} kill_sent={} waited_ms={} {}",
                            outcome.pid,
                            report.term_sent,
                            report.kill_sent,
                            report.waited_ms,
                            report.notes.join("; ")
                        ),
                    )
                    .with_run_id(run_id),
                );
            }
            return Ok(result);
        }

        result.stdout = self.decode_capture(run_id, "stdout", workspace.stdout_path())?;
        result.stderr = self.decode_capture(run_id, "stderr", workspace.stderr_path())?;
        if let Some(signal) = outcome.signal {
            // SIGXCPU or an allocation failure under RLIMIT_AS can leave stderr empty
            if !result.stderr.is_empty() && !result.stderr.ends_with('\n') {
                result.stderr.push('\n');
            }
            result.stderr.push_str(&format!("terminated by signal {}", signal));
        }

        self.audit.record(
            SecurityEvent::new(
                SecurityEventType::ExecutionEnd,
                format!(
                    "exit={:?} signal={:?} wall={:.3}s",
                    outcome.exit_code,
                    outcome.signal,
                    outcome.wall_time.as_secs_f64()
                ),
            )
            .with_run_id(run_id),
        );
        Ok(result)
    }

    fn decode_capture(&self, run_id: &str, stream: &str, path: &Path) -> Result<String> {
        let capture = read_capture(path, self.config.max_output_bytes)?;
        let mut text = String::from_utf8_lossy(&capture.bytes).into_owned();
        if capture.truncated {
            text.push_str(&format!(
                "\n[{} truncated at {} bytes]",
                stream, self.config.max_output_bytes
            ));
            self.audit.record(
                SecurityEvent::new(
                    SecurityEventType::OutputLimitViolation,
                    format!("{} exceeded {} bytes", stream, self.config.max_output_bytes),
                )
                .with_run_id(run_id),
            );
        }
        Ok(text)
    }
}

/// Let the run-as account's group enter the scratch directory. When that is
/// not permitted the switch could not happen either, so it is dropped.
fn share_scratch_dir(config: &SandboxConfig, identity: IdentityResolution) -> IdentityResolution {
    let target = match identity {
        IdentityResolution::Switch(target) => target,
        other => return other,
    };
    match grant_group_access(&config.scratch_dir, &target, SHARED_DIR_MODE) {
        Ok(()) => IdentityResolution::Switch(target),
        Err(e) => {
            warn!("Not switching children to '{}': {}", target.name, e);
            IdentityResolution::Unprivileged {
                name: target.name,
                reason: e.to_string(),
            }
        }
    }
}

impl std::fmt::Debug for ProcessSandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSandbox")
            .field("config", &self.config)
            .field("identity", &self.identity)
            .field("limiter", &self.limiter.name())
            .field("launcher", &self.launcher.name())
            .field("injected", &self.injector.injected())
            .finish()
    }
}
