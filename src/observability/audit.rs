/// Security event logging
///
/// Every event goes to the `log` facade at a level derived from its
/// severity. A sandbox configured with an audit path also appends each event
/// as one JSON line. The sink belongs to the sandbox instance.
use crate::config::types::{Result, SandboxError};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecuritySeverity {
    Critical,
    High,
    Medium,
    Low,
}

/// Types of security events the sandbox emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityEventType {
    CodeRejected,
    ExecutionStart,
    ExecutionEnd,
    WallTimeLimitViolation,
    ForcedKill,
    OutputLimitViolation,
    SpawnFailure,
    PrivilegeSwitchConfigured,
    PrivilegeSwitchSkipped,
    ScratchSweep,
    ConfigurationWarning,
}

impl SecurityEventType {
    pub fn default_severity(&self) -> SecuritySeverity {
        match self {
            SecurityEventType::ExecutionStart | SecurityEventType::ExecutionEnd => SecuritySeverity::Low,
            SecurityEventType::ScratchSweep => SecuritySeverity::Low,
            SecurityEventType::PrivilegeSwitchConfigured => SecuritySeverity::Low,
            SecurityEventType::ConfigurationWarning => SecuritySeverity::Medium,
            SecurityEventType::OutputLimitViolation => SecuritySeverity::Medium,
            SecurityEventType::PrivilegeSwitchSkipped => SecuritySeverity::Medium,
            SecurityEventType::CodeRejected => SecuritySeverity::Medium,
            SecurityEventType::WallTimeLimitViolation => SecuritySeverity::High,
            SecurityEventType::ForcedKill => SecuritySeverity::High,
            SecurityEventType::SpawnFailure => SecuritySeverity::High,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub event_type: SecurityEventType,
    pub severity: SecuritySeverity,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    pub details: String,
    pub run_id: Option<String>,
    pub process_id: u32,
}

impl SecurityEvent {
    pub fn new(event_type: SecurityEventType, details: impl Into<String>) -> Self {
        Self {
            event_type,
            severity: event_type.default_severity(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            details: details.into(),
            run_id: None,
            process_id: std::process::id(),
        }
    }

    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }

    pub fn with_severity(mut self, severity: SecuritySeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Per-sandbox destination for security events.
#[derive(Debug, Default)]
pub struct AuditSink {
    file: Option<(PathBuf, Mutex<File>)>,
}

impl AuditSink {
    /// Log-only sink
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Append JSON lines to `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SandboxError::Config(format!("Failed to create audit log directory: {}", e))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SandboxError::Config(format!("Failed to open audit log {}: {}", path.display(), e)))?;

        Ok(Self {
            file: Some((path.to_path_buf(), Mutex::new(file))),
        })
    }

    pub fn from_config(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::open(path),
            None => Ok(Self::disabled()),
        }
    }

    pub fn audit_path(&self) -> Option<&Path> {
        self.file.as_ref().map(|(path, _)| path.as_path())
    }

    pub fn record(&self, event: SecurityEvent) {
        let run = event.run_id.as_deref().unwrap_or("-");
        match event.severity {
            SecuritySeverity::Critical | SecuritySeverity::High => {
                error!("SECURITY {:?}: {:?} [{}] {}", event.severity, event.event_type, run, event.details)
            }
            SecuritySeverity::Medium => {
                warn!("SECURITY {:?}: {:?} [{}] {}", event.severity, event.event_type, run, event.details)
            }
            SecuritySeverity::Low => {
                info!("SECURITY {:?}: {:?} [{}] {}", event.severity, event.event_type, run, event.details)
            }
        }

        let Some((_, file)) = &self.file else {
            return;
        };

        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize security event: {}", e);
                return;
            }
        };

        match file.lock() {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{}", line).and_then(|_| file.flush()) {
                    error!("Failed to write to security audit log: {}", e);
                }
            }
            Err(_) => error!("Failed to acquire lock on security audit file"),
        }
    }
}
