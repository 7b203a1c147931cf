//! Resource limiting applied between fork and exec.

use crate::config::types::SandboxConfig;
use crate::kernel::credentials::RunAsIdentity;
use std::fmt::Debug;
use std::process::Command;

/// Platform capability that arms a [`Command`] with resource limits.
pub trait ResourceLimiter: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Install whatever limits this platform supports. Must not make the
    /// spawn fail if a limit cannot be applied.
    fn install(&self, command: &mut Command);
}

/// Platforms without rlimits: only the wall-clock timeout applies.
#[derive(Debug, Default, Clone)]
pub struct NoopLimiter;

impl ResourceLimiter for NoopLimiter {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn install(&self, _command: &mut Command) {}
}

/// Which rlimit a [`LimitSetting`] targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitKind {
    CpuSeconds,
    AddressSpace,
    CoreDump,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimitSetting {
    pub kind: LimitKind,
    pub soft: u64,
    pub hard: u64,
}

/// Address-space ceiling applied on macOS, where large RLIMIT_AS values
/// are rejected outright.
pub const MACOS_ADDRESS_SPACE_CAP: u64 = 100 * 1024 * 1024;

/// rlimit + optional uid/gid switch.
#[derive(Clone, Debug)]
pub struct RlimitLimiter {
    settings: Vec<LimitSetting>,
    identity: Option<RunAsIdentity>,
}

impl RlimitLimiter {
    pub fn new(config: &SandboxConfig, identity: Option<RunAsIdentity>) -> Self {
        let memory = if cfg!(target_os = "macos") {
            config.memory_bytes.min(MACOS_ADDRESS_SPACE_CAP)
        } else {
            config.memory_bytes
        };

        let settings = vec![
            LimitSetting {
                kind: LimitKind::CpuSeconds,
                soft: config.cpu_time_seconds,
                hard: config.cpu_time_seconds.saturating_add(1),
            },
            LimitSetting {
                kind: LimitKind::AddressSpace,
                soft: memory,
                hard: memory,
            },
            LimitSetting {
                kind: LimitKind::CoreDump,
                soft: 0,
                hard: 0,
            },
        ];

        Self { settings, identity }
    }

    pub fn settings(&self) -> &[LimitSetting] {
        &self.settings
    }

    pub fn identity(&self) -> Option<&RunAsIdentity> {
        self.identity.as_ref()
    }
}

#[cfg(unix)]
impl ResourceLimiter for RlimitLimiter {
    fn name(&self) -> &'static str {
        "rlimit"
    }

    fn install(&self, command: &mut Command) {
        use std::os::unix::process::CommandExt;

        let settings = self.settings.clone();
        let ids = self.identity.as_ref().map(|id| (id.uid, id.gid));

        // SAFETY: the hook runs between fork and exec. It only issues
        // setrlimit/setgroups/setgid/setuid syscalls over data moved in
        // before the fork, with no allocation and no locking.
        unsafe {
            command.pre_exec(move || {
                for setting in &settings {
                    apply_setting_in_child(setting);
                }
                if let Some((uid, gid)) = ids {
                    crate::kernel::credentials::switch_identity_in_child(uid, gid);
                }
                Ok(())
            });
        }
    }
}

#[cfg(unix)]
fn apply_setting_in_child(setting: &LimitSetting) {
    use nix::sys::resource::{setrlimit, Resource};

    let resource = match setting.kind {
        LimitKind::CpuSeconds => Resource::RLIMIT_CPU,
        LimitKind::AddressSpace => Resource::RLIMIT_AS,
        LimitKind::CoreDump => Resource::RLIMIT_CORE,
    };
    // Best effort: the child proceeds under whatever could be applied
    let _ = setrlimit(resource, setting.soft as _, setting.hard as _);
}

/// Pick the limiter for this platform.
pub fn platform_limiter(config: &SandboxConfig, identity: Option<RunAsIdentity>) -> Box<dyn ResourceLimiter> {
    #[cfg(unix)]
    {
        Box::new(RlimitLimiter::new(config, identity))
    }

    #[cfg(not(unix))]
    {
        let _ = (config, identity);
        Box::new(NoopLimiter)
    }
}
