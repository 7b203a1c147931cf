//! Run-as identity resolution and the in-child switch.
//!
//! The switch is defense in depth for a cooperating host. It is not an
//! isolation boundary on its own.

use crate::config::types::{Result, SandboxConfig, SandboxError};
use serde::Serialize;
use std::path::Path;

/// Mode of the scratch directory when children switch identity: the run-as
/// group may enter it but not list it.
pub const SHARED_DIR_MODE: u32 = 0o710;

/// Mode of scripts and blobs handed to the run-as group: read-only for it.
pub const SHARED_FILE_MODE: u32 = 0o640;

/// Resolved account the child switches to before running user code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunAsIdentity {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
}

/// Outcome of resolving `run_as_identity` at sandbox construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityResolution {
    /// Nothing requested
    NotRequested,
    /// Requested account is the one already running
    AlreadyCurrent(String),
    /// Account does not exist on this host
    Unknown(String),
    /// Privilege change is not available on this platform
    Unsupported(String),
    /// Scratch files could not be shared with the account, so the sandbox
    /// lacks the privilege to switch to it
    Unprivileged { name: String, reason: String },
    Switch(RunAsIdentity),
}

impl IdentityResolution {
    pub fn identity(&self) -> Option<&RunAsIdentity> {
        match self {
            IdentityResolution::Switch(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Resolve the configured account name to uid/gid. Never fails: anything
/// that cannot be switched to degrades to "no switch".
#[cfg(unix)]
pub fn resolve_identity(config: &SandboxConfig) -> IdentityResolution {
    use nix::unistd::{geteuid, User};

    let name = match config.requested_identity() {
        Some(name) => name,
        None => return IdentityResolution::NotRequested,
    };

    match User::from_name(name) {
        Ok(Some(user)) if user.uid == geteuid() => IdentityResolution::AlreadyCurrent(name.to_string()),
        Ok(Some(user)) => IdentityResolution::Switch(RunAsIdentity {
            name: name.to_string(),
            uid: user.uid.as_raw(),
            gid: user.gid.as_raw(),
        }),
        Ok(None) => IdentityResolution::Unknown(name.to_string()),
        Err(e) => {
            log::warn!("Failed to look up user '{}': {}", name, e);
            IdentityResolution::Unknown(name.to_string())
        }
    }
}

#[cfg(not(unix))]
pub fn resolve_identity(config: &SandboxConfig) -> IdentityResolution {
    match config.requested_identity() {
        Some(name) => IdentityResolution::Unsupported(name.to_string()),
        None => IdentityResolution::NotRequested,
    }
}

/// Clear groups, then gid, then uid. Runs in the forked child, so it
/// neither allocates nor logs; each step is attempted independently.
#[cfg(unix)]
pub(crate) fn switch_identity_in_child(uid: u32, gid: u32) {
    use nix::unistd::{setgid, setuid, Gid, Uid};

    #[cfg(target_os = "linux")]
    {
        let _ = nix::unistd::setgroups(&[]);
    }
    // gid before uid: after setuid the process may no longer change groups
    let _ = setgid(Gid::from_raw(gid));
    let _ = setuid(Uid::from_raw(uid));
}

/// Give the run-as account's group `mode` access to `path`, which stays
/// owned by the parent. The switched child can then enter the scratch
/// directory and read scripts and dataset blobs without being able to
/// rewrite them.
#[cfg(unix)]
pub fn grant_group_access(path: &Path, identity: &RunAsIdentity, mode: u32) -> Result<()> {
    use nix::unistd::{chown, Gid};
    use std::os::unix::fs::PermissionsExt;

    chown(path, None, Some(Gid::from_raw(identity.gid))).map_err(|e| {
        SandboxError::Privilege(format!(
            "Failed to hand {} to group {} of '{}': {}",
            path.display(),
            identity.gid,
            identity.name,
            e
        ))
    })?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
        SandboxError::Privilege(format!("Failed to set mode {:o} on {}: {}", mode, path.display(), e))
    })
}

#[cfg(not(unix))]
pub fn grant_group_access(_path: &Path, _identity: &RunAsIdentity, _mode: u32) -> Result<()> {
    Ok(())
}
