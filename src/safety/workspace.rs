/// Run-scoped scratch artifacts
///
/// Every execution gets its own script and capture files, named from the
/// parent pid plus a per-call UUID so concurrent calls never collide.
use crate::config::types::{Result, SandboxError};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// File name prefix of per-run artifacts in the scratch directory
pub const RUN_PREFIX: &str = "run-";

/// Create the scratch directory if needed (owner-only on Unix).
pub fn ensure_scratch_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| {
        SandboxError::Scratch(format!("Failed to create scratch directory {}: {}", dir.display(), e))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
            log::warn!("Failed to restrict scratch directory {}: {}", dir.display(), e);
        }
    }

    Ok(())
}

/// Script and output captures for one execution. Dropping the workspace
/// removes all of them.
#[derive(Debug)]
pub struct RunWorkspace {
    script: PathBuf,
    stdout: PathBuf,
    stderr: PathBuf,
}

impl RunWorkspace {
    pub fn new(scratch_dir: &Path, run_id: &str) -> Self {
        let stem = format!("{}{}-{}", RUN_PREFIX, std::process::id(), run_id);
        Self {
            script: scratch_dir.join(format!("{}.py", stem)),
            stdout: scratch_dir.join(format!("{}.stdout", stem)),
            stderr: scratch_dir.join(format!("{}.stderr", stem)),
        }
    }

    pub fn script_path(&self) -> &Path {
        &self.script
    }

    pub fn stdout_path(&self) -> &Path {
        &self.stdout
    }

    pub fn stderr_path(&self) -> &Path {
        &self.stderr
    }

    /// Write the full script. Fails if a file of that name already exists.
    pub fn write_script(&self, content: &str) -> Result<()> {
        let mut file = create_new(&self.script)?;
        file.write_all(content.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| SandboxError::Scratch(format!("Failed to write script {}: {}", self.script.display(), e)))
    }

    /// Fresh files for the child's stdout and stderr.
    pub fn create_captures(&self) -> Result<(File, File)> {
        Ok((create_new(&self.stdout)?, create_new(&self.stderr)?))
    }

    /// Remove every artifact. Idempotent; failures are logged.
    pub fn cleanup(&self) {
        for path in [&self.script, &self.stdout, &self.stderr] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove scratch file {}: {}", path.display(), e),
            }
        }
    }
}

impl Drop for RunWorkspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn create_new(path: &Path) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
        .open(path)
        .map_err(|e| SandboxError::Scratch(format!("Failed to create {}: {}", path.display(), e)))
}

/// Captured stream content, bounded.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Capture {
    pub bytes: Vec<u8>,
    pub truncated: bool,
}

/// Read at most `limit` bytes of a capture file. A missing file reads as empty.
pub fn read_capture(path: &Path, limit: u64) -> Result<Capture> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Capture::default()),
        Err(e) => return Err(SandboxError::Io(e)),
    };

    let total = file.metadata().map(|m| m.len()).unwrap_or(0);
    let mut bytes = Vec::new();
    file.take(limit).read_to_end(&mut bytes)?;

    Ok(Capture {
        truncated: total > bytes.len() as u64,
        bytes,
    })
}
