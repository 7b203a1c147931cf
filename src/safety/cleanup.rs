/// Stale scratch sweep
///
/// Removes leftovers of crashed runs. Only files carrying one of the given
/// prefixes are considered; anything else in the directory is left alone.
use log::{debug, info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: Vec<PathBuf>,
    pub failures: Vec<String>,
}

/// Remove regular files in `dir` whose name starts with one of `prefixes`
/// and whose mtime is older than `max_age`, except paths listed in `keep`.
/// Never fails; problems are collected in the report and logged.
pub fn sweep_stale(dir: &Path, prefixes: &[&str], max_age: Duration, keep: &[&Path]) -> SweepReport {
    let mut report = SweepReport::default();
    let now = SystemTime::now();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            report.failures.push(format!("read_dir {}: {}", dir.display(), e));
            warn!("Scratch sweep skipped for {}: {}", dir.display(), e);
            return report;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !prefixes.iter().any(|prefix| name.starts_with(prefix)) {
            continue;
        }
        if keep.iter().any(|kept| *kept == entry.path().as_path()) {
            continue;
        }
        report.scanned += 1;

        // symlink_metadata: never follow links out of the scratch dir
        let metadata = match fs::symlink_metadata(entry.path()) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(e) => {
                report.failures.push(format!("stat {}: {}", entry.path().display(), e));
                continue;
            }
        };

        let age = metadata
            .modified()
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok())
            .unwrap_or(Duration::ZERO);
        if age <= max_age {
            continue;
        }

        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed stale scratch file {} (age {:?})", path.display(), age);
                report.removed.push(path);
            }
            Err(e) => report.failures.push(format!("remove {}: {}", path.display(), e)),
        }
    }

    if !report.removed.is_empty() || !report.failures.is_empty() {
        info!(
            "Scratch sweep of {}: removed {}, failed {}",
            dir.display(),
            report.removed.len(),
            report.failures.len()
        );
    }
    report
}
