use crate::config::types::{Result, SandboxError};
use crate::dataset::Dataset;
use crate::kernel::credentials::{grant_group_access, RunAsIdentity, SHARED_FILE_MODE};
use log::{debug, warn};
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File name prefix of dataset blobs in the scratch directory
pub const BLOB_PREFIX: &str = "dataset-";

/// The dataset currently bound to `df`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InjectedDataset {
    pub serialized_blob_path: PathBuf,
    pub row_count: usize,
    pub column_count: usize,
}

/// Holds at most one serialized dataset and renders the prelude that loads it.
#[derive(Debug)]
pub struct DatasetInjector {
    scratch_dir: PathBuf,
    baseline_imports: Vec<String>,
    current: Option<InjectedDataset>,
    /// Account whose group must be able to read blobs
    reader: Option<RunAsIdentity>,
}

impl DatasetInjector {
    pub fn new(scratch_dir: impl Into<PathBuf>, baseline_imports: Vec<String>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            baseline_imports,
            current: None,
            reader: None,
        }
    }

    /// Make every blob readable by `identity`'s group, for children that
    /// switch to it before loading the dataset.
    pub fn readable_by(mut self, identity: Option<RunAsIdentity>) -> Self {
        self.reader = identity;
        self
    }

    pub fn injected(&self) -> Option<&InjectedDataset> {
        self.current.as_ref()
    }

    /// Serialize `dataset` once and make it the active dataset. The previous
    /// blob, if any, is deleted only after the new one is in place.
    pub fn inject(&mut self, dataset: &dyn Dataset) -> Result<&InjectedDataset> {
        let (row_count, column_count) = dataset.shape();
        let target = self
            .scratch_dir
            .join(format!("{}{}.json", BLOB_PREFIX, uuid::Uuid::new_v4()));

        // The prelude embeds the path as a string literal
        if target.to_str().is_none() {
            return Err(SandboxError::Dataset(format!(
                "scratch path is not valid UTF-8: {}",
                target.display()
            )));
        }

        atomic_write_blob(&target, dataset, self.reader.as_ref())?;

        if let Some(previous) = self.current.take() {
            remove_blob(&previous.serialized_blob_path);
        }

        debug!(
            "Dataset injected: {} rows, {} columns at {}",
            row_count,
            column_count,
            target.display()
        );

        Ok(&*self.current.insert(InjectedDataset {
            serialized_blob_path: target,
            row_count,
            column_count,
        }))
    }

    /// Delete the blob and forget it. Safe to call repeatedly.
    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            remove_blob(&previous.serialized_blob_path);
            debug!("Injected dataset cleared");
        }
    }

    /// Source prepended to every script: baseline imports, then the loader
    /// binding `df` when a dataset is injected.
    pub fn build_prelude(&self) -> String {
        let mut prelude = String::new();
        for line in &self.baseline_imports {
            prelude.push_str(line);
            prelude.push('\n');
        }

        if let Some(dataset) = &self.current {
            let path = dataset.serialized_blob_path.to_string_lossy();
            // JSON string escaping is a valid Python string literal
            let literal = serde_json::to_string(&*path).unwrap_or_else(|_| format!("{:?}", path));
            prelude.push_str(&format!(
                "import json as _sb_json\n\
                 import pandas as _sb_pd\n\
                 with open({literal}, \"r\", encoding=\"utf-8\") as _sb_fh:\n    \
                 _sb_blob = _sb_json.load(_sb_fh)\n\
                 df = _sb_pd.DataFrame(_sb_blob[\"data\"], columns=_sb_blob[\"columns\"])\n\
                 del _sb_json, _sb_pd, _sb_fh, _sb_blob\n"
            ));
        }

        prelude
    }
}

impl Drop for DatasetInjector {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Write to a sibling temp file, fsync, then rename into place.
fn atomic_write_blob(target: &Path, dataset: &dyn Dataset, reader: Option<&RunAsIdentity>) -> Result<()> {
    let temp_path = target.with_extension("json.tmp");

    let written = (|| -> Result<()> {
        let file = fs::File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        dataset.write_blob(&mut writer)?;
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| SandboxError::Dataset(format!("Failed to flush dataset blob: {}", e)))?;
        file.sync_all()?;
        if let Some(identity) = reader {
            grant_group_access(&temp_path, identity, SHARED_FILE_MODE)?;
        }
        fs::rename(&temp_path, target)?;
        Ok(())
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(SandboxError::Dataset(format!(
            "Failed to write dataset blob {}: {}",
            target.display(),
            e
        )));
    }
    Ok(())
}

fn remove_blob(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove dataset blob {}: {}", path.display(), e),
    }
}
