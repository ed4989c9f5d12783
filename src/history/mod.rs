//! Job history persistence.
//!
//! The whole job set is written as one JSON array to
//! `<data_dir>/job-history.json`. Writes go through a temporary file in the
//! same directory and are renamed into place, so a crash mid-write leaves
//! the previous snapshot intact.

mod snapshot;

pub use snapshot::{PersistedJob, PersistedStatus};

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use vfxupload_core::{ProjectCatalog, Result};

use crate::state::Job;

pub const HISTORY_FILE: &str = "job-history.json";

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(HISTORY_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, jobs: &[Job]) -> Result<()> {
        let entries: Vec<PersistedJob> = jobs.iter().map(PersistedJob::from_job).collect();
        let json = serde_json::to_vec_pretty(&entries)?;
        write_atomic(&self.path, &json)?;
        tracing::debug!(path = %self.path.display(), jobs = entries.len(), "job history saved");
        Ok(())
    }

    /// Stored entries. A missing file is an empty history; an unreadable one
    /// is logged and treated the same.
    pub fn load(&self) -> Vec<PersistedJob> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "failed to read job history: {e}");
                return Vec::new();
            }
        };
        match serde_json::from_slice(&data) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "ignoring corrupt job history: {e}");
                Vec::new()
            }
        }
    }

    pub fn restore(&self, catalog: &ProjectCatalog) -> Vec<Job> {
        let jobs: Vec<Job> = self
            .load()
            .into_iter()
            .map(|entry| entry.into_job(catalog))
            .collect();
        if !jobs.is_empty() {
            tracing::info!(jobs = jobs.len(), "restored job history");
        }
        jobs
    }
}

/// Replace `path` with `contents` in one rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
