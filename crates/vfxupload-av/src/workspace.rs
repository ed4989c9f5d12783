//! Scratch space for downloaded companion audio.
//!
//! A [`Workspace`] owns a temporary directory that is deleted when the
//! workspace is dropped, so every exit path of a mux cleans up after itself.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use vfxupload_core::{Error, Result};

pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Create a fresh `vfx-upload-*` directory under the system temp dir.
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("vfx-upload-")
            .tempdir()
            .map_err(|e| Error::tool("workspace", format!("failed to create temp dir: {e}")))?;
        Ok(Self { temp_dir })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path for a named file inside the workspace. Only the final component
    /// of `name` is used.
    pub fn file(&self, name: &str) -> PathBuf {
        let base = Path::new(name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "file".into());
        self.temp_dir.path().join(base)
    }
}
