//! Imported project catalog.
//!
//! `import-projects` validates a JSON array of projects and stores it as
//! `<data_dir>/projects.json`. When that file exists it replaces the inline
//! `[[projects]]` of the config file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use vfxupload_core::ProjectCatalog;

use crate::config::Config;
use crate::history::write_atomic;

pub const CATALOG_FILE: &str = "projects.json";

pub fn catalog_path(config: &Config) -> PathBuf {
    config.data_dir().join(CATALOG_FILE)
}

/// The imported catalog if there is one, else the inline one.
pub fn load_catalog(config: &Config) -> Result<ProjectCatalog> {
    let path = catalog_path(config);
    if path.exists() {
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read project catalog: {:?}", path))?;
        let catalog = ProjectCatalog::from_json(&json)
            .with_context(|| format!("Invalid project catalog: {:?}", path))?;
        tracing::debug!(path = %path.display(), projects = catalog.len(), "loaded imported catalog");
        return Ok(catalog);
    }

    ProjectCatalog::new(config.projects.clone()).context("Invalid [[projects]] in config")
}

/// Validate `source` and store it as the imported catalog. Nothing is
/// written unless every entry is valid.
pub fn import_catalog(config: &Config, source: &Path) -> Result<ProjectCatalog> {
    let json = std::fs::read_to_string(source)
        .with_context(|| format!("Failed to read {:?}", source))?;
    let catalog =
        ProjectCatalog::from_json(&json).with_context(|| format!("Invalid project file {:?}", source))?;

    let path = catalog_path(config);
    let normalized = catalog.to_json()?;
    write_atomic(&path, normalized.as_bytes())
        .with_context(|| format!("Failed to write {:?}", path))?;
    tracing::info!(path = %path.display(), projects = catalog.len(), "project catalog imported");
    Ok(catalog)
}

/// Delete the imported catalog. Returns false when there was none.
pub fn remove_catalog(config: &Config) -> Result<bool> {
    let path = catalog_path(config);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "imported project catalog removed");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", path)),
    }
}
