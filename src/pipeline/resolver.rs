//! Destination path resolution.
//!
//! Shot folders sit directly under a project's base path and are named after
//! the shot, sometimes with extra tokens in front (`MYSHOW_205_001_na`,
//! `X_201_052_bluebird`). The folder listing per project is cached for
//! [`CACHE_TTL`]; concurrent lookups for the same project wait on one
//! listing instead of each issuing their own.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use vfxupload_core::{Error, Project};

use crate::state::Job;
use crate::store::ObjectStore;

pub const CACHE_TTL: Duration = Duration::from_secs(300);

/// Extensions accepted as companion audio in a plates folder.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "aif", "aiff"];

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Could not parse filename")]
    CannotParse,
    #[error("No shot folder matching '{0}'")]
    ShotNotFound(String),
    #[error(transparent)]
    Listing(#[from] Error),
}

impl From<ResolveError> for Error {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Listing(e) => e,
            ResolveError::ShotNotFound(prefix) => Error::not_found("shot folder", prefix),
            ResolveError::CannotParse => Error::Validation("Could not parse filename".into()),
        }
    }
}

struct CacheEntry {
    folders: Vec<String>,
    fetched_at: Instant,
}

type CacheSlot = Arc<tokio::sync::Mutex<Option<CacheEntry>>>;

pub struct PathResolver {
    store: Arc<dyn ObjectStore>,
    ttl: Duration,
    cache: parking_lot::Mutex<HashMap<String, CacheSlot>>,
}

impl PathResolver {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_ttl(store, CACHE_TTL)
    }

    pub fn with_ttl(store: Arc<dyn ObjectStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cache: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Destination key for a job:
    /// `{base}/{shot folder}/{vfx folder}/{canonical file name}`.
    pub async fn resolve(&self, job: &Job) -> Result<String, ResolveError> {
        let (Some(parsed), Some(project)) = (&job.parsed, &job.project) else {
            return Err(ResolveError::CannotParse);
        };
        let folder = self.find_shot_folder(project, &parsed.shot_prefix()).await?;
        Ok(format!(
            "{}/{}/{}/{}",
            project.base(),
            folder,
            project.vfx_folder,
            parsed.canonical_file_name()
        ))
    }

    pub async fn find_shot_folder(
        &self,
        project: &Project,
        shot_prefix: &str,
    ) -> Result<String, ResolveError> {
        let folders = self.shot_folders(project).await?;
        match_shot_folder(&folders, shot_prefix)
            .map(str::to_string)
            .ok_or_else(|| ResolveError::ShotNotFound(shot_prefix.to_string()))
    }

    /// Audio files in a shot's plates folder. Not cached.
    pub async fn find_plates_audio(
        &self,
        project: &Project,
        shot_folder: &str,
    ) -> Result<Vec<String>, ResolveError> {
        let prefix = format!(
            "{}/{}/{}/",
            project.base(),
            shot_folder,
            project.plates_folder
        );
        let listing = self.store.list(&project.bucket, &prefix).await?;
        Ok(listing
            .into_iter()
            .filter(|entry| !entry.is_folder() && is_audio_file(entry.name()))
            .map(|entry| entry.name().to_string())
            .collect())
    }

    /// When the folder listing for `project_id` was last fetched.
    pub fn cached_at(&self, project_id: &str) -> Option<Instant> {
        let slot = self.cache.lock().get(project_id).cloned()?;
        let entry = slot.try_lock().ok()?;
        entry.as_ref().map(|e| e.fetched_at)
    }

    pub fn invalidate(&self, project_id: &str) {
        self.cache.lock().remove(project_id);
    }

    fn slot(&self, project_id: &str) -> CacheSlot {
        self.cache
            .lock()
            .entry(project_id.to_string())
            .or_default()
            .clone()
    }

    async fn shot_folders(&self, project: &Project) -> Result<Vec<String>, Error> {
        let slot = self.slot(&project.id);
        let mut entry = slot.lock().await;
        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.folders.clone());
            }
        }

        let prefix = format!("{}/", project.base());
        let folders: Vec<String> = self
            .store
            .list(&project.bucket, &prefix)
            .await?
            .into_iter()
            .filter(|e| e.is_folder())
            .map(|e| e.name().to_string())
            .collect();
        tracing::debug!(project = %project.id, folders = folders.len(), "listed shot folders");

        *entry = Some(CacheEntry {
            folders: folders.clone(),
            fetched_at: Instant::now(),
        });
        Ok(folders)
    }
}

/// First folder whose name starts with `shot_prefix`, or contains it right
/// after an underscore. Case-insensitive.
pub fn match_shot_folder<'a>(folders: &'a [String], shot_prefix: &str) -> Option<&'a str> {
    let prefix = shot_prefix.to_lowercase();
    let after_token = format!("_{prefix}");
    folders
        .iter()
        .find(|folder| {
            let lower = folder.to_lowercase();
            lower.starts_with(&prefix) || lower.contains(&after_token)
        })
        .map(String::as_str)
}

fn is_audio_file(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}
