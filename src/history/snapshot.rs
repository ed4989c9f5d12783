//! On-disk projection of a job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vfxupload_core::{parse_file_name, ColorSpace, JobId, ParsedFileName, ProjectCatalog};

use crate::state::{FailureKind, Job, JobFailure, JobStatus};

/// Status as stored. In-flight work has no representation and is saved as
/// `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistedStatus {
    Pending,
    Tagged,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedJob {
    pub id: JobId,
    pub source: PathBuf,
    pub file_name: String,
    #[serde(default)]
    pub destination: String,
    /// Color space selector, e.g. `P3-D65-PQ`.
    pub color_space: String,
    pub status: PersistedStatus,
    /// Used to look the project up again on load.
    #[serde(default)]
    pub episode_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muxed_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagged_file: Option<PathBuf>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl PersistedJob {
    pub fn from_job(job: &Job) -> Self {
        let (status, failure) = match &job.status {
            JobStatus::Tagged => (PersistedStatus::Tagged, None),
            JobStatus::Completed => (PersistedStatus::Completed, None),
            JobStatus::Failed(failure) => (PersistedStatus::Failed, Some(failure)),
            _ => (PersistedStatus::Pending, None),
        };
        let episode_number = job
            .project
            .as_ref()
            .map(|p| p.episode_number)
            .or_else(|| job.parsed.as_ref().and_then(ParsedFileName::episode_number));

        Self {
            id: job.id,
            source: job.source.clone(),
            file_name: job.file_name.clone(),
            destination: job.destination.clone(),
            color_space: job.color_space.as_str().to_string(),
            status,
            episode_number,
            failure_message: failure.map(|f| f.message.clone()),
            failure_kind: failure.map(|f| f.kind),
            muxed_file: job.muxed_file.clone(),
            tagged_file: job.tagged_file.clone(),
            created_at: job.created_at,
        }
    }

    /// Rebuild a job against the current catalog.
    ///
    /// Artifacts that no longer exist on disk are dropped, and a `tagged`
    /// entry left without any artifact goes back to `pending` so it is
    /// tagged again instead of uploading the untouched source.
    pub fn into_job(self, catalog: &ProjectCatalog) -> Job {
        let parsed = parse_file_name(&self.file_name);
        let project = self
            .episode_number
            .or_else(|| parsed.as_ref().and_then(ParsedFileName::episode_number))
            .and_then(|ep| catalog.find_by_episode(ep))
            .cloned();
        let (muxed_file, lost_muxed) = split_missing(self.muxed_file);
        let (tagged_file, lost_tagged) = split_missing(self.tagged_file);

        let status = match self.status {
            PersistedStatus::Pending => JobStatus::Pending,
            PersistedStatus::Tagged if muxed_file.is_none() && tagged_file.is_none() => {
                JobStatus::Pending
            }
            PersistedStatus::Tagged => JobStatus::Tagged,
            PersistedStatus::Completed => JobStatus::Completed,
            PersistedStatus::Failed => JobStatus::Failed(JobFailure {
                kind: self.failure_kind.unwrap_or(FailureKind::Tagging),
                message: self
                    .failure_message
                    .unwrap_or_else(|| "Unknown error".to_string()),
            }),
        };

        let mut job = Job {
            id: self.id,
            source: self.source,
            file_name: self.file_name,
            parsed,
            project,
            destination: self.destination,
            color_space: ColorSpace::from_selector_lossy(&self.color_space),
            status,
            muxed_file,
            tagged_file,
            created_at: self.created_at,
        };

        // A destination named after an artifact that no longer exists would
        // upload the source under the artifact's name.
        let current = job.destination.rsplit('/').next().unwrap_or_default();
        let named_after_lost = !current.is_empty()
            && [lost_muxed, lost_tagged]
                .iter()
                .flatten()
                .filter_map(|p| p.file_name())
                .any(|n| n.to_string_lossy() == current);
        if named_after_lost {
            let name = job.upload_name();
            job.set_destination_file_name(&name);
        }
        job
    }
}

/// Split a recorded artifact into (still on disk, gone).
fn split_missing(path: Option<PathBuf>) -> (Option<PathBuf>, Option<PathBuf>) {
    match path {
        Some(p) if p.exists() => (Some(p), None),
        other => (None, other),
    }
}
