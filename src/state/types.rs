use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use vfxupload_core::{parse_file_name, ColorSpace, JobId, ParsedFileName, Project, ProjectCatalog};

/// One render file moving through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    /// Local render file. Never changes after the job is created.
    pub source: PathBuf,
    pub file_name: String,
    pub parsed: Option<ParsedFileName>,
    pub project: Option<Project>,
    /// Object key inside the project bucket. Empty until resolved or set by
    /// hand.
    pub destination: String,
    pub color_space: ColorSpace,
    pub status: JobStatus,
    pub muxed_file: Option<PathBuf>,
    pub tagged_file: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a pending job for `source`, matching its project by the
    /// episode number in the file name.
    pub fn new(source: PathBuf, catalog: &ProjectCatalog, default_color_space: ColorSpace) -> Self {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let parsed = parse_file_name(&file_name);
        let project = parsed
            .as_ref()
            .and_then(ParsedFileName::episode_number)
            .and_then(|ep| catalog.find_by_episode(ep))
            .cloned();
        let color_space = project
            .as_ref()
            .map(|p| p.color_space)
            .unwrap_or(default_color_space);

        Self {
            id: JobId::new(),
            source,
            file_name,
            parsed,
            project,
            destination: String::new(),
            color_space,
            status: JobStatus::Pending,
            muxed_file: None,
            tagged_file: None,
            created_at: Utc::now(),
        }
    }

    /// The file that will actually be uploaded: tagged, then muxed, then the
    /// untouched source.
    pub fn file_to_upload(&self) -> &Path {
        self.tagged_file
            .as_deref()
            .or(self.muxed_file.as_deref())
            .unwrap_or(&self.source)
    }

    pub fn has_artifacts(&self) -> bool {
        self.muxed_file.is_some() || self.tagged_file.is_some()
    }

    /// `s3://bucket/key` for jobs with a project and a destination.
    pub fn remote_uri(&self) -> Option<String> {
        let project = self.project.as_ref()?;
        if self.destination.is_empty() {
            return None;
        }
        Some(format!("s3://{}/{}", project.bucket, self.destination))
    }

    /// Pending with a destination: the only jobs a tag batch picks up.
    pub fn is_tagging_candidate(&self) -> bool {
        matches!(self.status, JobStatus::Pending) && !self.destination.is_empty()
    }

    /// Name the source would be uploaded under: the canonical shot name when
    /// the file name parsed, otherwise the file name itself.
    pub fn upload_name(&self) -> String {
        self.parsed
            .as_ref()
            .map(ParsedFileName::canonical_file_name)
            .unwrap_or_else(|| self.file_name.clone())
    }

    /// Drop artifact paths from an earlier tag pass. A destination that was
    /// renamed after one of them goes back to the source's upload name.
    pub fn forget_artifacts(&mut self) {
        let current = self.destination.rsplit('/').next().unwrap_or_default();
        let named_after_artifact = !current.is_empty()
            && [&self.muxed_file, &self.tagged_file]
                .into_iter()
                .flatten()
                .filter_map(|p| p.file_name())
                .any(|n| n.to_string_lossy() == current);
        if named_after_artifact {
            let name = self.upload_name();
            self.set_destination_file_name(&name);
        }
        self.muxed_file = None;
        self.tagged_file = None;
    }

    /// Replace the final component of the destination key.
    pub fn set_destination_file_name(&mut self, name: &str) {
        self.destination = match self.destination.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{name}"),
            None => name.to_string(),
        };
    }
}

/// Why a job failed. Drives which recovery the front end offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Destination could not be resolved; the path can be edited by hand.
    Resolution,
    Tagging,
    Upload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn resolution(err: impl fmt::Display) -> Self {
        Self {
            kind: FailureKind::Resolution,
            message: format!("Path resolution: {err}"),
        }
    }

    pub fn tagging(err: impl fmt::Display) -> Self {
        Self {
            kind: FailureKind::Tagging,
            message: format!("Tag failed: {err}"),
        }
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Upload,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum JobStatus {
    Pending,
    ResolvingPath,
    MuxingAudio,
    TaggingColor,
    Tagged,
    Uploading { progress: f64 },
    Completed,
    Failed(JobFailure),
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::ResolvingPath => "resolvingPath",
            JobStatus::MuxingAudio => "muxingAudio",
            JobStatus::TaggingColor => "taggingColor",
            JobStatus::Tagged => "tagged",
            JobStatus::Uploading { .. } => "uploading",
            JobStatus::Completed => "completed",
            JobStatus::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed(_))
    }

    pub fn progress(&self) -> Option<f64> {
        match self {
            JobStatus::Uploading { progress } => Some(*progress),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        match self {
            JobStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Legal pipeline transitions. Leaving `failed` is not a transition; it
    /// goes through [`JobStore::reset`](super::JobStore::reset).
    pub fn can_transition_to(&self, next: &JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Completed | Failed(_), _) => false,
            (_, Failed(_)) => true,
            (Pending, ResolvingPath | MuxingAudio) => true,
            (ResolvingPath, Pending) => true,
            (MuxingAudio, TaggingColor | Tagged) => true,
            (TaggingColor, Tagged) => true,
            (Tagged, Uploading { .. }) => true,
            (Uploading { .. }, Uploading { .. } | Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Uploading { progress } => {
                write!(f, "uploading ({:.0}%)", progress * 100.0)
            }
            JobStatus::Failed(failure) => write!(f, "failed: {failure}"),
            other => f.write_str(other.label()),
        }
    }
}
