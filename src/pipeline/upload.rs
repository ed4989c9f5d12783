use std::sync::Arc;

use vfxupload_core::{Error, JobId, Result};

use crate::state::{JobFailure, JobStatus, JobStore};
use crate::store::ObjectStore;

/// Metadata key carrying the color space selector on uploaded objects.
pub const COLOR_SPACE_METADATA: &str = "color-space";

/// Runs one `tagged` job to `completed` (or `failed`).
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn upload_job(&self, jobs: &JobStore, id: JobId) -> Result<()> {
        let job = jobs.get(id).ok_or_else(|| Error::not_found("job", id))?;
        jobs.set_status(id, JobStatus::Uploading { progress: 0.0 })?;

        let Some(project) = &job.project else {
            return jobs.set_status(
                id,
                JobStatus::Failed(JobFailure::upload("No project assigned")),
            );
        };

        let file = job.file_to_upload();
        tracing::info!(
            job_id = %id.short(),
            file = %file.display(),
            destination = %format!("s3://{}/{}", project.bucket, job.destination),
            "upload started"
        );

        let metadata = [(
            COLOR_SPACE_METADATA.to_string(),
            job.color_space.as_str().to_string(),
        )];
        let report = |progress: f64| {
            if let Err(e) = jobs.set_status(id, JobStatus::Uploading { progress }) {
                tracing::debug!(job_id = %id.short(), "dropping progress update: {e}");
            }
        };

        match self
            .store
            .upload(file, &project.bucket, &job.destination, &metadata, &report)
            .await
        {
            Ok(()) => jobs.set_status(id, JobStatus::Completed),
            Err(e) => jobs.set_status(id, JobStatus::Failed(JobFailure::upload(e.to_string()))),
        }
    }
}
