use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use vfxupload_av::{MediaProber, Transcoder};
use vfxupload_core::{BatchStage, Error, JobId, PipelineEvent, Result};

use super::resolver::PathResolver;
use super::scheduler::{run_bounded, MAX_CONCURRENT};
use super::tagging::Tagger;
use super::upload::Uploader;
use crate::state::{Job, JobFailure, JobStatus, JobStore};
use crate::store::ObjectStore;

/// Outcome counts for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub stage: BatchStage,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Drives jobs through resolution, tagging, and upload.
///
/// Only one tag or upload batch runs at a time; [`is_busy`](Self::is_busy)
/// tells a front end when quitting must be refused.
pub struct UploadManager {
    jobs: Arc<JobStore>,
    store: Arc<dyn ObjectStore>,
    resolver: Arc<PathResolver>,
    tagger: Tagger,
    uploader: Uploader,
    busy: AtomicBool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl UploadManager {
    pub fn new(
        jobs: Arc<JobStore>,
        store: Arc<dyn ObjectStore>,
        prober: Arc<dyn MediaProber>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let resolver = Arc::new(PathResolver::new(store.clone()));
        Self::with_resolver(jobs, store, resolver, prober, transcoder)
    }

    pub fn with_resolver(
        jobs: Arc<JobStore>,
        store: Arc<dyn ObjectStore>,
        resolver: Arc<PathResolver>,
        prober: Arc<dyn MediaProber>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let tagger = Tagger::new(store.clone(), resolver.clone(), prober, transcoder);
        let uploader = Uploader::new(store.clone());
        Self {
            jobs,
            store,
            resolver,
            tagger,
            uploader,
            busy: AtomicBool::new(false),
        }
    }

    pub fn jobs(&self) -> &Arc<JobStore> {
        &self.jobs
    }

    pub fn resolver(&self) -> &Arc<PathResolver> {
        &self.resolver
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn begin_batch(&self) -> Result<BusyGuard<'_>> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(Error::Validation("a batch is already running".into()));
        }
        Ok(BusyGuard(&self.busy))
    }

    /// Resolve one job's destination. On failure the destination is cleared
    /// and the job fails with a resolution error.
    pub async fn resolve_path(&self, id: JobId) -> Result<()> {
        let job = self.job(id)?;
        self.jobs.set_status(id, JobStatus::ResolvingPath)?;
        match self.resolver.resolve(&job).await {
            Ok(key) => {
                tracing::info!(job_id = %id.short(), destination = %key, "destination resolved");
                self.jobs.update(id, |j| j.destination = key)?;
                self.jobs.set_status(id, JobStatus::Pending)
            }
            Err(e) => {
                self.jobs.update(id, |j| j.destination.clear())?;
                self.jobs
                    .set_status(id, JobStatus::Failed(JobFailure::resolution(e)))
            }
        }
    }

    /// Resolve every pending job that has a shot identity and a project but
    /// no destination yet. Jobs without an identity stay pending until a
    /// destination is set by hand.
    pub async fn resolve_all(&self) -> BatchSummary {
        let ids = self.select(|j| {
            j.status == JobStatus::Pending
                && j.destination.is_empty()
                && j.parsed.is_some()
                && j.project.is_some()
        });
        self.run_stage(BatchStage::Resolve, ids, |id| async move {
            if let Err(e) = self.resolve_path(id).await {
                tracing::error!(job_id = %id.short(), "path resolution aborted: {e}");
            }
        })
        .await
    }

    /// Tag every pending job with a destination.
    pub async fn tag_all(&self) -> Result<BatchSummary> {
        let _guard = self.begin_batch()?;
        let ids = self.select(Job::is_tagging_candidate);
        Ok(self
            .run_stage(BatchStage::Tag, ids, |id| async move {
                if let Err(e) = self.tagger.tag_job(&self.jobs, id).await {
                    tracing::error!(job_id = %id.short(), "tagging aborted: {e}");
                    self.fail_if_running(id, JobFailure::tagging(&e));
                }
            })
            .await)
    }

    /// Upload every tagged job.
    pub async fn upload_all(&self) -> Result<BatchSummary> {
        let _guard = self.begin_batch()?;
        let ids = self.select(|j| j.status == JobStatus::Tagged);
        Ok(self
            .run_stage(BatchStage::Upload, ids, |id| async move {
                if let Err(e) = self.uploader.upload_job(&self.jobs, id).await {
                    tracing::error!(job_id = %id.short(), "upload aborted: {e}");
                    self.fail_if_running(id, JobFailure::upload(e.to_string()));
                }
            })
            .await)
    }

    /// `s3://bucket/key` of a job's destination.
    pub fn remote_uri(&self, id: JobId) -> Result<String> {
        self.job(id)?
            .remote_uri()
            .ok_or_else(|| Error::Validation("job has no project or destination".into()))
    }

    /// Delete an uploaded object and drop its job.
    pub async fn delete_remote(&self, id: JobId) -> Result<()> {
        let (job, bucket) = self.uploaded(id)?;
        self.store.delete(&bucket, &job.destination).await?;
        tracing::info!(job_id = %id.short(), key = %job.destination, "remote object deleted");
        self.jobs.remove(id)?;
        Ok(())
    }

    /// Rename an uploaded object by copy then delete, keeping the job's
    /// destination in step.
    pub async fn rename_remote(&self, id: JobId, new_name: &str) -> Result<Job> {
        let new_name = new_name.trim();
        if new_name.is_empty() || new_name.contains('/') {
            return Err(Error::Validation(format!(
                "'{new_name}' is not a valid file name"
            )));
        }
        let (job, bucket) = self.uploaded(id)?;
        let mut renamed = job.clone();
        renamed.set_destination_file_name(new_name);
        if renamed.destination == job.destination {
            return Ok(job);
        }
        if self.store.exists(&bucket, &renamed.destination).await? {
            return Err(Error::Validation(format!(
                "s3://{bucket}/{} already exists",
                renamed.destination
            )));
        }

        self.store
            .copy(&bucket, &job.destination, &renamed.destination)
            .await?;
        self.store.delete(&bucket, &job.destination).await?;
        tracing::info!(
            job_id = %id.short(),
            from = %job.destination,
            to = %renamed.destination,
            "remote object renamed"
        );

        let updated = self
            .jobs
            .update(id, |j| j.destination = renamed.destination.clone())?;
        self.jobs.persist();
        Ok(updated)
    }

    fn job(&self, id: JobId) -> Result<Job> {
        self.jobs.get(id).ok_or_else(|| Error::not_found("job", id))
    }

    /// A completed job with a project, and its bucket.
    fn uploaded(&self, id: JobId) -> Result<(Job, String)> {
        let job = self.job(id)?;
        if job.status != JobStatus::Completed {
            return Err(Error::Validation(format!(
                "job is {}, not completed",
                job.status.label()
            )));
        }
        let bucket = match &job.project {
            Some(project) if !job.destination.is_empty() => project.bucket.clone(),
            _ => return Err(Error::Validation("job has no project or destination".into())),
        };
        Ok((job, bucket))
    }

    fn select(&self, pred: impl Fn(&Job) -> bool) -> Vec<JobId> {
        self.jobs
            .list()
            .iter()
            .filter(|j| pred(j))
            .map(|j| j.id)
            .collect()
    }

    fn fail_if_running(&self, id: JobId, failure: JobFailure) {
        let running = self
            .jobs
            .get(id)
            .is_some_and(|j| !j.status.is_terminal());
        if running {
            if let Err(e) = self.jobs.set_status(id, JobStatus::Failed(failure)) {
                tracing::error!(job_id = %id.short(), "could not mark job failed: {e}");
            }
        }
    }

    async fn run_stage<F, Fut>(&self, stage: BatchStage, ids: Vec<JobId>, op: F) -> BatchSummary
    where
        F: Fn(JobId) -> Fut,
        Fut: Future<Output = ()>,
    {
        let total = ids.len();
        let events = self.jobs.events();
        if total > 0 {
            tracing::info!(%stage, total, "batch started");
        }
        events.publish(PipelineEvent::BatchStarted { stage, total });

        run_bounded(ids.clone(), MAX_CONCURRENT, op, |completed, total| {
            events.publish(PipelineEvent::BatchProgress {
                stage,
                completed,
                total,
            });
        })
        .await;

        let failed = ids
            .iter()
            .filter_map(|id| self.jobs.get(*id))
            .filter(|j| matches!(j.status, JobStatus::Failed(_)))
            .count();
        events.publish(PipelineEvent::BatchFinished { stage, total });
        let summary = BatchSummary {
            stage,
            total,
            succeeded: total - failed,
            failed,
        };
        if total > 0 {
            tracing::info!(%stage, total, failed, "batch finished");
        }
        summary
    }
}
