mod types;

pub use types::*;

use parking_lot::RwLock;
use std::sync::Arc;
use vfxupload_core::{ColorSpace, Error, EventBus, JobId, PipelineEvent, Result};

use crate::history::HistoryStore;

/// The authoritative job set.
///
/// Every mutation goes through here so status changes are validated,
/// published on the event bus, and snapshotted to the history file. The lock
/// is never held across an await point.
pub struct JobStore {
    jobs: RwLock<Vec<Job>>,
    events: Arc<EventBus>,
    history: Option<HistoryStore>,
}

impl JobStore {
    /// In-memory store without persistence.
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            jobs: RwLock::new(Vec::new()),
            events,
            history: None,
        }
    }

    /// Store seeded with restored jobs that snapshots to `history`.
    pub fn with_history(jobs: Vec<Job>, events: Arc<EventBus>, history: HistoryStore) -> Self {
        Self {
            jobs: RwLock::new(jobs),
            events,
            history: Some(history),
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Queue a job. A source that is already queued and not finished is
    /// rejected.
    pub fn add(&self, job: Job) -> Result<JobId> {
        let id = job.id;
        let file_name = job.file_name.clone();
        {
            let mut jobs = self.jobs.write();
            if jobs
                .iter()
                .any(|j| j.source == job.source && !j.status.is_terminal())
            {
                return Err(Error::Validation(format!(
                    "{} is already queued",
                    job.source.display()
                )));
            }
            jobs.push(job);
        }
        tracing::info!(job_id = %id.short(), file = %file_name, "job added");
        self.events.publish(PipelineEvent::JobAdded {
            job_id: id,
            file_name,
        });
        self.persist();
        Ok(id)
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.read().iter().find(|j| j.id == id).cloned()
    }

    pub fn list(&self) -> Vec<Job> {
        self.jobs.read().clone()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Look a job up by full id or by a unique id prefix.
    pub fn find(&self, query: &str) -> Result<Job> {
        let query = query.trim().to_ascii_lowercase();
        if query.is_empty() {
            return Err(Error::Validation("empty job id".into()));
        }
        let jobs = self.jobs.read();
        let mut matches = jobs.iter().filter(|j| {
            let full = j.id.to_string();
            full.starts_with(&query) || full.replace('-', "").starts_with(&query)
        });
        match (matches.next(), matches.next()) {
            (Some(job), None) => Ok(job.clone()),
            (Some(_), Some(_)) => Err(Error::Validation(format!(
                "job id '{query}' is ambiguous"
            ))),
            (None, _) => Err(Error::not_found("job", &query)),
        }
    }

    /// Move a job to `status`, rejecting illegal transitions.
    pub fn set_status(&self, id: JobId, status: JobStatus) -> Result<()> {
        {
            let mut jobs = self.jobs.write();
            let job = find_mut(&mut jobs, id)?;
            if !job.status.can_transition_to(&status) {
                return Err(Error::invalid_transition(job.status.label(), status.label()));
            }
            job.status = status.clone();
        }
        self.status_changed(id, &status);
        Ok(())
    }

    /// Apply `f` to a job's fields. Status changes belong in
    /// [`set_status`](Self::set_status).
    pub fn update<F>(&self, id: JobId, f: F) -> Result<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write();
        let job = find_mut(&mut jobs, id)?;
        f(job);
        Ok(job.clone())
    }

    pub fn remove(&self, id: JobId) -> Result<Job> {
        let removed = {
            let mut jobs = self.jobs.write();
            let idx = jobs
                .iter()
                .position(|j| j.id == id)
                .ok_or_else(|| Error::not_found("job", id))?;
            jobs.remove(idx)
        };
        tracing::info!(job_id = %id.short(), file = %removed.file_name, "job removed");
        self.events.publish(PipelineEvent::JobRemoved { job_id: id });
        self.persist();
        Ok(removed)
    }

    /// Drop every completed job. Returns how many were removed.
    pub fn clear_completed(&self) -> usize {
        let removed: Vec<JobId> = {
            let mut jobs = self.jobs.write();
            let ids = jobs
                .iter()
                .filter(|j| j.status == JobStatus::Completed)
                .map(|j| j.id)
                .collect();
            jobs.retain(|j| j.status != JobStatus::Completed);
            ids
        };
        for id in &removed {
            self.events.publish(PipelineEvent::JobRemoved { job_id: *id });
        }
        if !removed.is_empty() {
            self.persist();
        }
        removed.len()
    }

    /// Send a failed job back to `pending`.
    ///
    /// Resolution failures also lose their destination. Artifacts from an
    /// earlier tag pass are forgotten.
    pub fn reset(&self, id: JobId) -> Result<Job> {
        let job = {
            let mut jobs = self.jobs.write();
            let job = find_mut(&mut jobs, id)?;
            let kind = match job.status.failure() {
                Some(failure) => failure.kind,
                None => return Err(Error::invalid_transition(job.status.label(), "pending")),
            };
            if kind == FailureKind::Resolution {
                job.destination.clear();
            }
            job.forget_artifacts();
            job.status = JobStatus::Pending;
            job.clone()
        };
        self.status_changed(id, &job.status);
        Ok(job)
    }

    /// Set the destination key by hand. Allowed while pending, and for jobs
    /// whose path resolution failed, which become pending again.
    pub fn set_destination(&self, id: JobId, destination: &str) -> Result<Job> {
        let destination = destination.trim().trim_start_matches('/');
        if destination.is_empty() {
            return Err(Error::Validation("destination must not be empty".into()));
        }
        let (job, was_failed) = {
            let mut jobs = self.jobs.write();
            let job = find_mut(&mut jobs, id)?;
            let was_failed = match &job.status {
                JobStatus::Pending => false,
                JobStatus::Failed(f) if f.kind == FailureKind::Resolution => true,
                other => {
                    return Err(Error::Validation(format!(
                        "cannot change the destination of a {} job",
                        other.label()
                    )))
                }
            };
            job.destination = destination.to_string();
            job.status = JobStatus::Pending;
            (job.clone(), was_failed)
        };
        tracing::info!(job_id = %id.short(), destination = %job.destination, "destination set");
        if was_failed {
            self.status_changed(id, &job.status);
        } else {
            self.persist();
        }
        Ok(job)
    }

    pub fn set_color_space(&self, id: JobId, color_space: ColorSpace) -> Result<Job> {
        let job = self.update_pending(id, |job| job.color_space = color_space)?;
        self.persist();
        Ok(job)
    }

    fn update_pending<F>(&self, id: JobId, f: F) -> Result<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write();
        let job = find_mut(&mut jobs, id)?;
        if job.status != JobStatus::Pending {
            return Err(Error::Validation(format!(
                "job is {}, not pending",
                job.status.label()
            )));
        }
        f(job);
        Ok(job.clone())
    }

    /// Write the current job set to the history file, if one is attached.
    /// Failures are logged; the in-memory state stays authoritative.
    pub fn persist(&self) {
        let Some(history) = &self.history else {
            return;
        };
        let snapshot = self.jobs.read().clone();
        if let Err(e) = history.save(&snapshot) {
            tracing::error!(path = %history.path().display(), "failed to save job history: {e}");
        }
    }

    fn status_changed(&self, id: JobId, status: &JobStatus) {
        match status {
            JobStatus::Uploading { .. } => {}
            JobStatus::Failed(failure) => {
                tracing::warn!(job_id = %id.short(), "job failed: {}", failure.message)
            }
            other => tracing::info!(job_id = %id.short(), status = other.label(), "status changed"),
        }
        self.events.publish(PipelineEvent::JobStatusChanged {
            job_id: id,
            status: status.label().to_string(),
            progress: status.progress(),
            message: status.failure().map(|f| f.message.clone()),
        });
        if status.is_terminal() || *status == JobStatus::Tagged || *status == JobStatus::Pending {
            self.persist();
        }
    }
}

fn find_mut(jobs: &mut [Job], id: JobId) -> Result<&mut Job> {
    jobs.iter_mut()
        .find(|j| j.id == id)
        .ok_or_else(|| Error::not_found("job", id))
}
