//! Process-wide wiring: config, catalog, event bus, and the restored job
//! store, plus construction of the production upload manager.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use vfxupload_av::{FfmpegTranscoder, FfprobeProber, ToolRegistry};
use vfxupload_core::{ColorSpace, EventBus, ProjectCatalog};

use crate::catalog::load_catalog;
use crate::config::Config;
use crate::history::HistoryStore;
use crate::pipeline::UploadManager;
use crate::state::{Job, JobStore};
use crate::store::AwsCliStore;

pub struct App {
    pub config: Config,
    pub catalog: ProjectCatalog,
    pub events: Arc<EventBus>,
    pub jobs: Arc<JobStore>,
}

impl App {
    /// Load the catalog and restore the persisted job set.
    pub fn open(config: Config) -> Result<Self> {
        let catalog = load_catalog(&config)?;
        let history = HistoryStore::new(&config.data_dir());
        let restored = history.restore(&catalog);
        let events = Arc::new(EventBus::default());
        let jobs = Arc::new(JobStore::with_history(restored, events.clone(), history));
        Ok(Self {
            config,
            catalog,
            events,
            jobs,
        })
    }

    /// Queue a render. A manual destination and color space override what
    /// the filename and catalog would give.
    pub fn add_file(
        &self,
        path: &Path,
        destination: Option<&str>,
        color_space: Option<ColorSpace>,
    ) -> Result<Job> {
        if !path.is_file() {
            anyhow::bail!("Not a file: {:?}", path);
        }
        let source = std::fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve {:?}", path))?;

        let mut job = Job::new(source, &self.catalog, self.config.default_color_space);
        if let Some(cs) = color_space {
            job.color_space = cs;
        }
        let id = self.jobs.add(job)?;

        match destination {
            Some(dest) => Ok(self.jobs.set_destination(id, dest)?),
            None => self
                .jobs
                .get(id)
                .with_context(|| format!("job {} vanished after add", id)),
        }
    }

    /// Upload manager backed by the aws CLI, ffprobe, and ffmpeg.
    pub fn manager(&self) -> Result<UploadManager> {
        let tools = ToolRegistry::discover(&self.config.tools);
        let store = AwsCliStore::from_registry(&tools, self.config.aws.profile.clone())
            .context("The aws CLI is required for uploads")?;
        let prober = FfprobeProber::from_registry(&tools)?;
        let transcoder = FfmpegTranscoder::from_registry(&tools)?;
        Ok(UploadManager::new(
            self.jobs.clone(),
            Arc::new(store),
            Arc::new(prober),
            Arc::new(transcoder),
        ))
    }
}
