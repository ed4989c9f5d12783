//! Shared test harness for integration tests.
//!
//! Provides in-memory fakes for the object store, prober, and transcoder,
//! and a [`TestHarness`] that wires them into an [`UploadManager`] over a
//! job store persisted to a temporary directory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use vfxupload::history::HistoryStore;
use vfxupload::pipeline::UploadManager;
use vfxupload::state::{Job, JobStore};
use vfxupload::store::{ListingEntry, ObjectStore, ProgressFn};
use vfxupload_av::{MediaProber, ProbeResult, Transcoder};
use vfxupload_core::{
    ColorSpace, ColorTags, Error, EventBus, JobId, Project, ProjectCatalog, Result,
};

pub const BUCKET: &str = "sync-services";
pub const BASE_PATH: &str = "CLIENTS/MyShow/201/20_WORKING";

pub fn myshow_project() -> Project {
    Project {
        id: "myshow_201".into(),
        display_name: "MyShow 201".into(),
        bucket: BUCKET.into(),
        base_path: BASE_PATH.into(),
        episode_number: 201,
        color_space: ColorSpace::P3D65Pq,
        plates_folder: "01_Plates".into(),
        vfx_folder: "03_VFX".into(),
    }
}

pub fn catalog() -> ProjectCatalog {
    ProjectCatalog::new(vec![myshow_project()]).expect("valid catalog")
}

// ---------------------------------------------------------------------------
// Object store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub local: PathBuf,
    pub bucket: String,
    pub key: String,
    pub metadata: Vec<(String, String)>,
}

/// Bucket held in memory. Listings are keyed by prefix and ignore the
/// bucket name.
#[derive(Default)]
pub struct FakeObjectStore {
    listings: Mutex<HashMap<String, Vec<ListingEntry>>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    list_calls: Mutex<Vec<String>>,
    uploads: Mutex<Vec<UploadRecord>>,
    downloads: Mutex<Vec<String>>,
    fail_uploads: AtomicBool,
    upload_delay: Mutex<Option<Duration>>,
}

impl FakeObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_listing(&self, prefix: &str, entries: Vec<ListingEntry>) {
        self.listings.lock().insert(prefix.to_string(), entries);
    }

    /// Shot folders under the project base path.
    pub fn set_shot_folders(&self, folders: &[&str]) {
        self.set_listing(
            &format!("{BASE_PATH}/"),
            folders
                .iter()
                .map(|f| ListingEntry::Folder(f.to_string()))
                .collect(),
        );
    }

    /// Files in a shot folder's plates subfolder.
    pub fn set_plates(&self, shot_folder: &str, files: &[&str]) {
        self.set_listing(
            &format!("{BASE_PATH}/{shot_folder}/01_Plates/"),
            files
                .iter()
                .map(|f| ListingEntry::File(f.to_string()))
                .collect(),
        );
    }

    pub fn put_object(&self, key: &str) {
        self.objects.lock().insert(key.to_string(), b"object".to_vec());
    }

    pub fn has_object(&self, key: &str) -> bool {
        self.objects.lock().contains_key(key)
    }

    pub fn list_calls(&self) -> Vec<String> {
        self.list_calls.lock().clone()
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.uploads.lock().clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().clone()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_upload_delay(&self, delay: Duration) {
        *self.upload_delay.lock() = Some(delay);
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn list(&self, _bucket: &str, prefix: &str) -> Result<Vec<ListingEntry>> {
        self.list_calls.lock().push(prefix.to_string());
        Ok(self.listings.lock().get(prefix).cloned().unwrap_or_default())
    }

    async fn upload(
        &self,
        local: &Path,
        bucket: &str,
        key: &str,
        metadata: &[(String, String)],
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        let delay = *self.upload_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(Error::remote("upload", "connection reset by peer"));
        }
        progress(0.5);
        let bytes = std::fs::read(local)?;
        self.objects.lock().insert(key.to_string(), bytes);
        self.uploads.lock().push(UploadRecord {
            local: local.to_path_buf(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            metadata: metadata.to_vec(),
        });
        progress(1.0);
        Ok(())
    }

    async fn download(&self, _bucket: &str, key: &str, local: &Path) -> Result<()> {
        self.downloads.lock().push(key.to_string());
        std::fs::write(local, b"RIFF....WAVE")?;
        Ok(())
    }

    async fn copy(&self, _bucket: &str, from_key: &str, to_key: &str) -> Result<()> {
        let mut objects = self.objects.lock();
        let bytes = objects
            .get(from_key)
            .cloned()
            .ok_or_else(|| Error::remote("copy", format!("NoSuchKey: {from_key}")))?;
        objects.insert(to_key.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, _bucket: &str, key: &str) -> Result<()> {
        self.objects.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, _bucket: &str, key: &str) -> Result<bool> {
        Ok(self.objects.lock().contains_key(key))
    }
}

// ---------------------------------------------------------------------------
// Prober
// ---------------------------------------------------------------------------

/// Returns a configured result per file name, or the default result.
pub struct FakeProber {
    default: Mutex<ProbeResult>,
    by_name: Mutex<HashMap<String, ProbeResult>>,
    fail: AtomicBool,
}

impl FakeProber {
    /// Every file probes as silent and untagged.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            default: Mutex::new(ProbeResult::default()),
            by_name: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn set_default(&self, result: ProbeResult) {
        *self.default.lock() = result;
    }

    pub fn set_result(&self, file_name: &str, result: ProbeResult) {
        self.by_name.lock().insert(file_name.to_string(), result);
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

pub fn probe_tagged(color_space: ColorSpace, has_audio: bool) -> ProbeResult {
    let tags = color_space.expected_tags();
    ProbeResult {
        has_audio,
        color_primaries: tags.map(|t| t.primaries.to_string()),
        color_transfer: tags.map(|t| t.transfer.to_string()),
        color_space: tags.map(|t| t.space.to_string()),
    }
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, path: &Path) -> Result<ProbeResult> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Probe("ffprobe exited with status 1".into()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(self
            .by_name
            .lock()
            .get(&name)
            .cloned()
            .unwrap_or_else(|| self.default.lock().clone()))
    }
}

// ---------------------------------------------------------------------------
// Transcoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeCall {
    Mix { inputs: usize },
    Mux { audio: String, color: Option<ColorTags> },
    Tag { tags: ColorTags },
}

/// Writes every output file it is asked for and records the call.
#[derive(Default)]
pub struct FakeTranscoder {
    calls: Mutex<Vec<TranscodeCall>>,
    fail_mux: AtomicBool,
    fail_tag: AtomicBool,
    delay: Mutex<Option<Duration>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeTranscoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<TranscodeCall> {
        self.calls.lock().clone()
    }

    pub fn fail_mux(&self, fail: bool) {
        self.fail_mux.store(fail, Ordering::SeqCst);
    }

    pub fn fail_tag(&self, fail: bool) {
        self.fail_tag.store(fail, Ordering::SeqCst);
    }

    /// Make every color tag take `delay`, to observe concurrency.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Most tag operations ever observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn ffmpeg_error(message: &str) -> Error {
    Error::tool("ffmpeg", message)
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn mix_audio(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        self.calls.lock().push(TranscodeCall::Mix {
            inputs: inputs.len(),
        });
        std::fs::write(output, b"RIFF....WAVE")?;
        Ok(())
    }

    async fn mux_audio(
        &self,
        _video: &Path,
        audio: &Path,
        color: Option<ColorTags>,
        output: &Path,
    ) -> Result<()> {
        self.calls.lock().push(TranscodeCall::Mux {
            audio: audio
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            color,
        });
        if self.fail_mux.load(Ordering::SeqCst) {
            return Err(ffmpeg_error("Invalid data found when processing input"));
        }
        std::fs::write(output, b"muxed")?;
        Ok(())
    }

    async fn tag_color(&self, _video: &Path, tags: ColorTags, output: &Path) -> Result<()> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        self.calls.lock().push(TranscodeCall::Tag { tags });
        if self.fail_tag.load(Ordering::SeqCst) {
            return Err(ffmpeg_error("Conversion failed!"));
        }
        std::fs::write(output, b"tagged")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Job store, fakes, and manager over a temporary render and data directory.
pub struct TestHarness {
    pub dir: TempDir,
    pub catalog: ProjectCatalog,
    pub events: Arc<EventBus>,
    pub jobs: Arc<JobStore>,
    pub store: Arc<FakeObjectStore>,
    pub prober: Arc<FakeProber>,
    pub transcoder: Arc<FakeTranscoder>,
    pub manager: UploadManager,
}

impl TestHarness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("renders")).expect("renders dir");
        let catalog = catalog();
        let events = Arc::new(EventBus::default());
        let history = HistoryStore::new(&dir.path().join("data"));
        let jobs = Arc::new(JobStore::with_history(Vec::new(), events.clone(), history));

        let store = FakeObjectStore::new();
        let prober = FakeProber::new();
        let transcoder = FakeTranscoder::new();
        let manager = UploadManager::new(
            jobs.clone(),
            store.clone(),
            prober.clone(),
            transcoder.clone(),
        );

        Self {
            dir,
            catalog,
            events,
            jobs,
            store,
            prober,
            transcoder,
            manager,
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn render_path(&self, name: &str) -> PathBuf {
        self.dir.path().join("renders").join(name)
    }

    /// Write a render file and queue it.
    pub fn add_render(&self, name: &str) -> JobId {
        let path = self.render_path(name);
        std::fs::write(&path, b"render").expect("write render");
        let job = Job::new(path, &self.catalog, ColorSpace::P3D65Pq);
        self.jobs.add(job).expect("add job")
    }

    pub fn job(&self, id: JobId) -> Job {
        self.jobs.get(id).expect("job exists")
    }
}
