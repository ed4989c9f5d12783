//! Job history persistence and rehydration.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::*;
use vfxupload::history::{HistoryStore, HISTORY_FILE};
use vfxupload::pipeline::UploadManager;
use vfxupload::state::{FailureKind, JobStatus, JobStore};
use vfxupload_core::{ColorSpace, ProjectCatalog};

const SHOT_FOLDER: &str = "MyShow_201_052_bluebird";

async fn tagged_job(h: &TestHarness) -> vfxupload_core::JobId {
    h.store.set_shot_folders(&[SHOT_FOLDER]);
    let id = h.add_render("MyShow_201_052_vfx_v001.mov");
    h.manager.resolve_all().await;
    h.manager.tag_all().await.unwrap();
    assert_eq!(h.job(id).status, JobStatus::Tagged);
    id
}

#[tokio::test]
async fn completed_jobs_survive_a_restart() {
    let h = TestHarness::new();
    let id = tagged_job(&h).await;
    h.manager.upload_all().await.unwrap();

    let restored = HistoryStore::new(&h.data_dir()).restore(&h.catalog);
    assert_eq!(restored.len(), 1);
    let job = &restored[0];
    assert_eq!(job.id, id);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.project.as_ref().unwrap().id, "myshow_201");
    assert_eq!(job.destination, h.job(id).destination);
    assert!(job.parsed.is_some());
}

#[tokio::test]
async fn tagged_job_keeps_existing_artifact() {
    let h = TestHarness::new();
    let id = tagged_job(&h).await;
    let tagged = h.job(id).tagged_file.unwrap();
    assert!(tagged.exists());

    let restored = HistoryStore::new(&h.data_dir()).restore(&h.catalog);
    assert_eq!(restored[0].status, JobStatus::Tagged);
    assert_eq!(restored[0].tagged_file.as_deref(), Some(tagged.as_path()));
}

#[tokio::test]
async fn tagged_job_without_artifacts_reverts_to_pending() {
    let h = TestHarness::new();
    let id = tagged_job(&h).await;
    std::fs::remove_file(h.job(id).tagged_file.unwrap()).unwrap();

    let restored = HistoryStore::new(&h.data_dir()).restore(&h.catalog);
    let job = &restored[0];
    assert_eq!(job.status, JobStatus::Pending);
    assert!(!job.has_artifacts());
}

#[tokio::test]
async fn restored_job_uploads_source_under_its_own_name() {
    let h = TestHarness::new();
    let id = tagged_job(&h).await;
    assert!(h
        .job(id)
        .destination
        .ends_with("03_VFX/MyShow_201_052_vfx_v001_tagged.mov"));
    std::fs::remove_file(h.job(id).tagged_file.unwrap()).unwrap();

    let history = HistoryStore::new(&h.data_dir());
    let jobs = Arc::new(JobStore::with_history(
        history.restore(&h.catalog),
        h.events.clone(),
        history,
    ));
    let manager = UploadManager::new(
        jobs.clone(),
        h.store.clone(),
        h.prober.clone(),
        h.transcoder.clone(),
    );
    assert_eq!(jobs.get(id).unwrap().status, JobStatus::Pending);

    // Nothing to tag now, so the source itself is uploaded.
    jobs.set_color_space(id, ColorSpace::None).unwrap();
    manager.tag_all().await.unwrap();
    manager.upload_all().await.unwrap();

    let job = jobs.get(id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let upload = h.store.uploads().pop().unwrap();
    assert_eq!(upload.local, h.render_path("MyShow_201_052_vfx_v001.mov"));
    assert!(upload.key.ends_with("03_VFX/MyShow_201_052_vfx_v001.mov"));
    assert_eq!(upload.key, job.destination);
}

#[tokio::test]
async fn failure_kind_is_restored() {
    let h = TestHarness::new();
    h.store.set_shot_folders(&["MyShow_201_099_other"]);
    let id = h.add_render("MyShow_201_052_vfx_v001.mov");
    h.manager.resolve_all().await;
    assert_matches!(h.job(id).status, JobStatus::Failed(_));

    let restored = HistoryStore::new(&h.data_dir()).restore(&h.catalog);
    let failure = restored[0].status.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::Resolution);
    assert!(failure.message.contains("MyShow_201_052"));
}

#[tokio::test]
async fn project_is_rederived_from_the_current_catalog() {
    let h = TestHarness::new();
    tagged_job(&h).await;

    let restored = HistoryStore::new(&h.data_dir()).restore(&ProjectCatalog::default());
    assert!(restored[0].project.is_none());
    assert!(restored[0].parsed.is_some());
}

#[tokio::test]
async fn history_file_is_a_json_array_without_temp_leftovers() {
    let h = TestHarness::new();
    tagged_job(&h).await;

    let path = h.data_dir().join(HISTORY_FILE);
    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "tagged");
    assert_eq!(entries[0]["episode_number"], 201);

    let files: Vec<_> = std::fs::read_dir(h.data_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(files, vec![std::ffi::OsString::from(HISTORY_FILE)]);
}

#[test]
fn legacy_entries_load_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(HISTORY_FILE),
        r#"[
            {
                "id": "4c1f2d0e-8a0b-4d55-9d0b-6b0c2b1a7e10",
                "source": "/renders/MyShow_201_052_vfx_v001.mov",
                "file_name": "MyShow_201_052_vfx_v001.mov",
                "color_space": "sRGB",
                "status": "failed"
            }
        ]"#,
    )
    .unwrap();

    let restored = HistoryStore::new(dir.path()).restore(&catalog());
    assert_eq!(restored.len(), 1);
    let job = &restored[0];
    assert_eq!(job.color_space, vfxupload_core::ColorSpace::P3D65Pq);
    assert_eq!(job.project.as_ref().unwrap().episode_number, 201);
    let failure = job.status.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::Tagging);
    assert_eq!(failure.message, "Unknown error");
}
