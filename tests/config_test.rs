//! Config discovery and catalog import, end to end through [`App`].

use serial_test::serial;
use vfxupload::app::App;
use vfxupload::catalog;
use vfxupload::config::{load_config, load_config_or_default};
use vfxupload_core::ColorSpace;

const CATALOG_JSON: &str = r#"[
    {
        "id": "myshow_201",
        "displayName": "MyShow 201",
        "s3Bucket": "sync-services",
        "s3BasePath": "CLIENTS/MyShow/201/20_WORKING/",
        "episodeNumber": 201,
        "colorSpace": "Rec2020-PQ",
        "platesFolder": "01_Plates",
        "vfxFolder": "03_VFX"
    }
]"#;

fn write_config(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("vfxupload.toml");
    std::fs::write(
        &path,
        format!(
            "data_dir = {:?}\ndefault_color_space = \"Rec709\"\n\n[aws]\nprofile = \"vfx\"\n",
            dir.join("data").to_string_lossy()
        ),
    )
    .unwrap();
    path
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[test]
#[serial]
fn config_in_working_directory_is_found() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let config = load_config_or_default(None);

    std::env::set_current_dir(previous).unwrap();
    let config = config.unwrap();
    assert_eq!(config.default_color_space, ColorSpace::Rec709);
    assert_eq!(config.aws.profile.as_deref(), Some("vfx"));
}

#[test]
#[serial]
fn no_config_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let config = load_config_or_default(None);

    std::env::set_current_dir(previous).unwrap();
    let config = config.unwrap();
    assert_eq!(config.tools.timeout_secs, 3600);
}

// ---------------------------------------------------------------------------
// Catalog import
// ---------------------------------------------------------------------------

#[test]
fn imported_catalog_drives_new_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(&write_config(dir.path())).unwrap();

    let source = dir.path().join("projects.json");
    std::fs::write(&source, CATALOG_JSON).unwrap();
    let imported = catalog::import_catalog(&config, &source).unwrap();
    assert_eq!(imported.len(), 1);

    let app = App::open(config).unwrap();
    let render = dir.path().join("MyShow_201_052_vfx_v001.mov");
    std::fs::write(&render, b"mov").unwrap();
    let job = app.add_file(&render, None, None).unwrap();

    let project = job.project.unwrap();
    assert_eq!(project.base(), "CLIENTS/MyShow/201/20_WORKING");
    assert_eq!(job.color_space, ColorSpace::Rec2020Pq);

    // Other episodes fall back to the configured default.
    let other = dir.path().join("MyShow_202_001_vfx_v001.mov");
    std::fs::write(&other, b"mov").unwrap();
    let job = app.add_file(&other, None, None).unwrap();
    assert!(job.project.is_none());
    assert_eq!(job.color_space, ColorSpace::Rec709);
}

#[test]
fn duplicate_episode_import_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(&write_config(dir.path())).unwrap();

    let source = dir.path().join("dup.json");
    let dup = CATALOG_JSON.replace(
        "\n]",
        r#",
    {"id": "other", "displayName": "Other", "s3Bucket": "b", "s3BasePath": "x", "episodeNumber": 201}
]"#,
    );
    std::fs::write(&source, dup).unwrap();

    assert!(catalog::import_catalog(&config, &source).is_err());
    assert!(!catalog::catalog_path(&config).exists());
}
