//! [`ObjectStore`] backed by the `aws` CLI.

use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use vfxupload_av::{ToolCommand, ToolConfig, ToolRegistry};
use vfxupload_core::{Error, Result};

use super::{ListingEntry, ObjectStore, ProgressFn};

static RE_PROGRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Completed ([0-9.]+) ([A-Za-z]+)/([0-9.]+) ([A-Za-z]+)")
        .expect("progress pattern is valid")
});

#[derive(Debug, Clone)]
pub struct AwsCliStore {
    aws: ToolConfig,
    profile: Option<String>,
}

impl AwsCliStore {
    pub fn new(aws: ToolConfig, profile: Option<String>) -> Self {
        Self { aws, profile }
    }

    pub fn from_registry(tools: &ToolRegistry, profile: Option<String>) -> Result<Self> {
        Ok(Self::new(tools.require("aws")?.clone(), profile))
    }

    fn command<'a>(&self, args: impl IntoIterator<Item = &'a str>) -> ToolCommand {
        let mut cmd = self.aws.command();
        cmd.args(args);
        if let Some(profile) = &self.profile {
            cmd.args(["--profile", profile.as_str()]);
        }
        cmd
    }
}

fn s3_uri(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

/// Re-label a tool failure as a failed remote operation, keeping only the
/// CLI's message.
fn remote_error(op: &str, err: Error) -> Error {
    match err {
        Error::Tool { message, .. } => Error::remote(op, message),
        other => other,
    }
}

/// Parse `aws s3 ls` output.
///
/// Prefix lines look like `PRE name/`; object lines like
/// `2024-01-01 12:00:00 1234 name`.
pub fn parse_listing(stdout: &str) -> Vec<ListingEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            if let Some(folder) = line.strip_prefix("PRE ") {
                let folder = folder.trim().trim_end_matches('/');
                return (!folder.is_empty()).then(|| ListingEntry::Folder(folder.to_string()));
            }
            // Skip date, time, and size; the name may contain spaces.
            let mut rest = line;
            for _ in 0..3 {
                let (_, tail) = rest.split_once(char::is_whitespace)?;
                rest = tail.trim_start();
            }
            (!rest.is_empty()).then(|| ListingEntry::File(rest.to_string()))
        })
        .collect()
}

fn unit_bytes(unit: &str) -> Option<f64> {
    let factor: f64 = match unit {
        "Byte" | "Bytes" | "B" => 1.0,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some(factor)
}

/// Fraction done from an `aws s3 cp` progress line such as
/// `Completed 5.0 MiB/10.0 MiB (12.3 MiB/s) with 1 file(s) remaining`.
pub fn parse_progress(line: &str) -> Option<f64> {
    let caps = RE_PROGRESS.captures(line)?;
    let done: f64 = caps[1].parse().ok()?;
    let total: f64 = caps[3].parse().ok()?;
    let done = done * unit_bytes(&caps[2])?;
    let total = total * unit_bytes(&caps[4])?;
    if total <= 0.0 {
        return None;
    }
    Some((done / total).clamp(0.0, 1.0))
}

#[async_trait]
impl ObjectStore for AwsCliStore {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ListingEntry>> {
        let uri = s3_uri(bucket, prefix);
        let output = self.command(["s3", "ls", uri.as_str()]).output().await?;
        if output.status.success() {
            return Ok(parse_listing(&output.stdout));
        }
        // `s3 ls` exits 1 for a prefix with nothing under it.
        if output.status.code() == Some(1) && output.stdout.trim().is_empty() && output.stderr.trim().is_empty() {
            return Ok(Vec::new());
        }
        Err(Error::remote(
            "list",
            format!("{uri}: {}", output.stderr.trim()),
        ))
    }

    async fn upload(
        &self,
        local: &Path,
        bucket: &str,
        key: &str,
        metadata: &[(String, String)],
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        let local = local.to_string_lossy().to_string();
        let uri = s3_uri(bucket, key);
        let mut cmd = self.command(["s3", "cp", local.as_str(), uri.as_str()]);
        if !metadata.is_empty() {
            let joined = metadata
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",");
            cmd.args(["--metadata".to_string(), joined]);
        }

        tracing::info!(file = %local, destination = %uri, "uploading");
        cmd.execute_streaming(|line| {
            if let Some(fraction) = parse_progress(line) {
                progress(fraction);
            }
        })
        .await
        .map_err(|e| remote_error("upload", e))?;
        progress(1.0);
        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str, local: &Path) -> Result<()> {
        let uri = s3_uri(bucket, key);
        let local = local.to_string_lossy().to_string();
        tracing::debug!(source = %uri, file = %local, "downloading");
        self.command(["s3", "cp", uri.as_str(), local.as_str()])
            .execute()
            .await
            .map_err(|e| remote_error("download", e))?;
        Ok(())
    }

    async fn copy(&self, bucket: &str, from_key: &str, to_key: &str) -> Result<()> {
        let from = s3_uri(bucket, from_key);
        let to = s3_uri(bucket, to_key);
        self.command(["s3", "cp", from.as_str(), to.as_str()])
            .execute()
            .await
            .map_err(|e| remote_error("copy", e))?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let uri = s3_uri(bucket, key);
        self.command(["s3", "rm", uri.as_str()])
            .execute()
            .await
            .map_err(|e| remote_error("delete", e))?;
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let output = self
            .command(["s3api", "head-object", "--bucket", bucket, "--key", key])
            .output()
            .await?;
        if output.status.success() {
            return Ok(true);
        }
        let stderr = output.stderr.trim();
        if stderr.contains("404") || stderr.contains("Not Found") {
            return Ok(false);
        }
        Err(Error::remote("exists", stderr.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_separates_folders_and_files() {
        let stdout = "                           PRE MyShow_201_052_bluebird/\n\
                      PRE MyShow_201_053_crow/\n\
                      2024-03-01 10:22:13   52428800 MyShow_201_052_merged.wav\n\
                      2024-03-01 10:22:13       1024 notes with spaces.txt\n\
                      \n";
        assert_eq!(
            parse_listing(stdout),
            vec![
                ListingEntry::Folder("MyShow_201_052_bluebird".into()),
                ListingEntry::Folder("MyShow_201_053_crow".into()),
                ListingEntry::File("MyShow_201_052_merged.wav".into()),
                ListingEntry::File("notes with spaces.txt".into()),
            ]
        );
    }

    #[test]
    fn listing_skips_malformed_lines() {
        assert!(parse_listing("garbage\nPRE /\n").is_empty());
    }

    #[test]
    fn progress_converts_units() {
        assert_eq!(
            parse_progress("Completed 5.0 MiB/10.0 MiB (2.1 MiB/s) with 1 file(s) remaining"),
            Some(0.5)
        );
        assert_eq!(parse_progress("Completed 512.0 KiB/1.0 MiB"), Some(0.5));
        assert_eq!(parse_progress("Completed 256 Bytes/1.0 KiB"), Some(0.25));
    }

    #[test]
    fn progress_is_clamped_and_filtered() {
        assert_eq!(parse_progress("Completed 2.0 GiB/1.0 GiB"), Some(1.0));
        assert_eq!(parse_progress("Completed 1.0 MiB/0.0 MiB"), None);
        assert_eq!(parse_progress("Completed 1.0 Furlongs/2.0 MiB"), None);
        assert_eq!(parse_progress("upload: a.mov to s3://b/a.mov"), None);
    }

    #[cfg(unix)]
    mod cli {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;
        use std::sync::Mutex;
        use std::time::Duration;

        fn fake_aws(dir: &Path, body: &str) -> AwsCliStore {
            let script = dir.join("aws");
            std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            AwsCliStore::new(
                ToolConfig {
                    name: "aws".into(),
                    path: script,
                    timeout: Duration::from_secs(10),
                },
                Some("vfx".into()),
            )
        }

        #[tokio::test]
        async fn empty_prefix_lists_as_empty() {
            let dir = tempfile::tempdir().unwrap();
            let store = fake_aws(dir.path(), "exit 1");
            assert!(store.list("bucket", "nothing/").await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn list_failure_is_remote_error() {
            let dir = tempfile::tempdir().unwrap();
            let store = fake_aws(dir.path(), "echo 'AccessDenied' >&2; exit 255");
            let err = store.list("bucket", "x/").await.unwrap_err();
            assert!(matches!(err, Error::Remote { .. }), "{err}");
            assert!(err.to_string().contains("AccessDenied"));
        }

        #[tokio::test]
        async fn upload_passes_metadata_profile_and_reports_progress() {
            let dir = tempfile::tempdir().unwrap();
            let args_file: PathBuf = dir.path().join("args");
            let store = fake_aws(
                dir.path(),
                &format!(
                    "echo \"$@\" > {}\nprintf 'Completed 1.0 MiB/4.0 MiB\\r' >&2\nprintf 'Completed 4.0 MiB/4.0 MiB\\r' >&2",
                    args_file.display()
                ),
            );

            let seen = Mutex::new(Vec::new());
            let report = |p: f64| seen.lock().unwrap().push(p);
            store
                .upload(
                    Path::new("/renders/a_muxed.mov"),
                    "bucket",
                    "base/shot/VFX/a_muxed.mov",
                    &[("color-space".into(), "P3-D65-PQ".into())],
                    &report,
                )
                .await
                .unwrap();

            assert_eq!(*seen.lock().unwrap(), vec![0.25, 1.0, 1.0]);
            let args = std::fs::read_to_string(&args_file).unwrap();
            assert_eq!(
                args.trim(),
                "s3 cp /renders/a_muxed.mov s3://bucket/base/shot/VFX/a_muxed.mov \
                 --profile vfx --metadata color-space=P3-D65-PQ"
            );
        }

        #[tokio::test]
        async fn head_object_404_means_missing() {
            let dir = tempfile::tempdir().unwrap();
            let store = fake_aws(
                dir.path(),
                "echo 'An error occurred (404) when calling the HeadObject operation: Not Found' >&2; exit 254",
            );
            assert!(!store.exists("bucket", "k").await.unwrap());
        }

        #[tokio::test]
        async fn head_object_success_means_present() {
            let dir = tempfile::tempdir().unwrap();
            let store = fake_aws(dir.path(), "echo '{}'");
            assert!(store.exists("bucket", "k").await.unwrap());
        }
    }
}
