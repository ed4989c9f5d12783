//! FFprobe-backed [`MediaProber`].
//!
//! Runs `ffprobe -v quiet -show_entries stream=codec_type,color_primaries,
//! color_transfer,color_space -of json <file>` and reads audio presence plus
//! the color tags of the first video stream.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use vfxupload_core::{Error, Result};

use super::{MediaProber, ProbeResult};
use crate::tools::{ToolConfig, ToolRegistry};

#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe: ToolConfig,
}

impl FfprobeProber {
    pub fn new(ffprobe: ToolConfig) -> Self {
        Self { ffprobe }
    }

    /// Use the registry's ffprobe.
    pub fn from_registry(tools: &ToolRegistry) -> Result<Self> {
        Ok(Self::new(tools.require("ffprobe")?.clone()))
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<ProbeResult> {
        let mut cmd = self.ffprobe.command();
        cmd.args([
            "-v",
            "quiet",
            "-show_entries",
            "stream=codec_type,color_primaries,color_transfer,color_space",
            "-of",
            "json",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd.execute().await?;
        let result = parse_probe_output(&output.stdout)?;
        tracing::debug!(
            file = %path.display(),
            has_audio = result.has_audio,
            primaries = ?result.color_primaries,
            transfer = ?result.color_transfer,
            space = ?result.color_space,
            "probed"
        );
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    streams: Option<Vec<FfprobeStream>>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    color_primaries: Option<String>,
    color_transfer: Option<String>,
    color_space: Option<String>,
}

/// Map ffprobe's JSON onto a [`ProbeResult`].
///
/// Output without a `streams` array is an error so the caller can fall
/// back to [`ProbeResult::assume_audio`].
pub fn parse_probe_output(json: &str) -> Result<ProbeResult> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::Probe(format!("ffprobe JSON parse error: {e}")))?;
    let streams = output
        .streams
        .ok_or_else(|| Error::Probe("ffprobe output has no streams".into()))?;

    let has_audio = streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));
    let video = streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    Ok(match video {
        Some(v) => ProbeResult {
            has_audio,
            color_primaries: v.color_primaries,
            color_transfer: v.color_transfer,
            color_space: v.color_space,
        },
        None => ProbeResult {
            has_audio,
            ..ProbeResult::default()
        },
    })
}
