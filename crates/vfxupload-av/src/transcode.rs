//! Transcoder capability used by the tagging stage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use vfxupload_core::{ColorTags, Result};

use crate::actions;
use crate::tools::{ToolConfig, ToolRegistry};

/// Local media transformations performed before upload.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Mix several audio stems into one stereo file.
    async fn mix_audio(&self, inputs: &[PathBuf], output: &Path) -> Result<()>;

    /// Mux `audio` into `video`, writing `color` tags in the same pass when
    /// given.
    async fn mux_audio(
        &self,
        video: &Path,
        audio: &Path,
        color: Option<ColorTags>,
        output: &Path,
    ) -> Result<()>;

    /// Rewrite container color tags with stream copy.
    async fn tag_color(&self, video: &Path, tags: ColorTags, output: &Path) -> Result<()>;
}

/// [`Transcoder`] backed by the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: ToolConfig,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg: ToolConfig) -> Self {
        Self { ffmpeg }
    }

    pub fn from_registry(tools: &ToolRegistry) -> Result<Self> {
        Ok(Self::new(tools.require("ffmpeg")?.clone()))
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn mix_audio(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        actions::mix_audio(&self.ffmpeg, inputs, output).await
    }

    async fn mux_audio(
        &self,
        video: &Path,
        audio: &Path,
        color: Option<ColorTags>,
        output: &Path,
    ) -> Result<()> {
        actions::mux_audio(&self.ffmpeg, video, audio, color, output).await
    }

    async fn tag_color(&self, video: &Path, tags: ColorTags, output: &Path) -> Result<()> {
        actions::tag_color(&self.ffmpeg, video, tags, output).await
    }
}
