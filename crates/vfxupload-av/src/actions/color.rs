//! Color tagging by stream-copy remux.

use std::path::Path;

use vfxupload_core::{ColorTags, Result};

use super::path_arg;
use crate::tools::ToolConfig;

/// Arguments rewriting the container color tags without re-encoding.
pub fn tag_color_args(video: &Path, tags: ColorTags, output: &Path) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        path_arg(video),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "copy".to_string(),
    ];
    args.extend(tags.ffmpeg_flags());
    args.push("-y".to_string());
    args.push(path_arg(output));
    args
}

pub async fn tag_color(
    ffmpeg: &ToolConfig,
    video: &Path,
    tags: ColorTags,
    output: &Path,
) -> Result<()> {
    tracing::info!(video = %video.display(), primaries = tags.primaries, "tagging color");
    ffmpeg
        .command()
        .args(tag_color_args(video, tags, output))
        .execute()
        .await?;
    Ok(())
}
