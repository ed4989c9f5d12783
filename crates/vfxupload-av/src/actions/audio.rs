//! Companion-audio handling: mixing stems and muxing audio into a render.

use std::path::{Path, PathBuf};

use vfxupload_core::{ColorTags, Error, Result};

use super::path_arg;
use crate::tools::ToolConfig;

/// Arguments mixing `inputs` into one stereo file at unity gain.
///
/// `amix` normally divides each input by the input count; `normalize=0`
/// keeps every stem at its original level.
pub fn mix_audio_args(inputs: &[PathBuf], output: &Path) -> Vec<String> {
    let mut args = Vec::with_capacity(inputs.len() * 2 + 7);
    for input in inputs {
        args.push("-i".to_string());
        args.push(path_arg(input));
    }
    args.extend([
        "-filter_complex".to_string(),
        format!("amix=inputs={}:normalize=0", inputs.len()),
        "-ac".to_string(),
        "2".to_string(),
        "-y".to_string(),
        path_arg(output),
    ]);
    args
}

/// Mix several audio stems into `output`.
pub async fn mix_audio(ffmpeg: &ToolConfig, inputs: &[PathBuf], output: &Path) -> Result<()> {
    if inputs.is_empty() {
        return Err(Error::Validation("no audio stems to mix".into()));
    }
    tracing::info!(stems = inputs.len(), output = %output.display(), "mixing audio stems");
    ffmpeg
        .command()
        .args(mix_audio_args(inputs, output))
        .execute()
        .await?;
    Ok(())
}

/// Arguments muxing `audio` into `video`, copying the video stream and
/// encoding audio to AAC. Color tags, when given, are written in the same
/// pass.
pub fn mux_audio_args(
    video: &Path,
    audio: &Path,
    color: Option<ColorTags>,
    output: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        path_arg(video),
        "-i".to_string(),
        path_arg(audio),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-shortest".to_string(),
    ];
    if let Some(tags) = color {
        args.extend(tags.ffmpeg_flags());
    }
    args.push("-y".to_string());
    args.push(path_arg(output));
    args
}

pub async fn mux_audio(
    ffmpeg: &ToolConfig,
    video: &Path,
    audio: &Path,
    color: Option<ColorTags>,
    output: &Path,
) -> Result<()> {
    tracing::info!(
        video = %video.display(),
        audio = %audio.display(),
        with_color = color.is_some(),
        "muxing audio"
    );
    ffmpeg
        .command()
        .args(mux_audio_args(video, audio, color, output))
        .execute()
        .await?;
    Ok(())
}
