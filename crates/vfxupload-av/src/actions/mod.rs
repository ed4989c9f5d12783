//! ffmpeg invocations used before upload: stem mixing, audio muxing, and
//! color tagging.
//!
//! Each action has an `*_args` function that builds the argument list and
//! an async runner that executes it with the registry's ffmpeg.

mod audio;
mod color;

use std::path::{Path, PathBuf};

pub use audio::{mix_audio, mix_audio_args, mux_audio, mux_audio_args};
pub use color::{tag_color, tag_color_args};

/// Path of an intermediate artifact written next to `source`:
/// `/renders/shot_v001.mov` with `"muxed"` becomes
/// `/renders/shot_v001_muxed.mov`.
pub fn artifact_path(source: &Path, label: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match source.extension() {
        Some(ext) => format!("{stem}_{label}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{label}"),
    };
    source.with_file_name(name)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
