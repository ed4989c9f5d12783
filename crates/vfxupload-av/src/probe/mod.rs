//! Media probing.
//!
//! The pipeline needs exactly two facts about a render before it is
//! uploaded: whether it already carries an audio track, and which color
//! tags its first video stream declares. [`MediaProber`] is the capability
//! boundary; [`FfprobeProber`] is the production implementation.

pub mod ffprobe;

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use vfxupload_core::{ColorSpace, Result};

pub use self::ffprobe::FfprobeProber;

/// Audio presence and color tags of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub has_audio: bool,
    pub color_primaries: Option<String>,
    pub color_transfer: Option<String>,
    pub color_space: Option<String>,
}

impl ProbeResult {
    /// Result used when a file could not be probed: treat it as already
    /// carrying audio so no second track is muxed in, and as untagged.
    pub fn assume_audio() -> Self {
        Self {
            has_audio: true,
            ..Self::default()
        }
    }

    /// Whether the file already carries the tags `target` expects.
    ///
    /// Always true for a target with no expected tags. Any missing or
    /// `unknown` probed value counts as a mismatch.
    pub fn already_tagged(&self, target: ColorSpace) -> bool {
        let Some(expected) = target.expected_tags() else {
            return true;
        };
        let observed = [
            self.color_primaries.as_deref(),
            self.color_transfer.as_deref(),
            self.color_space.as_deref(),
        ];
        if observed
            .iter()
            .any(|v| v.map_or(true, |s| s.is_empty() || s == "unknown"))
        {
            return false;
        }
        observed == [Some(expected.primaries), Some(expected.transfer), Some(expected.space)]
    }

    pub fn needs_color_tag(&self, target: ColorSpace) -> bool {
        !self.already_tagged(target)
    }
}

/// Read-only inspection of a media file.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbeResult>;
}
