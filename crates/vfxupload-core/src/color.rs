//! Color-space model.
//!
//! A [`ColorSpace`] is the target a render should be tagged with before it is
//! uploaded. Each variant knows the ffmpeg flags that write the container
//! tags and the tag triple ffprobe reports for a correctly tagged file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Target color space of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    #[default]
    #[serde(rename = "P3-D65-PQ")]
    P3D65Pq,
    #[serde(rename = "Rec2020-PQ")]
    Rec2020Pq,
    #[serde(rename = "Rec709")]
    Rec709,
    #[serde(rename = "None")]
    None,
}

/// The (primaries, transfer, matrix) triple written into a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTags {
    pub primaries: &'static str,
    pub transfer: &'static str,
    pub space: &'static str,
}

impl ColorTags {
    /// ffmpeg output flags that write this triple.
    pub fn ffmpeg_flags(&self) -> Vec<String> {
        vec![
            "-color_primaries".to_string(),
            self.primaries.to_string(),
            "-color_trc".to_string(),
            self.transfer.to_string(),
            "-colorspace".to_string(),
            self.space.to_string(),
        ]
    }
}

impl ColorSpace {
    pub const ALL: [ColorSpace; 4] = [
        ColorSpace::P3D65Pq,
        ColorSpace::Rec2020Pq,
        ColorSpace::Rec709,
        ColorSpace::None,
    ];

    /// Stable selector used in config, history, and upload metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorSpace::P3D65Pq => "P3-D65-PQ",
            ColorSpace::Rec2020Pq => "Rec2020-PQ",
            ColorSpace::Rec709 => "Rec709",
            ColorSpace::None => "None",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ColorSpace::P3D65Pq => "P3-D65 / PQ (HDR)",
            ColorSpace::Rec2020Pq => "Rec.2020 / PQ (HDR)",
            ColorSpace::Rec709 => "Rec.709 (SDR)",
            ColorSpace::None => "None (don't tag)",
        }
    }

    /// Tags a correctly tagged file carries, or `None` when this target never
    /// asks for tagging.
    pub fn expected_tags(&self) -> Option<ColorTags> {
        match self {
            ColorSpace::P3D65Pq => Some(ColorTags {
                primaries: "smpte432",
                transfer: "smpte2084",
                space: "bt2020nc",
            }),
            ColorSpace::Rec2020Pq => Some(ColorTags {
                primaries: "bt2020",
                transfer: "smpte2084",
                space: "bt2020nc",
            }),
            ColorSpace::Rec709 => Some(ColorTags {
                primaries: "bt709",
                transfer: "bt709",
                space: "bt709",
            }),
            ColorSpace::None => None,
        }
    }

    /// Parse a persisted selector, falling back to the default for anything
    /// unrecognised.
    pub fn from_selector_lossy(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorSpace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorSpace::ALL
            .into_iter()
            .find(|cs| cs.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Validation(format!("unknown color space: {s}")))
    }
}
