//! Render filename parser.
//!
//! Renders are named `[Project_]EEE_SSS_suffix_vNNN.ext`, for example
//! `MyShow_201_052_vfx_v001.mov` or `201_052_comp_V12.exr`. A name that does
//! not follow the pattern simply has no shot identity; such jobs need a
//! destination path entered by hand.

use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;

static RE_RENDER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<project>[A-Za-z]+)_)?(?P<episode>[0-9]{3})_(?P<shot>[0-9]{3})_(?P<suffix>[A-Za-z0-9]+)_(?P<version>[vV][0-9]+)\.(?P<ext>[A-Za-z0-9_]+)$",
    )
    .expect("render name pattern is valid")
});

/// Shot identity extracted from a render filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedFileName {
    /// Leading project token, e.g. `MyShow`.
    pub project_name: Option<String>,
    /// Three-digit episode, e.g. `201`.
    pub episode: String,
    /// Three-digit shot, e.g. `052`.
    pub shot: String,
    pub suffix: String,
    /// Version marker including its `v`/`V`, e.g. `v001`.
    pub version: String,
    pub extension: String,
}

impl ParsedFileName {
    /// Prefix used to find the shot's remote folder: `MyShow_201_052` or
    /// `201_052`.
    pub fn shot_prefix(&self) -> String {
        match &self.project_name {
            Some(project) => format!("{}_{}_{}", project, self.episode, self.shot),
            None => format!("{}_{}", self.episode, self.shot),
        }
    }

    /// Filename rebuilt from the identity alone.
    pub fn canonical_file_name(&self) -> String {
        format!(
            "{}_{}_{}.{}",
            self.shot_prefix(),
            self.suffix,
            self.version,
            self.extension
        )
    }

    /// Episode as a number, for catalog lookup.
    pub fn episode_number(&self) -> Option<u32> {
        self.episode.parse().ok()
    }
}

/// Parse the final path component of `name`.
///
/// Returns `None` when the name does not follow the render convention.
pub fn parse_file_name(name: &str) -> Option<ParsedFileName> {
    let file_name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name);
    let caps = RE_RENDER_NAME.captures(file_name)?;

    Some(ParsedFileName {
        project_name: caps.name("project").map(|m| m.as_str().to_string()),
        episode: caps["episode"].to_string(),
        shot: caps["shot"].to_string(),
        suffix: caps["suffix"].to_string(),
        version: caps["version"].to_string(),
        extension: caps["ext"].to_string(),
    })
}
