//! Projects and the project catalog.
//!
//! A [`Project`] describes where one episode's shots live in the object
//! store. Jobs find their project by episode number.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::color::ColorSpace;
use crate::error::{Error, Result};

/// One episode's remote layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(alias = "displayName")]
    pub display_name: String,
    #[serde(alias = "s3Bucket")]
    pub bucket: String,
    /// Key prefix under which shot folders are listed, without a trailing
    /// slash.
    #[serde(alias = "s3BasePath")]
    pub base_path: String,
    #[serde(alias = "episodeNumber")]
    pub episode_number: u32,
    #[serde(default, alias = "colorSpace")]
    pub color_space: ColorSpace,
    /// Subfolder of a shot folder holding plates and companion audio.
    #[serde(default = "default_plates_folder", alias = "platesFolder")]
    pub plates_folder: String,
    /// Subfolder of a shot folder receiving renders.
    #[serde(default = "default_vfx_folder", alias = "vfxFolder")]
    pub vfx_folder: String,
}

fn default_plates_folder() -> String {
    "Plates".to_string()
}

fn default_vfx_folder() -> String {
    "VFX".to_string()
}

impl Project {
    /// Base path with any trailing slashes removed.
    pub fn base(&self) -> &str {
        self.base_path.trim_end_matches('/')
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Validation("project id must not be empty".into()));
        }
        if self.bucket.trim().is_empty() {
            return Err(Error::Validation(format!(
                "project '{}' has an empty bucket",
                self.id
            )));
        }
        if self.base().trim().is_empty() {
            return Err(Error::Validation(format!(
                "project '{}' has an empty base path",
                self.id
            )));
        }
        if self.plates_folder.is_empty() || self.vfx_folder.is_empty() {
            return Err(Error::Validation(format!(
                "project '{}' must name both plates and VFX folders",
                self.id
            )));
        }
        Ok(())
    }
}

/// Immutable set of projects loaded at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectCatalog {
    projects: Vec<Project>,
}

impl ProjectCatalog {
    /// Build a catalog, rejecting invalid or conflicting entries.
    pub fn new(projects: Vec<Project>) -> Result<Self> {
        let mut ids = HashSet::new();
        let mut episodes = HashSet::new();
        for project in &projects {
            project.validate()?;
            if !ids.insert(project.id.as_str()) {
                return Err(Error::Validation(format!(
                    "duplicate project id '{}'",
                    project.id
                )));
            }
            if !episodes.insert(project.episode_number) {
                return Err(Error::Validation(format!(
                    "episode {} is claimed by more than one project",
                    project.episode_number
                )));
            }
        }
        Ok(Self { projects })
    }

    /// Parse and validate a JSON array of projects.
    pub fn from_json(json: &str) -> Result<Self> {
        let projects: Vec<Project> = serde_json::from_str(json)?;
        Self::new(projects)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.projects)?)
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn find_by_episode(&self, episode: u32) -> Option<&Project> {
        self.projects.iter().find(|p| p.episode_number == episode)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }
}
