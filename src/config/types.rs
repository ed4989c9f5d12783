use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vfxupload_av::ToolsConfig;
use vfxupload_core::{ColorSpace, Project};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where job history and the imported project catalog live. `~` is
    /// expanded.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Color space for jobs whose episode matches no project.
    #[serde(default)]
    pub default_color_space: ColorSpace,

    #[serde(default)]
    pub aws: AwsConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    /// Inline catalog, used when no catalog has been imported.
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_color_space: ColorSpace::default(),
            aws: AwsConfig::default(),
            tools: ToolsConfig::default(),
            projects: Vec::new(),
        }
    }
}

impl Config {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).as_ref())
    }
}

fn default_data_dir() -> String {
    "~/.local/share/vfxupload".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Named profile passed to every `aws` invocation.
    #[serde(default)]
    pub profile: Option<String>,
}
