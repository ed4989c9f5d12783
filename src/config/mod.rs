mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;
use vfxupload_core::ProjectCatalog;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./vfxupload.toml", "~/.config/vfxupload/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.tools.timeout_secs == 0 {
        anyhow::bail!("tools.timeout_secs cannot be 0");
    }

    if config.data_dir.trim().is_empty() {
        anyhow::bail!("data_dir cannot be empty");
    }

    ProjectCatalog::new(config.projects.clone()).context("Invalid [[projects]] entry")?;

    for (name, path) in [
        ("ffmpeg", &config.tools.ffmpeg_path),
        ("ffprobe", &config.tools.ffprobe_path),
        ("aws", &config.tools.aws_path),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                tracing::warn!("Configured {} path does not exist: {:?}", name, path);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfxupload_core::ColorSpace;

    const FULL: &str = r#"
data_dir = "/tmp/vfxupload-test"
default_color_space = "Rec709"

[aws]
profile = "studio"

[tools]
ffmpeg_path = "/opt/homebrew/bin/ffmpeg"
timeout_secs = 600

[[projects]]
id = "myshow_201"
display_name = "MyShow 201"
bucket = "sync-services"
base_path = "CLIENTS/MyShow/201/20_WORKING"
episode_number = 201
color_space = "P3-D65-PQ"
plates_folder = "01_Plates"
vfx_folder = "03_VFX"
"#;

    fn write(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_full_config() {
        let file = write(FULL);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.default_color_space, ColorSpace::Rec709);
        assert_eq!(config.aws.profile.as_deref(), Some("studio"));
        assert_eq!(config.tools.timeout_secs, 600);
        assert_eq!(config.tools.ffprobe_path, None);
        assert_eq!(config.projects.len(), 1);
        assert_eq!(config.projects[0].vfx_folder, "03_VFX");
        assert_eq!(config.data_dir().to_str(), Some("/tmp/vfxupload-test"));
    }

    #[test]
    fn empty_file_gives_defaults() {
        let file = write("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.default_color_space, ColorSpace::P3D65Pq);
        assert_eq!(config.tools.timeout_secs, 3600);
        assert!(config.projects.is_empty());
        assert!(!config.data_dir().to_string_lossy().starts_with('~'));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let file = write("[tools]\ntimeout_secs = 0\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn duplicate_episode_is_rejected() {
        let dup = format!(
            "{FULL}\n[[projects]]\nid = \"other\"\ndisplay_name = \"Other\"\nbucket = \"b\"\nbase_path = \"x\"\nepisode_number = 201\n"
        );
        let file = write(&dup);
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn unknown_color_space_is_a_parse_error() {
        let file = write("default_color_space = \"sRGB\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        assert!(load_config_or_default(Some(Path::new("/nonexistent/vfxupload.toml"))).is_err());
    }
}
