mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

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

    let default_paths = [
        "./clopetracker.toml",
        "~/.config/clopetracker/config.toml",
        "/etc/clopetracker/config.toml",
    ];

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
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("Server max_upload_bytes must be greater than 0");
    }

    if config.avatar.target_size == 0 {
        anyhow::bail!("Avatar target_size must be greater than 0");
    }

    if !(1..=100).contains(&config.avatar.quality) {
        anyhow::bail!(
            "Avatar quality must be between 1 and 100, got {}",
            config.avatar.quality
        );
    }

    if config.avatar.formats.is_empty() {
        anyhow::bail!("Avatar formats cannot be empty");
    }

    let upload_dir = Path::new(&config.avatar.upload_dir);
    if upload_dir.is_absolute()
        || upload_dir
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        anyhow::bail!(
            "Avatar upload_dir must be relative to media_root: {:?}",
            config.avatar.upload_dir
        );
    }

    if !config.storage.media_root.exists() {
        tracing::warn!(
            "Media root does not exist yet and will be created: {:?}",
            config.storage.media_root
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clopetracker_imaging::OutputFormat;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.storage.media_url, "/media/");
        assert_eq!(config.avatar.upload_dir, "profiles");
        assert_eq!(config.avatar.target_size, 512);
        assert_eq!(config.avatar.quality, 85);
        assert_eq!(
            config.avatar.formats,
            vec![OutputFormat::Webp, OutputFormat::Jpeg]
        );
        assert!(!config.avatar.reject_undecodable);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [storage]
            media_root = "/srv/media"

            [avatar]
            formats = ["jpeg"]
            quality = 70
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.media_root, std::path::PathBuf::from("/srv/media"));
        assert_eq!(config.avatar.formats, vec![OutputFormat::Jpeg]);
        assert_eq!(config.avatar.normalize_settings().quality, 70);
        assert_eq!(config.avatar.target_size, 512);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str(
            r#"
            [avatar]
            formats = ["gif"]
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.avatar.quality = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.avatar.formats.clear();
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.avatar.target_size = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.avatar.upload_dir = "../outside".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clopetracker.toml");
        std::fs::write(&path, "[avatar]\ntarget_size = 256\n").unwrap();

        let config = load_config_or_default(Some(&path)).unwrap();
        assert_eq!(config.avatar.target_size, 256);

        std::fs::write(&path, "[server]\nport = 0\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
