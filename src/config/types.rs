use clopetracker_imaging::{NormalizeSettings, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub avatar: AvatarConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory served under `/static` (bundled default avatar, CSS, ...)
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    /// Largest accepted request body, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_db_path() -> PathBuf {
    PathBuf::from("clopetracker.db")
}
fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            static_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory of uploaded media
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,

    /// Public URL prefix for files under `media_root`
    #[serde(default = "default_media_url")]
    pub media_url: String,
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}
fn default_media_url() -> String {
    "/media/".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_root: default_media_root(),
            media_url: default_media_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AvatarConfig {
    /// Storage directory for avatars, relative to `media_root`
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Edge length of the normalized square avatar
    #[serde(default = "default_target_size")]
    pub target_size: u32,

    /// Lossy encoding quality (1-100)
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Encoder preference order
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,

    /// URL returned for profiles without an avatar
    #[serde(default = "default_avatar_url")]
    pub default_url: String,

    /// Reject uploads that do not decode instead of storing them as-is
    #[serde(default)]
    pub reject_undecodable: bool,
}

fn default_upload_dir() -> String {
    "profiles".to_string()
}
fn default_target_size() -> u32 {
    512
}
fn default_quality() -> u8 {
    85
}
fn default_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Webp, OutputFormat::Jpeg]
}
fn default_avatar_url() -> String {
    "/static/image/profiles/imageProfilDefaut.png".to_string()
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            target_size: default_target_size(),
            quality: default_quality(),
            formats: default_formats(),
            default_url: default_avatar_url(),
            reject_undecodable: false,
        }
    }
}

impl AvatarConfig {
    pub fn normalize_settings(&self) -> NormalizeSettings {
        NormalizeSettings {
            target_size: self.target_size,
            quality: self.quality,
            formats: self.formats.clone(),
        }
    }
}
