//! Asset storage boundary.
//!
//! The avatar lifecycle only talks to [`AssetStorage`]; [`FileSystemStorage`]
//! is the local-disk implementation rooted at the configured media directory.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

/// Prefix of in-flight temp files; they are never reported as assets.
const TEMP_PREFIX: &str = ".upload-";

/// Attempts at finding a free name before giving up on a write.
const MAX_NAME_ATTEMPTS: usize = 8;

/// Errors raised by an [`AssetStorage`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The name is empty, absolute, or escapes the storage root.
    #[error("invalid asset name: {0:?}")]
    InvalidName(String),

    #[error("failed to write asset {name}: {source}")]
    Write {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to delete asset {name}: {source}")]
    Delete {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read asset {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<StorageError> for clopetracker_common::Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Read { ref source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::not_found(e.to_string())
            }
            other => Self::storage(other.to_string()),
        }
    }
}

/// Byte store keyed by storage-relative names (`profiles/alice.webp`).
///
/// Implementations must be safe to share across threads (`Send + Sync`).
pub trait AssetStorage: Send + Sync {
    /// Whether an asset with this name exists.
    fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Store `bytes` under `name` or a free variant of it, never overwriting
    /// an existing asset. Returns the name actually used.
    fn write(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// Remove an asset. Removing a missing asset succeeds.
    fn delete(&self, name: &str) -> Result<(), StorageError>;

    /// Public URL of an asset.
    fn url_for(&self, name: &str) -> String;

    /// Read an asset back.
    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Names of every asset under `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Local filesystem storage.
///
/// Writes go to a temp file in the destination directory and are moved
/// into place without clobbering, so a partially written file is never
/// visible under an asset name.
pub struct FileSystemStorage {
    root: PathBuf,
    base_url: String,
}

impl FileSystemStorage {
    /// Create a storage rooted at `root`, served under `base_url`.
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    /// Root directory of the storage.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of an asset, after validating its name.
    pub fn path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(name);
        let valid = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn persist(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let wanted = valid_name(name);
        let target = self.path(&wanted)?;
        let write_err = |source| StorageError::Write {
            name: wanted.clone(),
            source,
        };

        let dir = target
            .parent()
            .ok_or_else(|| StorageError::InvalidName(name.to_string()))?;
        std::fs::create_dir_all(dir).map_err(write_err)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)
            .map_err(write_err)?;
        tmp.write_all(bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;

        let mut candidate = wanted.clone();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.path(&candidate)?;
            match tmp.persist_noclobber(&path) {
                Ok(_) => return Ok(candidate),
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    tmp = e.file;
                    candidate = alternative_name(&wanted);
                }
                Err(e) => return Err(write_err(e.error)),
            }
        }

        Err(write_err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "no free name found",
        )))
    }
}

impl AssetStorage for FileSystemStorage {
    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.path(name)?.is_file())
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let stored = self.persist(name, bytes)?;
        tracing::debug!(name = %stored, size = bytes.len(), "stored asset");
        Ok(stored)
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(name, "deleted asset");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Delete {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path(name)?;
        std::fs::read(&path).map_err(|source| StorageError::Read {
            name: name.to_string(),
            source,
        })
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.path(prefix)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = WalkDir::new(&dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| !e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .filter_map(|e| {
                let relative = e.path().strip_prefix(&self.root).ok()?;
                let parts: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                Some(parts.join("/"))
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Clean the file-name part of `name`: whitespace becomes `_` and anything
/// outside `[A-Za-z0-9._-]` is dropped. A stem left empty becomes `avatar`
/// and keeps its extension. Directory parts are kept as given.
fn valid_name(name: &str) -> String {
    let (dir, file) = match name.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, name),
    };

    let cleaned: String = file
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let (stem, ext) = cleaned.rsplit_once('.').unwrap_or((&cleaned, ""));
    let stem = stem.trim_start_matches('.');
    let stem = if stem.is_empty() { "avatar" } else { stem };
    let file = if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, ext)
    };

    match dir {
        Some(dir) => format!("{}/{}", dir, file),
        None => file,
    }
}

/// `dir/stem.ext` → `dir/stem_<random>.ext`.
fn alternative_name(name: &str) -> String {
    let suffix: String = uuid::Uuid::new_v4().simple().to_string()[..7].to_string();
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("avatar");
    let file = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext),
        None => format!("{}_{}", stem, suffix),
    };
    match name.rsplit_once('/') {
        Some((dir, _)) => format!("{}/{}", dir, file),
        None => file,
    }
}
