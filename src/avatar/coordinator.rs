//! Keeps stored avatar files in step with the profiles that own them.
//!
//! The coordinator is the only component that writes or deletes avatar
//! assets. New uploads are normalized and written before the mutation
//! commits; superseded assets are deleted only after it has committed.

use std::path::Path;
use std::sync::Arc;

use clopetracker_common::{Error, Result, StoredAsset, UploadPayload};
use clopetracker_db::models::Profile;
use clopetracker_imaging::Normalizer;

use super::storage::{AssetStorage, StorageError};
use crate::config::AvatarConfig;
use crate::profiles::{AvatarField, PersistContext, ProfileDraft, ProfileHooks};

const OCTET_STREAM: &str = "application/octet-stream";

pub struct AvatarCoordinator {
    normalizer: Normalizer,
    storage: Arc<dyn AssetStorage>,
    upload_dir: String,
    reject_undecodable: bool,
}

impl AvatarCoordinator {
    pub fn new(
        normalizer: Normalizer,
        storage: Arc<dyn AssetStorage>,
        upload_dir: impl Into<String>,
    ) -> Self {
        Self {
            normalizer,
            storage,
            upload_dir: upload_dir.into(),
            reject_undecodable: false,
        }
    }

    pub fn from_config(config: &AvatarConfig, storage: Arc<dyn AssetStorage>) -> Self {
        Self::new(
            Normalizer::new(config.normalize_settings()),
            storage,
            config.upload_dir.clone(),
        )
        .reject_undecodable(config.reject_undecodable)
    }

    /// Reject uploads that fail to normalize instead of storing them raw.
    pub fn reject_undecodable(mut self, reject: bool) -> Self {
        self.reject_undecodable = reject;
        self
    }

    pub fn storage(&self) -> &Arc<dyn AssetStorage> {
        &self.storage
    }

    pub fn upload_dir(&self) -> &str {
        &self.upload_dir
    }

    /// Normalize an upload and write it to storage.
    ///
    /// An upload that cannot be normalized is stored as received, under its
    /// own file name and declared content type, unless `reject_undecodable`
    /// is set. Storage write failures are returned.
    pub fn ingest(&self, upload: UploadPayload) -> Result<StoredAsset> {
        let (bytes, filename, content_type) =
            match self.normalizer.normalize(&upload.bytes, &upload.filename) {
                Ok(image) => (image.bytes, image.filename, image.content_type.to_string()),
                Err(e) if self.reject_undecodable => {
                    return Err(Error::invalid_input(format!(
                        "{:?} is not a usable image: {}",
                        upload.filename, e
                    )));
                }
                Err(e) => {
                    tracing::warn!(
                        filename = %upload.filename,
                        error = %e,
                        "avatar normalization failed, storing upload unchanged"
                    );
                    let content_type = if upload.content_type.trim().is_empty() {
                        OCTET_STREAM.to_string()
                    } else {
                        upload.content_type
                    };
                    (upload.bytes, upload.filename, content_type)
                }
            };

        let name = self.asset_name(&filename);
        let stored = self.storage.write(&name, &bytes)?;
        tracing::info!(name = %stored, content_type = %content_type, size = bytes.len(), "avatar stored");

        Ok(StoredAsset::new(stored, content_type))
    }

    fn asset_name(&self, filename: &str) -> String {
        // Client-supplied names may carry directories; keep the last component.
        let base = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let dir = self.upload_dir.trim_matches('/');
        if dir.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", dir, base)
        }
    }

    fn delete_asset(&self, asset: &StoredAsset) -> std::result::Result<(), StorageError> {
        self.storage.delete(&asset.name)
    }
}

impl ProfileHooks for AvatarCoordinator {
    fn before_persist(
        &self,
        draft: &mut ProfileDraft,
        previous: Option<&Profile>,
    ) -> Result<PersistContext> {
        let written = match draft.avatar.take_upload() {
            Some(upload) => {
                let asset = self.ingest(upload)?;
                draft.avatar = AvatarField::Stored(asset.clone());
                Some(asset)
            }
            None => None,
        };

        let superseded = match (previous.and_then(|p| p.avatar.as_ref()), &draft.avatar) {
            (Some(old), AvatarField::Stored(new)) if old.name != new.name => Some(old.clone()),
            (Some(old), AvatarField::Empty) => Some(old.clone()),
            _ => None,
        };

        Ok(PersistContext {
            superseded,
            written,
        })
    }

    fn after_persist(&self, profile: &Profile, ctx: PersistContext) {
        let Some(old) = ctx.superseded else {
            return;
        };
        if profile.avatar_name() == Some(old.name.as_str()) {
            tracing::debug!(profile_id = %profile.id, name = %old.name, "superseded avatar is live again, keeping it");
            return;
        }
        match self.delete_asset(&old) {
            Ok(()) => tracing::debug!(profile_id = %profile.id, name = %old.name, "superseded avatar deleted"),
            Err(e) => tracing::warn!(
                profile_id = %profile.id,
                name = %old.name,
                error = %e,
                "failed to delete superseded avatar"
            ),
        }
    }

    fn persist_failed(&self, ctx: PersistContext) {
        let Some(written) = ctx.written else {
            return;
        };
        if let Err(e) = self.delete_asset(&written) {
            tracing::warn!(name = %written.name, error = %e, "failed to remove avatar of aborted save");
        }
    }

    fn after_delete(&self, profile: &Profile) {
        let Some(asset) = &profile.avatar else {
            return;
        };
        if let Err(e) = self.delete_asset(asset) {
            tracing::warn!(
                profile_id = %profile.id,
                name = %asset.name,
                error = %e,
                "failed to delete avatar of removed profile"
            );
        }
    }
}
