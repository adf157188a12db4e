//! Profile records and their mutation lifecycle.
//!
//! A mutation starts as a [`ProfileDraft`], is handed to every registered
//! [`ProfileHooks`] implementation before it commits, and is committed by the
//! [`ProfileStore`]. Hooks are told about the outcome afterwards.

mod hooks;
mod store;

pub use hooks::{PersistContext, ProfileHooks};
pub use store::ProfileStore;

use chrono::{DateTime, NaiveDate, Utc};
use clopetracker_common::{Error, Result, Role, StoredAsset, UploadPayload, UserId};
use clopetracker_db::models::Profile;

/// Pending value of a profile's image field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AvatarField {
    /// Reference to an asset already on storage.
    Stored(StoredAsset),
    /// Unsaved file content supplied with this mutation.
    Upload(UploadPayload),
    /// Cleared, or never set.
    #[default]
    Empty,
}

impl AvatarField {
    /// Take the upload out of the field, leaving it `Empty`.
    pub fn take_upload(&mut self) -> Option<UploadPayload> {
        match std::mem::take(self) {
            Self::Upload(payload) => Some(payload),
            other => {
                *self = other;
                None
            }
        }
    }

    pub fn stored(&self) -> Option<&StoredAsset> {
        match self {
            Self::Stored(asset) => Some(asset),
            _ => None,
        }
    }
}

impl From<Option<StoredAsset>> for AvatarField {
    fn from(asset: Option<StoredAsset>) -> Self {
        asset.map_or(Self::Empty, Self::Stored)
    }
}

/// Pending state of a create or update.
#[derive(Debug, Clone)]
pub struct ProfileDraft {
    id: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    /// Avatar the draft was loaded with; a mismatch at save time is a conflict.
    base_avatar: Option<String>,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub role: Role,
    pub group_id: Option<i64>,
    pub cigarettes_smoked: i64,
    pub avatar: AvatarField,
}

impl ProfileDraft {
    /// Draft for a profile that does not exist yet.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            created_at: None,
            base_avatar: None,
            username: username.into(),
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            birth_date: None,
            phone: None,
            role: Role::default(),
            group_id: None,
            cigarettes_smoked: 0,
            avatar: AvatarField::Empty,
        }
    }

    /// Draft for an update of `profile`, starting from its committed state.
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            id: Some(profile.id),
            created_at: Some(profile.created_at),
            base_avatar: profile.avatar_name().map(str::to_string),
            username: profile.username.clone(),
            email: profile.email.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            birth_date: profile.birth_date,
            phone: profile.phone.clone(),
            role: profile.role,
            group_id: profile.group_id,
            cigarettes_smoked: profile.cigarettes_smoked,
            avatar: profile.avatar.clone().into(),
        }
    }

    /// Identity of the profile being updated; `None` for a creation.
    pub fn id(&self) -> Option<UserId> {
        self.id
    }

    pub(crate) fn base_avatar(&self) -> Option<&str> {
        self.base_avatar.as_deref()
    }

    pub(crate) fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Turn the draft into the record to commit.
    ///
    /// Fails if an upload is still pending: some hook must have stored it.
    pub fn into_profile(self, id: UserId, created_at: DateTime<Utc>) -> Result<Profile> {
        let avatar = match self.avatar {
            AvatarField::Stored(asset) => Some(asset),
            AvatarField::Empty => None,
            AvatarField::Upload(payload) => {
                return Err(Error::internal(format!(
                    "upload {:?} was never stored",
                    payload.filename
                )))
            }
        };

        Ok(Profile {
            id,
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            birth_date: self.birth_date,
            phone: self.phone,
            role: self.role,
            group_id: self.group_id,
            cigarettes_smoked: self.cigarettes_smoked,
            avatar,
            created_at,
        })
    }
}
