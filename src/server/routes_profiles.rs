//! Profile API routes.
//!
//! Creation and updates take `multipart/form-data` so an avatar can ride
//! along with the text fields. Store calls run on the blocking pool since
//! they touch SQLite, the image codecs and the filesystem.

use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use clopetracker_common::{Error, Result, UploadPayload, UserId};
use clopetracker_db::models::Profile;
use serde::{Deserialize, Serialize};

use super::error::AppError;
use super::AppContext;
use crate::avatar::avatar_url;
use crate::profiles::{AvatarField, ProfileDraft};

/// Multipart field carrying the avatar file.
pub const AVATAR_FIELD: &str = "profile_image";
/// Multipart field that clears the avatar when truthy.
pub const AVATAR_CLEAR_FIELD: &str = "profile_image-clear";

pub fn profile_routes() -> Router<AppContext> {
    Router::new()
        .route("/profiles", get(list_profiles).post(create_profile))
        .route(
            "/profiles/:id",
            get(get_profile).patch(update_profile).delete(delete_profile),
        )
        .route("/profiles/:id/cigarettes", post(add_cigarettes))
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub group_id: Option<i64>,
    pub cigarettes_smoked: i64,
    /// Stored avatar, or the bundled default when there is none.
    pub avatar_url: String,
    pub avatar_content_type: Option<String>,
    pub created_at: String,
}

impl ProfileResponse {
    fn new(profile: Profile, ctx: &AppContext) -> Self {
        let avatar_url = avatar_url(
            profile.avatar.as_ref(),
            ctx.storage.as_ref(),
            &ctx.config.avatar.default_url,
        );
        Self {
            id: profile.id.to_string(),
            username: profile.username,
            email: profile.email,
            first_name: profile.first_name,
            last_name: profile.last_name,
            birth_date: profile.birth_date.map(|d| d.to_string()),
            phone: profile.phone,
            role: profile.role.to_string(),
            group_id: profile.group_id,
            cigarettes_smoked: profile.cigarettes_smoked,
            avatar_url,
            avatar_content_type: profile.avatar.map(|a| a.content_type),
            created_at: profile.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CigarettesRequest {
    pub count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CigarettesResponse {
    pub cigarettes_smoked: i64,
}

/// Decoded profile form.
#[derive(Debug, Default)]
struct ProfileForm {
    fields: HashMap<String, String>,
    upload: Option<UploadPayload>,
    clear: bool,
}

impl ProfileForm {
    async fn read(mut multipart: Multipart) -> std::result::Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                AVATAR_FIELD => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when no file was picked.
                    if !bytes.is_empty() || !filename.is_empty() {
                        form.upload =
                            Some(UploadPayload::new(bytes.to_vec(), filename, content_type));
                    }
                }
                _ => {
                    let value = field.text().await?;
                    if name == AVATAR_CLEAR_FIELD {
                        form.clear = matches!(value.trim(), "on" | "true" | "1");
                    } else {
                        form.fields.insert(name, value);
                    }
                }
            }
        }

        Ok(form)
    }

    /// Copy submitted fields onto the draft. Absent fields are left alone.
    fn apply(mut self, draft: &mut ProfileDraft) -> Result<()> {
        if let Some(username) = self.take("username") {
            let username = username.trim();
            if username.is_empty() {
                return Err(Error::invalid_input("username cannot be empty"));
            }
            draft.username = username.to_string();
        }
        if let Some(email) = self.take("email") {
            draft.email = email.trim().to_string();
        }
        if let Some(first_name) = self.take("first_name") {
            draft.first_name = first_name;
        }
        if let Some(last_name) = self.take("last_name") {
            draft.last_name = last_name;
        }
        if let Some(birth_date) = self.take("birth_date") {
            draft.birth_date = non_empty(&birth_date)
                .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
                .transpose()
                .map_err(|_| Error::invalid_input(format!("invalid birth_date: {}", birth_date)))?;
        }
        if let Some(phone) = self.take("phone") {
            draft.phone = non_empty(&phone).map(str::to_string);
        }
        if let Some(role) = self.take("role") {
            draft.role = role.trim().parse().map_err(Error::invalid_input)?;
        }
        if let Some(group_id) = self.take("group_id") {
            draft.group_id = non_empty(&group_id)
                .map(str::parse::<i64>)
                .transpose()
                .map_err(|_| Error::invalid_input(format!("invalid group_id: {}", group_id)))?;
        }

        match (self.upload, self.clear) {
            (Some(_), true) => {
                return Err(Error::invalid_input(
                    "submit either a new profile image or the clear flag, not both",
                ))
            }
            (Some(upload), false) => draft.avatar = AvatarField::Upload(upload),
            (None, true) => draft.avatar = AvatarField::Empty,
            (None, false) => {}
        }

        Ok(())
    }

    fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn parse_id(id: &str) -> std::result::Result<UserId, AppError> {
    id.parse()
        .map_err(|_| AppError::bad_request(format!("Invalid profile ID: {}", id)))
}

/// Run a store operation on the blocking pool.
async fn blocking<T, F>(f: F) -> std::result::Result<T, AppError>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_profiles(
    State(ctx): State<AppContext>,
) -> std::result::Result<impl IntoResponse, AppError> {
    let store = ctx.store.clone();
    let profiles = blocking(move || store.list()).await?;
    let body: Vec<_> = profiles
        .into_iter()
        .map(|p| ProfileResponse::new(p, &ctx))
        .collect();
    Ok(Json(body))
}

async fn get_profile(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> std::result::Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let store = ctx.store.clone();
    let profile = blocking(move || store.get(id))
        .await?
        .ok_or_else(|| Error::not_found(format!("Profile {} not found", id)))?;
    Ok(Json(ProfileResponse::new(profile, &ctx)))
}

async fn create_profile(
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> std::result::Result<impl IntoResponse, AppError> {
    let form = ProfileForm::read(multipart).await?;
    if !form.fields.contains_key("username") {
        return Err(AppError::bad_request("username is required"));
    }

    let store = ctx.store.clone();
    let profile = blocking(move || {
        let mut draft = ProfileDraft::new("", "");
        form.apply(&mut draft)?;
        store.save(draft)
    })
    .await?;

    tracing::info!(profile_id = %profile.id, username = %profile.username, "profile created");
    Ok((StatusCode::CREATED, Json(ProfileResponse::new(profile, &ctx))))
}

async fn update_profile(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> std::result::Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let form = ProfileForm::read(multipart).await?;

    let store = ctx.store.clone();
    let profile = blocking(move || {
        let current = store
            .get(id)?
            .ok_or_else(|| Error::not_found(format!("Profile {} not found", id)))?;
        let mut draft = ProfileDraft::from_profile(&current);
        form.apply(&mut draft)?;
        store.save(draft)
    })
    .await?;

    Ok(Json(ProfileResponse::new(profile, &ctx)))
}

async fn delete_profile(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> std::result::Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let store = ctx.store.clone();
    blocking(move || store.delete(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_cigarettes(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(request): Json<CigarettesRequest>,
) -> std::result::Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    if request.count == 0 {
        return Err(AppError::bad_request("count must be at least 1"));
    }
    let store = ctx.store.clone();
    let total = blocking(move || store.add_cigarettes(id, request.count)).await?;
    Ok(Json(CigarettesResponse {
        cigarettes_smoked: total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clopetracker_common::{Role, StoredAsset};

    fn form(fields: &[(&str, &str)]) -> ProfileForm {
        ProfileForm {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_fields() {
        let mut draft = ProfileDraft::new("alice", "");
        form(&[
            ("email", " alice@example.com "),
            ("birth_date", "1990-04-12"),
            ("phone", ""),
            ("role", "admin"),
            ("group_id", "7"),
        ])
        .apply(&mut draft)
        .unwrap();

        assert_eq!(draft.email, "alice@example.com");
        assert_eq!(draft.birth_date, NaiveDate::from_ymd_opt(1990, 4, 12));
        assert_eq!(draft.phone, None);
        assert_eq!(draft.role, Role::Admin);
        assert_eq!(draft.group_id, Some(7));
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        for fields in [
            [("birth_date", "12/04/1990")],
            [("role", "owner")],
            [("group_id", "seven")],
            [("username", "  ")],
        ] {
            let mut draft = ProfileDraft::new("bob", "");
            let err = form(&fields).apply(&mut draft).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{fields:?}");
        }
    }

    #[test]
    fn test_apply_avatar_choices() {
        let mut profile = Profile::new("carol", "");
        profile.avatar = Some(StoredAsset::new("profiles/c.webp", "image/webp"));

        let mut draft = ProfileDraft::from_profile(&profile);
        form(&[("first_name", "Carol")]).apply(&mut draft).unwrap();
        assert_eq!(draft.avatar.stored(), profile.avatar.as_ref());

        let mut draft = ProfileDraft::from_profile(&profile);
        let mut clear = form(&[]);
        clear.clear = true;
        clear.apply(&mut draft).unwrap();
        assert_eq!(draft.avatar, AvatarField::Empty);

        let mut draft = ProfileDraft::from_profile(&profile);
        let mut both = form(&[]);
        both.clear = true;
        both.upload = Some(UploadPayload::new(b"x".to_vec(), "x.png", "image/png"));
        assert!(both.apply(&mut draft).is_err());
    }
}
