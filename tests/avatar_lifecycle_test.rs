//! Avatar lifecycle integration tests
//!
//! Drive the profile store with the avatar coordinator registered and check
//! what ends up on storage.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clopetracker::avatar::{
    avatar_url, prune_orphans, AssetStorage, AvatarCoordinator, FileSystemStorage, StorageError,
};
use clopetracker::config::Config;
use clopetracker::profiles::{AvatarField, ProfileDraft, ProfileStore};
use clopetracker_common::{Error, UploadPayload};
use clopetracker_db::models::Profile;
use clopetracker_db::pool::init_memory_pool;
use clopetracker_imaging::{NormalizeSettings, Normalizer};
use common::{near, png, split_jpeg, with_exif_orientation, TestHarness};

fn upload(bytes: Vec<u8>, filename: &str, content_type: &str) -> AvatarField {
    AvatarField::Upload(UploadPayload::new(bytes, filename, content_type))
}

fn create_with_avatar(store: &ProfileStore, username: &str, bytes: Vec<u8>) -> Profile {
    let mut draft = ProfileDraft::new(username, format!("{}@example.com", username));
    draft.avatar = upload(bytes, "me.png", "image/png");
    store.save(draft).unwrap()
}

fn replace_avatar(store: &ProfileStore, profile: &Profile, bytes: Vec<u8>) -> Profile {
    let mut draft = ProfileDraft::from_profile(profile);
    draft.avatar = upload(bytes, "me.png", "image/png");
    store.save(draft).unwrap()
}

#[test]
fn test_upload_is_normalized_and_stored() {
    let harness = TestHarness::new();
    let profile = create_with_avatar(harness.store(), "alice", png(900, 400));

    let avatar = profile.avatar.clone().unwrap();
    assert_eq!(avatar.name, "profiles/me.webp");
    assert_eq!(avatar.content_type, "image/webp");

    let stored = harness.ctx.storage.read(&avatar.name).unwrap();
    let decoded = image::load_from_memory(&stored).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (512, 512));

    let loaded = harness.store().get(profile.id).unwrap().unwrap();
    assert_eq!(loaded.avatar, Some(avatar));
}

#[test]
fn test_non_ascii_upload_name_keeps_extension() {
    let harness = TestHarness::new();
    let mut draft = ProfileDraft::new("yuri", "");
    draft.avatar = upload(png(64, 64), "фото.jpg", "image/jpeg");
    let profile = harness.store().save(draft).unwrap();

    let avatar = profile.avatar.unwrap();
    assert_eq!(avatar.name, "profiles/avatar.webp");
    assert_eq!(avatar.content_type, "image/webp");
    assert!(harness.ctx.storage.exists(&avatar.name).unwrap());
}

#[test]
fn test_two_updates_leave_one_asset() {
    let harness = TestHarness::new();
    let store = harness.store();

    let v1 = create_with_avatar(store, "bob", png(300, 300));
    let v2 = replace_avatar(store, &v1, png(640, 480));
    let v3 = replace_avatar(store, &v2, png(480, 640));

    // Same upload name every time: later writes get a unique suffix.
    assert_ne!(v1.avatar_name(), v2.avatar_name());
    assert_ne!(v2.avatar_name(), v3.avatar_name());

    let live = v3.avatar_name().unwrap().to_string();
    assert_eq!(harness.avatar_files(), vec![live]);
}

#[test]
fn test_updating_other_fields_keeps_asset() {
    let harness = TestHarness::new();
    let store = harness.store();

    let profile = create_with_avatar(store, "carol", png(200, 200));
    let name = profile.avatar_name().unwrap().to_string();
    let before = harness.ctx.storage.read(&name).unwrap();

    let mut draft = ProfileDraft::from_profile(&profile);
    draft.first_name = "Carol".into();
    draft.phone = Some("+33 1 23 45 67 89".into());
    let updated = store.save(draft).unwrap();

    assert_eq!(updated.avatar, profile.avatar);
    assert_eq!(harness.ctx.storage.read(&name).unwrap(), before);
    assert_eq!(harness.avatar_files(), vec![name]);
}

#[test]
fn test_clearing_removes_asset() {
    let harness = TestHarness::new();
    let store = harness.store();

    let profile = create_with_avatar(store, "dave", png(100, 100));
    let mut draft = ProfileDraft::from_profile(&profile);
    draft.avatar = AvatarField::Empty;
    let cleared = store.save(draft).unwrap();

    assert!(cleared.avatar.is_none());
    assert!(harness.avatar_files().is_empty());
    assert_eq!(
        avatar_url(
            cleared.avatar.as_ref(),
            harness.ctx.storage.as_ref(),
            &harness.ctx.config.avatar.default_url
        ),
        "/static/image/profiles/imageProfilDefaut.png"
    );
}

#[test]
fn test_deleting_profile_removes_asset() {
    let harness = TestHarness::new();
    let store = harness.store();

    let profile = create_with_avatar(store, "erin", png(64, 64));
    assert_eq!(harness.avatar_files().len(), 1);

    let deleted = store.delete(profile.id).unwrap();
    assert_eq!(deleted.avatar, profile.avatar);
    assert!(harness.avatar_files().is_empty());
    assert!(store.get(profile.id).unwrap().is_none());
}

#[test]
fn test_corrupt_upload_is_stored_raw() {
    let harness = TestHarness::new();
    let garbage = b"\x89PNG\r\n\x1a\nthis is not really a png".to_vec();

    let mut draft = ProfileDraft::new("frank", "");
    draft.avatar = upload(garbage.clone(), "avatar.png", "image/png");
    let profile = harness.store().save(draft).unwrap();

    let avatar = profile.avatar.unwrap();
    assert_eq!(avatar.name, "profiles/avatar.png");
    assert_eq!(avatar.content_type, "image/png");
    assert_eq!(harness.ctx.storage.read(&avatar.name).unwrap(), garbage);
}

#[test]
fn test_undecodable_rejected_when_configured() {
    let mut config = Config::default();
    config.avatar.reject_undecodable = true;
    let harness = TestHarness::with_config(config);

    let mut draft = ProfileDraft::new("gina", "");
    draft.avatar = upload(b"garbage".to_vec(), "avatar.png", "image/png");
    let err = harness.store().save(draft).unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(harness.store().list().unwrap().is_empty());
    assert!(harness.avatar_files().is_empty());
}

#[test]
fn test_exif_rotated_photo_is_upright() {
    let harness = TestHarness::new();
    // Landscape sensor data tagged "rotate 90° clockwise to display".
    let photo = with_exif_orientation(&split_jpeg(800, 600), 6);

    let mut draft = ProfileDraft::new("hank", "");
    draft.avatar = upload(photo, "IMG_0001.JPG", "image/jpeg");
    let profile = harness.store().save(draft).unwrap();

    let avatar = profile.avatar.unwrap();
    assert_eq!(avatar.name, "profiles/IMG_0001.webp");
    assert_eq!(avatar.content_type, "image/webp");

    let stored = harness.ctx.storage.read(&avatar.name).unwrap();
    let img = image::load_from_memory(&stored).unwrap().to_rgb8();
    assert_eq!(img.dimensions(), (512, 512));
    // The left (red) half of the sensor ends up on top.
    assert!(near(img.get_pixel(256, 100), [255, 0, 0]));
    assert!(near(img.get_pixel(256, 412), [0, 0, 255]));
}

#[test]
fn test_failed_commit_removes_written_asset() {
    let harness = TestHarness::new();
    let store = harness.store();
    let existing = create_with_avatar(store, "ivan", png(50, 50));

    // Username clash: the insert fails after the upload was stored.
    let mut draft = ProfileDraft::new("ivan", "");
    draft.avatar = upload(png(60, 60), "other.png", "image/png");
    let err = store.save(draft).unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(
        harness.avatar_files(),
        vec![existing.avatar_name().unwrap().to_string()]
    );
}

#[test]
fn test_stale_update_conflicts_without_side_effects() {
    let harness = TestHarness::new();
    let store = harness.store();
    let profile = create_with_avatar(store, "jane", png(50, 50));

    let stale = ProfileDraft::from_profile(&profile);
    let winner = replace_avatar(store, &profile, png(70, 70));

    let mut loser = stale;
    loser.avatar = upload(png(80, 80), "late.png", "image/png");
    let err = store.save(loser).unwrap_err();

    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(
        harness.avatar_files(),
        vec![winner.avatar_name().unwrap().to_string()]
    );
}

/// Filesystem storage whose writes or deletes can be made to fail.
struct FlakyStorage {
    inner: FileSystemStorage,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FlakyStorage {
    fn new(root: &std::path::Path) -> Self {
        Self {
            inner: FileSystemStorage::new(root, "/media/"),
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }
}

impl AssetStorage for FlakyStorage {
    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        self.inner.exists(name)
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                name: name.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.write(name, bytes)
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Delete {
                name: name.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.inner.delete(name)
    }

    fn url_for(&self, name: &str) -> String {
        self.inner.url_for(name)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.read(name)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list(prefix)
    }
}

fn flaky_store() -> (tempfile::TempDir, Arc<FlakyStorage>, ProfileStore) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FlakyStorage::new(dir.path()));
    let coordinator = AvatarCoordinator::new(
        Normalizer::new(NormalizeSettings::default()),
        storage.clone(),
        "profiles",
    );
    let store = ProfileStore::new(init_memory_pool().unwrap()).with_hook(Arc::new(coordinator));
    (dir, storage, store)
}

#[test]
fn test_delete_failures_are_swallowed() {
    let (_dir, storage, store) = flaky_store();
    let v1 = create_with_avatar(&store, "kim", png(40, 40));
    storage.fail_deletes.store(true, Ordering::SeqCst);

    // Superseding still commits.
    let v2 = replace_avatar(&store, &v1, png(41, 41));
    assert_ne!(v1.avatar_name(), v2.avatar_name());
    assert_eq!(store.get(v1.id).unwrap().unwrap().avatar, v2.avatar);

    // Deleting still succeeds; the file is left for the orphan sweep.
    store.delete(v2.id).unwrap();
    assert!(store.get(v2.id).unwrap().is_none());
    assert_eq!(storage.list("profiles").unwrap().len(), 2);

    storage.fail_deletes.store(false, Ordering::SeqCst);
    let report = prune_orphans(&store, storage.as_ref(), "profiles", false).unwrap();
    assert_eq!(report.removed.len(), 2);
    assert!(storage.list("profiles").unwrap().is_empty());
}

#[test]
fn test_write_failure_aborts_mutation() {
    let (_dir, storage, store) = flaky_store();
    let profile = create_with_avatar(&store, "leo", png(40, 40));
    storage.fail_writes.store(true, Ordering::SeqCst);

    let mut draft = ProfileDraft::from_profile(&profile);
    draft.first_name = "Leo".into();
    draft.avatar = upload(png(45, 45), "new.png", "image/png");
    let err = store.save(draft).unwrap_err();

    assert!(matches!(err, Error::Storage(_)));
    let loaded = store.get(profile.id).unwrap().unwrap();
    assert_eq!(loaded.first_name, "");
    assert_eq!(loaded.avatar, profile.avatar);
    assert!(storage.exists(profile.avatar_name().unwrap()).unwrap());
}

#[test]
fn test_prune_orphans_keeps_live_assets() {
    let harness = TestHarness::new();
    let profile = create_with_avatar(harness.store(), "mia", png(30, 30));
    let orphan = harness
        .ctx
        .storage
        .write("profiles/leftover.webp", b"stale")
        .unwrap();

    let report = prune_orphans(
        harness.store(),
        harness.ctx.storage.as_ref(),
        "profiles",
        false,
    )
    .unwrap();

    assert_eq!(report.scanned, 2);
    assert_eq!(report.referenced, 1);
    assert_eq!(report.removed, vec![orphan]);
    assert_eq!(
        harness.avatar_files(),
        vec![profile.avatar_name().unwrap().to_string()]
    );
}
