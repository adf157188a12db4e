//! Removal of avatar files no profile refers to.
//!
//! The lifecycle hooks keep storage clean during normal operation; this sweep
//! catches what they could not, such as deletes that failed and were only
//! logged, or files left by a process that died mid-mutation.

use serde::Serialize;

use clopetracker_common::Result;

use super::storage::AssetStorage;
use crate::profiles::ProfileStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Files found under the upload directory.
    pub scanned: usize,
    /// Files still referenced by a profile.
    pub referenced: usize,
    /// Orphans removed, or that would be removed on a dry run.
    pub removed: Vec<String>,
    /// Orphans whose removal failed.
    pub failed: Vec<String>,
}

/// Delete every file under `upload_dir` that no profile references.
///
/// Must not run concurrently with profile mutations: an upload written by an
/// uncommitted mutation looks like an orphan.
pub fn prune_orphans(
    store: &ProfileStore,
    storage: &dyn AssetStorage,
    upload_dir: &str,
    dry_run: bool,
) -> Result<SweepReport> {
    let referenced = store.referenced_avatar_names()?;
    let files = storage.list(upload_dir.trim_matches('/'))?;

    let mut report = SweepReport {
        scanned: files.len(),
        ..Default::default()
    };

    for name in files {
        if referenced.contains(&name) {
            report.referenced += 1;
            continue;
        }
        if dry_run {
            tracing::info!(name = %name, "orphaned avatar (dry run)");
            report.removed.push(name);
            continue;
        }
        match storage.delete(&name) {
            Ok(()) => {
                tracing::info!(name = %name, "removed orphaned avatar");
                report.removed.push(name);
            }
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "failed to remove orphaned avatar");
                report.failed.push(name);
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::storage::FileSystemStorage;
    use crate::profiles::{AvatarField, ProfileDraft};
    use clopetracker_common::StoredAsset;
    use clopetracker_db::pool::init_memory_pool;

    #[test]
    fn test_prune_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::new(dir.path(), "/media/");
        let store = ProfileStore::new(init_memory_pool().unwrap());

        let live = storage.write("profiles/live.webp", b"live").unwrap();
        let orphan = storage.write("profiles/orphan.webp", b"orphan").unwrap();
        let elsewhere = storage.write("other/keep.txt", b"keep").unwrap();

        let mut draft = ProfileDraft::new("alice", "");
        draft.avatar = AvatarField::Stored(StoredAsset::new(live.clone(), "image/webp"));
        store.save(draft).unwrap();

        let report = prune_orphans(&store, &storage, "profiles", true).unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.referenced, 1);
        assert_eq!(report.removed, vec![orphan.clone()]);
        assert!(storage.exists(&orphan).unwrap());

        let report = prune_orphans(&store, &storage, "profiles/", false).unwrap();
        assert_eq!(report.removed, vec![orphan.clone()]);
        assert!(report.failed.is_empty());
        assert!(!storage.exists(&orphan).unwrap());
        assert!(storage.exists(&live).unwrap());
        assert!(storage.exists(&elsewhere).unwrap());
    }
}
