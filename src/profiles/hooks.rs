use clopetracker_common::{Result, StoredAsset};
use clopetracker_db::models::Profile;

use super::ProfileDraft;

/// State carried from `before_persist` to the outcome callbacks of one
/// mutation. It lives only as long as the mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistContext {
    /// Previously live asset to delete once the mutation has committed.
    pub superseded: Option<StoredAsset>,
    /// Asset written during `before_persist`.
    pub written: Option<StoredAsset>,
}

impl PersistContext {
    pub fn is_empty(&self) -> bool {
        self.superseded.is_none() && self.written.is_none()
    }
}

/// Callbacks around profile mutations, registered on a `ProfileStore`.
///
/// Hooks run synchronously on the thread performing the mutation.
pub trait ProfileHooks: Send + Sync {
    /// Called before a create or update commits. `previous` is the committed
    /// snapshot (`None` on creation). Returning an error aborts the mutation.
    fn before_persist(
        &self,
        draft: &mut ProfileDraft,
        previous: Option<&Profile>,
    ) -> Result<PersistContext>;

    /// Called after the mutation committed, with the committed record.
    fn after_persist(&self, profile: &Profile, ctx: PersistContext);

    /// Called instead of `after_persist` when the mutation did not commit.
    fn persist_failed(&self, ctx: PersistContext) {
        let _ = ctx;
    }

    /// Called after a record was deleted, with the record as it was.
    fn after_delete(&self, profile: &Profile);
}
