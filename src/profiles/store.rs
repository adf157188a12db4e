//! Profile persistence with lifecycle hooks.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use clopetracker_common::{Error, Result, UserId};
use clopetracker_db::models::Profile;
use clopetracker_db::pool::{get_conn, DbPool};
use clopetracker_db::queries::profiles;

use super::{PersistContext, ProfileDraft, ProfileHooks};

/// Commits profile mutations and runs the registered hooks around them.
///
/// At most one pooled connection is held at a time, and never while a hook
/// runs.
#[derive(Clone)]
pub struct ProfileStore {
    pool: DbPool,
    hooks: Vec<Arc<dyn ProfileHooks>>,
}

impl ProfileStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            hooks: Vec::new(),
        }
    }

    /// Register a hook. Hooks run in registration order.
    pub fn with_hook(mut self, hook: Arc<dyn ProfileHooks>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn get(&self, id: UserId) -> Result<Option<Profile>> {
        let conn = get_conn(&self.pool)?;
        profiles::get_profile(&conn, id)
    }

    pub fn get_by_username(&self, username: &str) -> Result<Option<Profile>> {
        let conn = get_conn(&self.pool)?;
        profiles::get_profile_by_username(&conn, username)
    }

    pub fn list(&self) -> Result<Vec<Profile>> {
        let conn = get_conn(&self.pool)?;
        profiles::list_profiles(&conn)
    }

    /// Create or update a profile.
    ///
    /// The update is rejected with [`Error::Conflict`] if the stored avatar is
    /// no longer the one the draft was loaded with, either before the hooks
    /// run or at commit time.
    pub fn save(&self, mut draft: ProfileDraft) -> Result<Profile> {
        let previous = match draft.id() {
            Some(id) => {
                let current = self
                    .get(id)?
                    .ok_or_else(|| Error::not_found(format!("Profile {} not found", id)))?;
                if current.avatar_name() != draft.base_avatar() {
                    return Err(avatar_conflict(id));
                }
                Some(current)
            }
            None => None,
        };

        let mut contexts = Vec::with_capacity(self.hooks.len());
        for hook in &self.hooks {
            match hook.before_persist(&mut draft, previous.as_ref()) {
                Ok(ctx) => contexts.push(ctx),
                Err(e) => {
                    self.notify_failed(contexts);
                    return Err(e);
                }
            }
        }

        let id = previous.as_ref().map_or_else(UserId::new, |p| p.id);
        let created_at = draft.created_at().unwrap_or_else(Utc::now);
        let committed = draft
            .into_profile(id, created_at)
            .and_then(|profile| self.commit(&profile, previous.as_ref()));

        match committed {
            Ok(profile) => {
                tracing::debug!(profile_id = %profile.id, "profile saved");
                for (hook, ctx) in self.hooks.iter().zip(contexts) {
                    hook.after_persist(&profile, ctx);
                }
                Ok(profile)
            }
            Err(e) => {
                self.notify_failed(contexts);
                Err(e)
            }
        }
    }

    /// Delete a profile and return it as it was.
    pub fn delete(&self, id: UserId) -> Result<Profile> {
        let deleted = {
            let conn = get_conn(&self.pool)?;
            profiles::delete_profile(&conn, id)?
        }
        .ok_or_else(|| Error::not_found(format!("Profile {} not found", id)))?;

        tracing::info!(profile_id = %id, username = %deleted.username, "profile deleted");
        for hook in &self.hooks {
            hook.after_delete(&deleted);
        }
        Ok(deleted)
    }

    /// Add to the cigarette counter and return the new total.
    pub fn add_cigarettes(&self, id: UserId, count: u32) -> Result<i64> {
        let conn = get_conn(&self.pool)?;
        profiles::add_cigarettes(&conn, id, count)?
            .ok_or_else(|| Error::not_found(format!("Profile {} not found", id)))
    }

    /// Every avatar name still referenced by a profile.
    pub fn referenced_avatar_names(&self) -> Result<HashSet<String>> {
        let conn = get_conn(&self.pool)?;
        Ok(profiles::list_avatar_names(&conn)?.into_iter().collect())
    }

    /// Write the profile and return the row as stored.
    fn commit(&self, profile: &Profile, previous: Option<&Profile>) -> Result<Profile> {
        let conn = get_conn(&self.pool)?;
        let Some(previous) = previous else {
            profiles::insert_profile(&conn, profile)?;
            return Ok(profile.clone());
        };

        if let Some(updated) = profiles::update_profile(&conn, profile, previous.avatar_name())? {
            return Ok(updated);
        }
        match profiles::get_profile(&conn, profile.id)? {
            Some(_) => Err(avatar_conflict(profile.id)),
            None => Err(Error::not_found(format!("Profile {} not found", profile.id))),
        }
    }

    fn notify_failed(&self, contexts: Vec<PersistContext>) {
        for (hook, ctx) in self.hooks.iter().zip(contexts) {
            hook.persist_failed(ctx);
        }
    }
}

fn avatar_conflict(id: UserId) -> Error {
    Error::conflict(format!("Avatar of profile {} changed concurrently", id))
}
