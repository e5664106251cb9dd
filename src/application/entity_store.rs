use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{Mutex as MutationLock, OwnedMutexGuard};

use crate::application::scope::ScopeToken;
use crate::domain::models::{Entry, EntryKey};
use crate::infrastructure::error::ApiError;

/// Remote CRUD surface for one entity kind, as seen by [`EntityStore`].
///
/// Implementations bind an API client to a fixed session (and, for tasks, a
/// fixed parent routine) so the store itself stays generic over the entity.
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    type Entity: Clone + Send + Sync + 'static;
    type Draft: Send + Sync;
    type Patch: Send + Sync;

    /// Entity kind name used in error messages, e.g. "routine".
    fn label(&self) -> &'static str;

    fn entity_id(&self, entity: &Self::Entity) -> i64;

    fn validate_draft(&self, draft: &Self::Draft) -> Result<(), String>;

    fn validate_patch(&self, patch: &Self::Patch) -> Result<(), String>;

    /// Provisional entity shown while a create is in flight.
    fn placeholder(&self, draft: &Self::Draft) -> Self::Entity;

    /// Applies the fields present in `patch` onto `entity`, leaving the rest
    /// untouched. Must mirror the server's update semantics.
    fn apply_patch(&self, entity: &mut Self::Entity, patch: &Self::Patch);

    async fn list(&self) -> Result<Vec<Self::Entity>, ApiError>;

    async fn create(&self, draft: &Self::Draft) -> Result<Self::Entity, ApiError>;

    async fn update(&self, id: i64, patch: &Self::Patch) -> Result<Self::Entity, ApiError>;

    async fn delete(&self, id: i64) -> Result<(), ApiError>;
}

/// Receipt for a staged create: the pending entry is already visible in the
/// store under `key` and must be settled via [`EntityStore::finish_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedCreate {
    pub key: EntryKey,
}

/// Local working copy of one remote collection with optimistic writes.
///
/// Every mutation applies its local effect first, then settles it against the
/// remote outcome: a success commits the server's representation, a failure
/// rolls the staged change back so the collection is indistinguishable from
/// one where the call never happened. Mutations targeting the same entry are
/// serialized through a per-key lock so a rollback can never resurrect state
/// that an earlier, already-committed mutation replaced.
pub struct EntityStore<C: RemoteCollection> {
    collection: C,
    entries: Mutex<Vec<Entry<C::Entity>>>,
    mutation_locks: Mutex<HashMap<EntryKey, Arc<MutationLock<()>>>>,
    scope: ScopeToken,
}

impl<C: RemoteCollection> EntityStore<C> {
    pub fn new(collection: C) -> Self {
        Self::with_scope(collection, ScopeToken::new())
    }

    pub fn with_scope(collection: C, scope: ScopeToken) -> Self {
        EntityStore {
            collection,
            entries: Mutex::new(Vec::new()),
            mutation_locks: Mutex::new(HashMap::new()),
            scope,
        }
    }

    pub fn scope(&self) -> &ScopeToken {
        &self.scope
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    /// Replaces the working copy with the server's current listing.
    ///
    /// Pending entries are dropped: the listing is the source of truth, and a
    /// create still in flight will simply return its result to the caller
    /// without being spliced back in.
    pub async fn refresh(&self) -> Result<usize, ApiError> {
        let fetched = self.collection.list().await?;
        let count = fetched.len();
        if self.scope.is_live() {
            let confirmed = fetched
                .into_iter()
                .map(|entity| Entry::confirmed(self.collection.entity_id(&entity), entity))
                .collect();
            *self.lock_entries()? = confirmed;
        }
        Ok(count)
    }

    /// Stages a create: validates the draft and inserts a pending placeholder
    /// at the head of the collection, where new items appear in the UI.
    ///
    /// This never blocks on other mutations; the returned receipt must be
    /// settled with [`finish_create`](Self::finish_create).
    pub fn begin_create(&self, draft: &C::Draft) -> Result<StagedCreate, ApiError> {
        self.collection
            .validate_draft(draft)
            .map_err(ApiError::Validation)?;
        let key = EntryKey::fresh_pending();
        let placeholder = self.collection.placeholder(draft);
        self.lock_entries()?.insert(
            0,
            Entry {
                key,
                value: placeholder,
            },
        );
        Ok(StagedCreate { key })
    }

    /// Settles a staged create against the remote outcome.
    ///
    /// On success the pending entry is replaced in place by the server's
    /// representation under its confirmed key; on failure it is removed, and
    /// `draft` remains untouched in the caller's hands for a retry.
    pub async fn finish_create(
        &self,
        staged: StagedCreate,
        draft: &C::Draft,
    ) -> Result<C::Entity, ApiError> {
        match self.collection.create(draft).await {
            Ok(created) => {
                if self.scope.is_live() {
                    self.commit_create(staged.key, created.clone())?;
                }
                Ok(created)
            }
            Err(error) => {
                if self.scope.is_live() {
                    self.roll_back_create(staged.key)?;
                }
                Err(error)
            }
        }
    }

    pub async fn create(&self, draft: &C::Draft) -> Result<C::Entity, ApiError> {
        let staged = self.begin_create(draft)?;
        self.finish_create(staged, draft).await
    }

    /// Applies `patch` optimistically, then settles against the server.
    ///
    /// The final value is always the server's returned representation, not
    /// the local guess; a failure restores the exact prior entity.
    pub async fn update(&self, key: EntryKey, patch: &C::Patch) -> Result<C::Entity, ApiError> {
        self.collection
            .validate_patch(patch)
            .map_err(ApiError::Validation)?;
        let id = self.confirmed_id(key)?;
        let _serial = self.mutation_guard(key).await?;

        let prior = self.stage_update(key, patch)?;
        match self.collection.update(id, patch).await {
            Ok(server) => {
                if self.scope.is_live() {
                    self.commit_update(key, server.clone())?;
                }
                Ok(server)
            }
            Err(error) => {
                if self.scope.is_live() {
                    self.roll_back_update(key, prior)?;
                }
                Err(error)
            }
        }
    }

    /// Removes the entry optimistically, then settles against the server.
    ///
    /// A failure reinserts the entity at its original index, clamped to the
    /// current collection length.
    pub async fn delete(&self, key: EntryKey) -> Result<(), ApiError> {
        let id = self.confirmed_id(key)?;
        let _serial = self.mutation_guard(key).await?;

        let (removed, index) = self.stage_delete(key)?;
        match self.collection.delete(id).await {
            Ok(()) => Ok(()),
            Err(error) => {
                if self.scope.is_live() {
                    self.roll_back_delete(removed, index)?;
                }
                Err(error)
            }
        }
    }

    pub fn entries(&self) -> Result<Vec<Entry<C::Entity>>, ApiError> {
        Ok(self.lock_entries()?.clone())
    }

    pub fn get(&self, key: EntryKey) -> Result<Option<Entry<C::Entity>>, ApiError> {
        Ok(self
            .lock_entries()?
            .iter()
            .find(|entry| entry.key == key)
            .cloned())
    }

    pub fn len(&self) -> Result<usize, ApiError> {
        Ok(self.lock_entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ApiError> {
        Ok(self.lock_entries()?.is_empty())
    }

    /// Swaps in a previously captured snapshot. Used by managers that stage
    /// multi-entry mutations and roll the whole collection back on failure.
    pub(crate) fn restore(&self, snapshot: Vec<Entry<C::Entity>>) -> Result<(), ApiError> {
        *self.lock_entries()? = snapshot;
        Ok(())
    }

    /// Runs an in-place edit on the working copy under the store lock.
    pub(crate) fn mutate<F>(&self, edit: F) -> Result<(), ApiError>
    where
        F: FnOnce(&mut Vec<Entry<C::Entity>>),
    {
        edit(&mut *self.lock_entries()?);
        Ok(())
    }

    fn confirmed_id(&self, key: EntryKey) -> Result<i64, ApiError> {
        key.confirmed_id().ok_or_else(|| {
            ApiError::InvalidState(format!(
                "{} {key} is still waiting for the server; retry once it is confirmed",
                self.collection.label()
            ))
        })
    }

    /// Hands out the per-key lock guard, creating the lock on first use.
    async fn mutation_guard(&self, key: EntryKey) -> Result<OwnedMutexGuard<()>, ApiError> {
        let lock = {
            let mut locks = self.mutation_locks.lock().map_err(|error| {
                ApiError::InvalidState(format!(
                    "{} mutation lock table poisoned: {error}",
                    self.collection.label()
                ))
            })?;
            locks
                .entry(key)
                .or_insert_with(|| Arc::new(MutationLock::new(())))
                .clone()
        };
        Ok(lock.lock_owned().await)
    }

    fn commit_create(&self, key: EntryKey, created: C::Entity) -> Result<(), ApiError> {
        let mut entries = self.lock_entries()?;
        // A refresh may have dropped the pending entry; the listing already
        // reflects the server, so there is nothing left to replace.
        if let Some(entry) = entries.iter_mut().find(|entry| entry.key == key) {
            *entry = Entry::confirmed(self.collection.entity_id(&created), created);
        }
        Ok(())
    }

    fn roll_back_create(&self, key: EntryKey) -> Result<(), ApiError> {
        self.lock_entries()?.retain(|entry| entry.key != key);
        Ok(())
    }

    fn stage_update(&self, key: EntryKey, patch: &C::Patch) -> Result<C::Entity, ApiError> {
        let mut entries = self.lock_entries()?;
        let Some(entry) = entries.iter_mut().find(|entry| entry.key == key) else {
            return Err(ApiError::Validation(format!(
                "{} not found: {key}",
                self.collection.label()
            )));
        };
        let prior = entry.value.clone();
        self.collection.apply_patch(&mut entry.value, patch);
        Ok(prior)
    }

    fn commit_update(&self, key: EntryKey, server: C::Entity) -> Result<(), ApiError> {
        let mut entries = self.lock_entries()?;
        if let Some(entry) = entries.iter_mut().find(|entry| entry.key == key) {
            entry.value = server;
        }
        Ok(())
    }

    fn roll_back_update(&self, key: EntryKey, prior: C::Entity) -> Result<(), ApiError> {
        let mut entries = self.lock_entries()?;
        if let Some(entry) = entries.iter_mut().find(|entry| entry.key == key) {
            entry.value = prior;
        }
        Ok(())
    }

    fn stage_delete(&self, key: EntryKey) -> Result<(Entry<C::Entity>, usize), ApiError> {
        let mut entries = self.lock_entries()?;
        let Some(index) = entries.iter().position(|entry| entry.key == key) else {
            return Err(ApiError::Validation(format!(
                "{} not found: {key}",
                self.collection.label()
            )));
        };
        Ok((entries.remove(index), index))
    }

    fn roll_back_delete(&self, removed: Entry<C::Entity>, index: usize) -> Result<(), ApiError> {
        let mut entries = self.lock_entries()?;
        let slot = index.min(entries.len());
        entries.insert(slot, removed);
        Ok(())
    }

    fn lock_entries(&self) -> Result<MutexGuard<'_, Vec<Entry<C::Entity>>>, ApiError> {
        self.entries.lock().map_err(|error| {
            ApiError::InvalidState(format!(
                "{} store lock poisoned: {error}",
                self.collection.label()
            ))
        })
    }
}
