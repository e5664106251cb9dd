use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::application::collections::TaskStore;
use crate::domain::models::{Session, Task};
use crate::infrastructure::api_client::RoutineApi;
use crate::infrastructure::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Default)]
struct ReorderState {
    order: Vec<Task>,
    dirty: bool,
}

/// Working copy of one routine's task order, edited locally and persisted in
/// a single commit.
///
/// Moves only touch the working copy. `commit` sends the full id sequence to
/// the server; on success the shared task store is rewritten to match, on
/// failure the edited order stays in place (still dirty) so the user can
/// retry or discard it with [`reset`](Self::reset).
pub struct ReorderManager<A: RoutineApi> {
    api: Arc<A>,
    session: Session,
    routine_id: i64,
    store: Arc<TaskStore<A>>,
    state: Mutex<ReorderState>,
    committing: AtomicBool,
}

/// Clears the committing flag even when the commit future is dropped.
struct CommitGuard<'a>(&'a AtomicBool);

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<A: RoutineApi> ReorderManager<A> {
    pub fn new(api: Arc<A>, session: Session, routine_id: i64, store: Arc<TaskStore<A>>) -> Self {
        ReorderManager {
            api,
            session,
            routine_id,
            store,
            state: Mutex::new(ReorderState::default()),
            committing: AtomicBool::new(false),
        }
    }

    /// Rebuilds the working copy from the shared store, discarding any
    /// uncommitted moves. Only confirmed tasks take part; entries still
    /// waiting on a create have no server id to send.
    pub fn reset(&self) -> Result<usize, ApiError> {
        let mut confirmed: Vec<Task> = self
            .store
            .entries()?
            .into_iter()
            .filter(|entry| !entry.is_pending())
            .map(|entry| entry.value)
            .collect();
        confirmed.sort_by_key(|task| (task.position.unwrap_or(i32::MAX), task.task_id));

        let mut state = self.lock_state()?;
        state.order = confirmed;
        state.dirty = false;
        Ok(state.order.len())
    }

    pub fn tasks(&self) -> Result<Vec<Task>, ApiError> {
        Ok(self.lock_state()?.order.clone())
    }

    pub fn is_dirty(&self) -> Result<bool, ApiError> {
        Ok(self.lock_state()?.dirty)
    }

    /// Swaps the task at `index` with its neighbour. Returns `false` when the
    /// move would fall off either end of the list.
    pub fn move_task(&self, index: usize, direction: MoveDirection) -> Result<bool, ApiError> {
        let mut state = self.lock_state()?;
        if index >= state.order.len() {
            return Err(ApiError::Validation(format!(
                "no task at position {index}"
            )));
        }
        let neighbour = match direction {
            MoveDirection::Up => {
                let Some(neighbour) = index.checked_sub(1) else {
                    return Ok(false);
                };
                neighbour
            }
            MoveDirection::Down => {
                if index + 1 >= state.order.len() {
                    return Ok(false);
                }
                index + 1
            }
        };
        state.order.swap(index, neighbour);
        state.dirty = true;
        Ok(true)
    }

    /// Persists the working order. Returns `Ok(false)` without touching the
    /// network when there is nothing to save or a commit is already in
    /// flight.
    pub async fn commit(&self) -> Result<bool, ApiError> {
        let ordered_ids: Vec<i64> = {
            let state = self.lock_state()?;
            if !state.dirty {
                return Ok(false);
            }
            state.order.iter().map(|task| task.task_id).collect()
        };

        if self
            .committing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(false);
        }
        let _guard = CommitGuard(&self.committing);

        self.api
            .reorder_tasks(&self.session, self.routine_id, &ordered_ids)
            .await?;

        if self.store.scope().is_live() {
            self.apply_committed_order(&ordered_ids)?;
        }
        Ok(true)
    }

    /// Rewrites positions in both copies to match the saved order and moves
    /// the store's confirmed entries into that order. Pending entries keep
    /// their place at the head.
    fn apply_committed_order(&self, ordered_ids: &[i64]) -> Result<(), ApiError> {
        let position_of: HashMap<i64, i32> = ordered_ids
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index as i32))
            .collect();

        {
            let mut state = self.lock_state()?;
            for (index, task) in state.order.iter_mut().enumerate() {
                task.position = Some(index as i32);
            }
            state.dirty = false;
        }

        self.store.mutate(|entries| {
            for entry in entries.iter_mut() {
                if let Some(id) = entry.key.confirmed_id() {
                    if let Some(position) = position_of.get(&id) {
                        entry.value.position = Some(*position);
                    }
                }
            }
            entries.sort_by_key(|entry| match entry.key.confirmed_id() {
                // Stable sort: pending entries stay in front, confirmed ones
                // follow the committed sequence, strangers go last.
                None => (0, 0),
                Some(id) => match position_of.get(&id) {
                    Some(position) => (1, *position),
                    None => (1, i32::MAX),
                },
            });
        })
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ReorderState>, ApiError> {
        self.state.lock().map_err(|error| {
            ApiError::InvalidState(format!("reorder state lock poisoned: {error}"))
        })
    }
}
