use std::sync::Arc;

use crate::application::collections::RoutineStore;
use crate::domain::models::{Entry, EntryKey, Routine, RoutinePatch, Session};
use crate::infrastructure::api_client::RoutineApi;
use crate::infrastructure::error::ApiError;

/// Switches which routine is active, keeping the rule that at most one is.
///
/// The flip is applied to the whole working copy first, then persisted as two
/// sequential updates: deactivate the previous holder, activate the target.
/// If either call fails the entire collection snapshot is restored, so a
/// half-applied switch is never left behind.
pub struct ActiveSelectionManager<A: RoutineApi> {
    api: Arc<A>,
    session: Session,
    store: Arc<RoutineStore<A>>,
}

impl<A: RoutineApi> ActiveSelectionManager<A> {
    pub fn new(api: Arc<A>, session: Session, store: Arc<RoutineStore<A>>) -> Self {
        ActiveSelectionManager {
            api,
            session,
            store,
        }
    }

    pub async fn set_active(&self, target: EntryKey) -> Result<(), ApiError> {
        let Some(target_id) = target.confirmed_id() else {
            return Err(ApiError::InvalidState(format!(
                "routine {target} is still waiting for the server; retry once it is confirmed"
            )));
        };

        let snapshot = self.store.entries()?;
        if !snapshot.iter().any(|entry| entry.key == target) {
            return Err(ApiError::Validation(format!("routine not found: {target}")));
        }
        let previous = snapshot
            .iter()
            .find(|entry| entry.key != target && entry.value.active())
            .and_then(|entry| entry.key.confirmed_id());

        self.store.mutate(|entries| {
            for entry in entries.iter_mut() {
                entry.value.is_active = Some(entry.key == target);
            }
        })?;

        if let Some(previous_id) = previous {
            if let Err(error) = self
                .api
                .update_routine(&self.session, previous_id, &RoutinePatch::activation(false))
                .await
            {
                self.roll_back(snapshot)?;
                return Err(error);
            }
        }

        match self
            .api
            .update_routine(&self.session, target_id, &RoutinePatch::activation(true))
            .await
        {
            Ok(server) => {
                if self.store.scope().is_live() {
                    self.store.mutate(|entries| {
                        if let Some(entry) =
                            entries.iter_mut().find(|entry| entry.key == target)
                        {
                            entry.value = server;
                        }
                    })?;
                }
                Ok(())
            }
            Err(error) => {
                self.roll_back(snapshot)?;
                Err(error)
            }
        }
    }

    fn roll_back(&self, snapshot: Vec<Entry<Routine>>) -> Result<(), ApiError> {
        if self.store.scope().is_live() {
            self.store.restore(snapshot)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::application::collections::RoutineCollection;
    use crate::application::entity_store::EntityStore;
    use crate::domain::models::{
        DetailLevel, Routine, RoutineDraft, Task, TaskDraft, TaskPatch, User,
    };

    fn sample_session() -> Session {
        Session {
            user_id: 31,
            token: "token-abc".to_owned(),
        }
    }

    fn sample_routine(id: i64, name: &str, active: bool) -> Routine {
        Routine {
            routine_id: id,
            name: name.to_owned(),
            description: None,
            detail_level: Some(DetailLevel::Medium),
            is_active: Some(active),
            position: Some(0),
            created_at: None,
        }
    }

    struct FakeApi {
        listing: Mutex<VecDeque<Vec<Routine>>>,
        update_replies: Mutex<VecDeque<Result<Routine, ApiError>>>,
        update_calls: AtomicUsize,
        recorded_updates: Mutex<Vec<(i64, Option<bool>)>>,
        update_gate: Option<Arc<Semaphore>>,
    }

    impl FakeApi {
        fn with_routines(routines: Vec<Routine>) -> Self {
            FakeApi {
                listing: Mutex::new(VecDeque::from([routines])),
                update_replies: Mutex::new(VecDeque::new()),
                update_calls: AtomicUsize::new(0),
                recorded_updates: Mutex::new(Vec::new()),
                update_gate: None,
            }
        }

        fn push_update_reply(&self, reply: Result<Routine, ApiError>) {
            self.update_replies.lock().unwrap().push_back(reply);
        }

        fn recorded(&self) -> Vec<(i64, Option<bool>)> {
            self.recorded_updates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RoutineApi for FakeApi {
        async fn list_routines(&self, _: &Session) -> Result<Vec<Routine>, ApiError> {
            Ok(self.listing.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn fetch_routine(&self, _: &Session, _: i64) -> Result<Routine, ApiError> {
            panic!("unexpected fetch_routine");
        }

        async fn create_routine(&self, _: &Session, _: &RoutineDraft) -> Result<Routine, ApiError> {
            panic!("unexpected create_routine");
        }

        async fn update_routine(
            &self,
            _: &Session,
            routine_id: i64,
            patch: &RoutinePatch,
        ) -> Result<Routine, ApiError> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            self.recorded_updates
                .lock()
                .unwrap()
                .push((routine_id, patch.is_active));
            if let Some(gate) = &self.update_gate {
                let permit = gate.acquire().await.unwrap();
                permit.forget();
            }
            self.update_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(sample_routine(
                        routine_id,
                        "from server",
                        patch.is_active.unwrap_or(false),
                    ))
                })
        }

        async fn delete_routine(&self, _: &Session, _: i64) -> Result<(), ApiError> {
            panic!("unexpected delete_routine");
        }

        async fn list_tasks(&self, _: &Session, _: i64) -> Result<Vec<Task>, ApiError> {
            panic!("unexpected list_tasks");
        }

        async fn create_task(
            &self,
            _: &Session,
            _: i64,
            _: &TaskDraft,
        ) -> Result<Task, ApiError> {
            panic!("unexpected create_task");
        }

        async fn update_task(&self, _: &Session, _: i64, _: &TaskPatch) -> Result<Task, ApiError> {
            panic!("unexpected update_task");
        }

        async fn delete_task(&self, _: &Session, _: i64) -> Result<(), ApiError> {
            panic!("unexpected delete_task");
        }

        async fn reorder_tasks(&self, _: &Session, _: i64, _: &[i64]) -> Result<(), ApiError> {
            panic!("unexpected reorder_tasks");
        }

        async fn fetch_user(&self, _: &Session, _: i64) -> Result<User, ApiError> {
            panic!("unexpected fetch_user");
        }
    }

    async fn manager_with(
        routines: Vec<Routine>,
    ) -> (Arc<FakeApi>, Arc<RoutineStore<FakeApi>>, ActiveSelectionManager<FakeApi>) {
        let api = Arc::new(FakeApi::with_routines(routines));
        let store = Arc::new(EntityStore::new(RoutineCollection::new(
            api.clone(),
            sample_session(),
        )));
        store.refresh().await.unwrap();
        let manager = ActiveSelectionManager::new(api.clone(), sample_session(), store.clone());
        (api, store, manager)
    }

    fn active_ids(store: &RoutineStore<FakeApi>) -> Vec<i64> {
        store
            .entries()
            .unwrap()
            .iter()
            .filter(|entry| entry.value.active())
            .map(|entry| entry.value.routine_id)
            .collect()
    }

    #[tokio::test]
    async fn switching_deactivates_the_previous_holder_first() {
        let (api, store, manager) = manager_with(vec![
            sample_routine(1, "Morning", true),
            sample_routine(2, "Evening", false),
        ])
        .await;

        manager.set_active(EntryKey::Confirmed(2)).await.unwrap();

        assert_eq!(api.recorded(), vec![(1, Some(false)), (2, Some(true))]);
        assert_eq!(active_ids(&store), vec![2]);
    }

    #[tokio::test]
    async fn activating_with_no_previous_holder_issues_one_call() {
        let (api, store, manager) = manager_with(vec![
            sample_routine(1, "Morning", false),
            sample_routine(2, "Evening", false),
        ])
        .await;

        manager.set_active(EntryKey::Confirmed(1)).await.unwrap();

        assert_eq!(api.recorded(), vec![(1, Some(true))]);
        assert_eq!(active_ids(&store), vec![1]);
    }

    #[tokio::test]
    async fn reselecting_the_active_routine_skips_the_deactivate_call() {
        let (api, store, manager) = manager_with(vec![
            sample_routine(1, "Morning", true),
            sample_routine(2, "Evening", false),
        ])
        .await;

        manager.set_active(EntryKey::Confirmed(1)).await.unwrap();

        assert_eq!(api.recorded(), vec![(1, Some(true))]);
        assert_eq!(active_ids(&store), vec![1]);
    }

    #[tokio::test]
    async fn deactivate_failure_restores_the_full_snapshot() {
        let (api, store, manager) = manager_with(vec![
            sample_routine(1, "Morning", true),
            sample_routine(2, "Evening", false),
        ])
        .await;
        api.push_update_reply(Err(ApiError::Rejected {
            status: 500,
            message: "boom".to_owned(),
        }));
        let before = store.entries().unwrap();

        let error = manager.set_active(EntryKey::Confirmed(2)).await.unwrap_err();
        assert!(matches!(error, ApiError::Rejected { .. }));
        assert_eq!(store.entries().unwrap(), before);
        // The second call was never issued.
        assert_eq!(api.update_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn activate_failure_restores_the_full_snapshot() {
        let (api, store, manager) = manager_with(vec![
            sample_routine(1, "Morning", true),
            sample_routine(2, "Evening", false),
        ])
        .await;
        api.push_update_reply(Ok(sample_routine(1, "Morning", false)));
        api.push_update_reply(Err(ApiError::Network("connection reset".to_owned())));
        let before = store.entries().unwrap();

        let error = manager.set_active(EntryKey::Confirmed(2)).await.unwrap_err();
        assert!(matches!(error, ApiError::Network(_)));
        assert_eq!(store.entries().unwrap(), before);
        assert_eq!(api.update_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn pending_target_is_refused_without_network() {
        let (api, store, manager) = manager_with(vec![sample_routine(1, "Morning", true)]).await;
        let staged = store.begin_create(&RoutineDraft::named("Workout")).unwrap();

        let error = manager.set_active(staged.key).await.unwrap_err();
        assert!(matches!(error, ApiError::InvalidState(_)));
        assert_eq!(api.update_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_target_reports_not_found() {
        let (_, _, manager) = manager_with(vec![sample_routine(1, "Morning", true)]).await;

        let error = manager.set_active(EntryKey::Confirmed(99)).await.unwrap_err();
        assert!(matches!(error, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn at_most_one_routine_is_active_while_the_switch_is_in_flight() {
        let gate = Arc::new(Semaphore::new(0));
        let api = Arc::new(FakeApi {
            update_gate: Some(gate.clone()),
            ..FakeApi::with_routines(vec![
                sample_routine(1, "Morning", true),
                sample_routine(2, "Evening", false),
            ])
        });
        let store = Arc::new(EntityStore::new(RoutineCollection::new(
            api.clone(),
            sample_session(),
        )));
        store.refresh().await.unwrap();
        let manager = Arc::new(ActiveSelectionManager::new(
            api.clone(),
            sample_session(),
            store.clone(),
        ));

        let switch = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.set_active(EntryKey::Confirmed(2)).await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // Mid-flight: the optimistic flip has already applied, atomically.
        assert_eq!(active_ids(&store), vec![2]);

        gate.add_permits(2);
        switch.await.unwrap().unwrap();
        assert_eq!(active_ids(&store), vec![2]);
    }

    #[tokio::test]
    async fn scope_retired_mid_flight_suppresses_the_rollback() {
        let gate = Arc::new(Semaphore::new(0));
        let api = Arc::new(FakeApi {
            update_gate: Some(gate.clone()),
            ..FakeApi::with_routines(vec![
                sample_routine(1, "Morning", true),
                sample_routine(2, "Evening", false),
            ])
        });
        api.push_update_reply(Ok(sample_routine(1, "Morning", false)));
        api.push_update_reply(Err(ApiError::Network("connection reset".to_owned())));
        let store = Arc::new(EntityStore::new(RoutineCollection::new(
            api.clone(),
            sample_session(),
        )));
        store.refresh().await.unwrap();
        let manager = Arc::new(ActiveSelectionManager::new(
            api.clone(),
            sample_session(),
            store.clone(),
        ));

        let switch = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.set_active(EntryKey::Confirmed(2)).await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // The view goes away while both calls are still pending.
        let frozen = store.entries().unwrap();
        store.scope().retire();
        gate.add_permits(2);

        let error = switch.await.unwrap().unwrap_err();
        assert!(matches!(error, ApiError::Network(_)));
        // The failure is reported, but no rollback lands in the dead store.
        assert_eq!(store.entries().unwrap(), frozen);
    }
}
