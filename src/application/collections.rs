use std::sync::Arc;

use async_trait::async_trait;

use crate::application::entity_store::{EntityStore, RemoteCollection};
use crate::domain::models::{
    Routine, RoutineDraft, RoutinePatch, Session, Task, TaskDraft, TaskPatch,
};
use crate::infrastructure::api_client::RoutineApi;
use crate::infrastructure::error::ApiError;

/// The signed-in user's routines, bound to one session.
pub struct RoutineCollection<A: RoutineApi> {
    api: Arc<A>,
    session: Session,
}

impl<A: RoutineApi> RoutineCollection<A> {
    pub fn new(api: Arc<A>, session: Session) -> Self {
        RoutineCollection { api, session }
    }
}

#[async_trait]
impl<A: RoutineApi> RemoteCollection for RoutineCollection<A> {
    type Entity = Routine;
    type Draft = RoutineDraft;
    type Patch = RoutinePatch;

    fn label(&self) -> &'static str {
        "routine"
    }

    fn entity_id(&self, entity: &Routine) -> i64 {
        entity.routine_id
    }

    fn validate_draft(&self, draft: &RoutineDraft) -> Result<(), String> {
        draft.validate()
    }

    fn validate_patch(&self, patch: &RoutinePatch) -> Result<(), String> {
        patch.validate()
    }

    fn placeholder(&self, draft: &RoutineDraft) -> Routine {
        draft.placeholder()
    }

    fn apply_patch(&self, entity: &mut Routine, patch: &RoutinePatch) {
        entity.apply_patch(patch);
    }

    async fn list(&self) -> Result<Vec<Routine>, ApiError> {
        self.api.list_routines(&self.session).await
    }

    async fn create(&self, draft: &RoutineDraft) -> Result<Routine, ApiError> {
        self.api.create_routine(&self.session, draft).await
    }

    async fn update(&self, id: i64, patch: &RoutinePatch) -> Result<Routine, ApiError> {
        self.api.update_routine(&self.session, id, patch).await
    }

    async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.api.delete_routine(&self.session, id).await
    }
}

/// The tasks of one routine, bound to a session and the parent routine id.
pub struct TaskCollection<A: RoutineApi> {
    api: Arc<A>,
    session: Session,
    routine_id: i64,
}

impl<A: RoutineApi> TaskCollection<A> {
    pub fn new(api: Arc<A>, session: Session, routine_id: i64) -> Self {
        TaskCollection {
            api,
            session,
            routine_id,
        }
    }

    pub fn routine_id(&self) -> i64 {
        self.routine_id
    }
}

#[async_trait]
impl<A: RoutineApi> RemoteCollection for TaskCollection<A> {
    type Entity = Task;
    type Draft = TaskDraft;
    type Patch = TaskPatch;

    fn label(&self) -> &'static str {
        "task"
    }

    fn entity_id(&self, entity: &Task) -> i64 {
        entity.task_id
    }

    fn validate_draft(&self, draft: &TaskDraft) -> Result<(), String> {
        draft.validate()
    }

    fn validate_patch(&self, patch: &TaskPatch) -> Result<(), String> {
        patch.validate()
    }

    fn placeholder(&self, draft: &TaskDraft) -> Task {
        draft.placeholder(self.routine_id)
    }

    fn apply_patch(&self, entity: &mut Task, patch: &TaskPatch) {
        entity.apply_patch(patch);
    }

    async fn list(&self) -> Result<Vec<Task>, ApiError> {
        self.api.list_tasks(&self.session, self.routine_id).await
    }

    async fn create(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        self.api
            .create_task(&self.session, self.routine_id, draft)
            .await
    }

    async fn update(&self, id: i64, patch: &TaskPatch) -> Result<Task, ApiError> {
        self.api.update_task(&self.session, id, patch).await
    }

    async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.api.delete_task(&self.session, id).await
    }
}

/// Optimistic working copy of the user's routine list.
pub type RoutineStore<A> = EntityStore<RoutineCollection<A>>;

/// Optimistic working copy of one routine's task list.
pub type TaskStore<A> = EntityStore<TaskCollection<A>>;
