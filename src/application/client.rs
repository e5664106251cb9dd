use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::application::active_selection::ActiveSelectionManager;
use crate::application::collections::{
    RoutineCollection, RoutineStore, TaskCollection, TaskStore,
};
use crate::application::entity_store::EntityStore;
use crate::application::reorder::ReorderManager;
use crate::application::scope::ScopeToken;
use crate::application::ticker::{NowProvider, TimelineTicker, local_now};
use crate::domain::models::{Routine, Session, User};
use crate::domain::time_of_day::minutes_of_day;
use crate::domain::timeline::{TimelineEngine, TimelineLayout, TimelinePolicy};
use crate::infrastructure::api_client::{ReqwestRoutineApi, RoutineApi};
use crate::infrastructure::config::{
    ensure_default_configs, load_client_config, read_api_base_url, read_timeline_policy,
};
use crate::infrastructure::error::ApiError;

#[derive(Debug)]
pub struct WorkspacePaths {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
}

/// Creates the on-disk workspace layout and seeds the default config.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<WorkspacePaths, ApiError> {
    let config_dir = workspace_root.join("config");
    let logs_dir = workspace_root.join("logs");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    let _ = load_client_config(&config_dir)?;

    Ok(WorkspacePaths {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        logs_dir,
    })
}

/// One signed-in client: the shared routine store, the factories for per-view
/// collaborators, and the command log.
///
/// Everything hangs off a single [`ScopeToken`]; [`retire`](Self::retire)
/// freezes all stores created here when the surrounding shell tears down.
pub struct RootineClient<A: RoutineApi> {
    api: Arc<A>,
    session: Session,
    scope: ScopeToken,
    routines: Arc<RoutineStore<A>>,
    timeline: TimelineEngine,
    now_provider: NowProvider,
    config_dir: PathBuf,
    logs_dir: PathBuf,
    log_guard: Mutex<()>,
}

impl RootineClient<ReqwestRoutineApi> {
    /// Bootstraps the workspace and wires the HTTP client from its config.
    pub fn connect(workspace_root: &Path, session: Session) -> Result<Self, ApiError> {
        let workspace = bootstrap_workspace(workspace_root)?;
        let base_url = read_api_base_url(&workspace.config_dir)?;
        let policy = read_timeline_policy(&workspace.config_dir)?;
        let api = Arc::new(ReqwestRoutineApi::new(base_url));
        Ok(Self::assemble(api, session, policy, workspace))
    }
}

impl<A: RoutineApi> RootineClient<A> {
    /// Wires the client around an existing API implementation. Used by the
    /// shell for tests and by anything embedding the core without HTTP.
    pub fn with_api(
        api: Arc<A>,
        session: Session,
        policy: TimelinePolicy,
        workspace: WorkspacePaths,
    ) -> Self {
        Self::assemble(api, session, policy, workspace)
    }

    fn assemble(
        api: Arc<A>,
        session: Session,
        policy: TimelinePolicy,
        workspace: WorkspacePaths,
    ) -> Self {
        let scope = ScopeToken::new();
        let routines = Arc::new(EntityStore::with_scope(
            RoutineCollection::new(api.clone(), session.clone()),
            scope.clone(),
        ));
        RootineClient {
            api,
            session,
            scope,
            routines,
            timeline: TimelineEngine::new(policy),
            now_provider: local_now(),
            config_dir: workspace.config_dir,
            logs_dir: workspace.logs_dir,
            log_guard: Mutex::new(()),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn scope(&self) -> &ScopeToken {
        &self.scope
    }

    /// Freezes every store and manager created by this client.
    pub fn retire(&self) {
        self.scope.retire();
    }

    pub fn routines(&self) -> Arc<RoutineStore<A>> {
        self.routines.clone()
    }

    /// Fresh working copy for one routine's tasks, sharing this client's
    /// scope. Call [`EntityStore::refresh`] to fill it.
    pub fn tasks_for(&self, routine_id: i64) -> Arc<TaskStore<A>> {
        Arc::new(EntityStore::with_scope(
            TaskCollection::new(self.api.clone(), self.session.clone(), routine_id),
            self.scope.clone(),
        ))
    }

    pub fn reorder_for(
        &self,
        routine_id: i64,
        tasks: Arc<TaskStore<A>>,
    ) -> ReorderManager<A> {
        ReorderManager::new(self.api.clone(), self.session.clone(), routine_id, tasks)
    }

    pub fn selection(&self) -> ActiveSelectionManager<A> {
        ActiveSelectionManager::new(self.api.clone(), self.session.clone(), self.routines.clone())
    }

    pub fn ticker(&self) -> TimelineTicker {
        TimelineTicker::spawn(self.now_provider.clone())
    }

    pub fn timeline(&self) -> &TimelineEngine {
        &self.timeline
    }

    /// Lays out a task store's current entries against the current minute.
    pub fn timeline_for(&self, tasks: &TaskStore<A>) -> Result<TimelineLayout, ApiError> {
        let entries = tasks.entries()?;
        let now = minutes_of_day((self.now_provider)());
        Ok(self.timeline.lay_out(&entries, now))
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.api.fetch_user(&self.session, self.session.user_id).await
    }

    pub async fn fetch_routine(&self, routine_id: i64) -> Result<Routine, ApiError> {
        self.api.fetch_routine(&self.session, routine_id).await
    }

    /// Logs the failure under `command` and hands back the display string
    /// the shell shows the user.
    pub fn command_error(&self, command: &str, error: &ApiError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("client.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}
