//! Rootine client core: optimistic working copies of a user's routines and
//! tasks, day-timeline layout, and the HTTP client for the Rootine API.
//!
//! The shell embedding this crate builds one [`RootineClient`] per signed-in
//! session and drives everything else through it.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::active_selection::ActiveSelectionManager;
pub use application::client::{RootineClient, WorkspacePaths, bootstrap_workspace};
pub use application::collections::{RoutineCollection, RoutineStore, TaskCollection, TaskStore};
pub use application::entity_store::{EntityStore, RemoteCollection, StagedCreate};
pub use application::reorder::{MoveDirection, ReorderManager};
pub use application::scope::ScopeToken;
pub use application::ticker::{NowProvider, TICK_INTERVAL, TimelineTicker, local_now};
pub use domain::models::{
    DetailLevel, Entry, EntryKey, Priority, Routine, RoutineDraft, RoutinePatch, Session, Task,
    TaskDraft, TaskPatch, User,
};
pub use domain::timeline::{
    HourMark, TimelineBlock, TimelineBounds, TimelineEngine, TimelineLayout, TimelinePolicy,
};
pub use infrastructure::api_client::{DEFAULT_API_BASE_URL, ReqwestRoutineApi, RoutineApi};
pub use infrastructure::error::ApiError;
