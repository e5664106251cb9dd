use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Credential handed in by the surrounding shell. The core never looks up
/// user identity anywhere else; every constructor that talks to the remote
/// store takes one of these explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: i64,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    pub routine_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub detail_level: Option<DetailLevel>,
    pub is_active: Option<bool>,
    pub position: Option<i32>,
    pub created_at: Option<NaiveDateTime>,
}

impl Routine {
    pub fn active(&self) -> bool {
        self.is_active.unwrap_or(false)
    }

    pub fn apply_patch(&mut self, patch: &RoutinePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(detail_level) = patch.detail_level {
            self.detail_level = Some(detail_level);
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = Some(is_active);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: i64,
    pub routine_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub start_time: Option<String>,
    pub duration: Option<i32>,
    pub priority: Option<Priority>,
    pub is_completed: Option<bool>,
    pub position: Option<i32>,
    pub created_at: Option<NaiveDateTime>,
}

impl Task {
    pub fn completed(&self) -> bool {
        self.is_completed.unwrap_or(false)
    }

    // Mirrors the server's update handler: only present fields are copied
    // onto the stored entity.
    pub fn apply_patch(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(task_type) = &patch.task_type {
            self.task_type = Some(task_type.clone());
        }
        if let Some(start_time) = &patch.start_time {
            self.start_time = Some(start_time.clone());
        }
        if let Some(duration) = patch.duration {
            self.duration = Some(duration);
        }
        if let Some(priority) = patch.priority {
            self.priority = Some(priority);
        }
        if let Some(is_completed) = patch.is_completed {
            self.is_completed = Some(is_completed);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoutineDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_level: Option<DetailLevel>,
}

impl RoutineDraft {
    pub fn named(name: impl Into<String>) -> Self {
        RoutineDraft {
            name: name.into(),
            description: None,
            detail_level: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.name, "routine.name")?;
        validate_max_length(&self.name, 100, "routine.name")?;
        Ok(())
    }

    /// Local stand-in shown while the remote create is in flight. The inner
    /// identifier is meaningless for a pending entry; the entry key is
    /// authoritative.
    pub fn placeholder(&self) -> Routine {
        Routine {
            routine_id: 0,
            name: self.name.clone(),
            description: self.description.clone(),
            detail_level: self.detail_level,
            is_active: Some(false),
            position: None,
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoutinePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_level: Option<DetailLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl RoutinePatch {
    pub fn activation(is_active: bool) -> Self {
        RoutinePatch {
            is_active: Some(is_active),
            ..RoutinePatch::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            validate_non_empty(name, "routine.name")?;
            validate_max_length(name, 100, "routine.name")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl TaskDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        TaskDraft {
            title: title.into(),
            description: None,
            task_type: None,
            start_time: None,
            duration: None,
            priority: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "task.title")?;
        validate_max_length(&self.title, 150, "task.title")?;
        if let Some(duration) = self.duration {
            if duration < 0 {
                return Err("task.duration must be >= 0".to_string());
            }
        }
        Ok(())
    }

    pub fn placeholder(&self, routine_id: i64) -> Task {
        Task {
            task_id: 0,
            routine_id: Some(routine_id),
            title: self.title.clone(),
            description: self.description.clone(),
            task_type: self.task_type.clone(),
            start_time: self.start_time.clone(),
            duration: self.duration,
            priority: self.priority,
            is_completed: Some(false),
            position: None,
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

impl TaskPatch {
    pub fn completion(is_completed: bool) -> Self {
        TaskPatch {
            is_completed: Some(is_completed),
            ..TaskPatch::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(title) = &self.title {
            validate_non_empty(title, "task.title")?;
            validate_max_length(title, 150, "task.title")?;
        }
        if let Some(duration) = self.duration {
            if duration < 0 {
                return Err("task.duration must be >= 0".to_string());
            }
        }
        Ok(())
    }
}

static NEXT_PENDING_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an entry in a local collection. Confirmed keys carry the
/// server identifier; pending keys are process-local and never leave the
/// client (update/delete/reorder are gated until confirmation assigns a
/// confirmed key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Confirmed(i64),
    Pending(u64),
}

impl EntryKey {
    pub fn fresh_pending() -> EntryKey {
        EntryKey::Pending(NEXT_PENDING_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn confirmed_id(&self) -> Option<i64> {
        match self {
            EntryKey::Confirmed(id) => Some(*id),
            EntryKey::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, EntryKey::Pending(_))
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Confirmed(id) => write!(f, "{id}"),
            EntryKey::Pending(serial) => write!(f, "optimistic-{serial}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T> {
    pub key: EntryKey,
    pub value: T,
}

impl<T> Entry<T> {
    pub fn confirmed(id: i64, value: T) -> Entry<T> {
        Entry {
            key: EntryKey::Confirmed(id),
            value,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.key.is_pending()
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_max_length(value: &str, max: usize, field_name: &str) -> Result<(), String> {
    if value.chars().count() > max {
        return Err(format!("{field_name} must be at most {max} characters"));
    }
    Ok(())
}
