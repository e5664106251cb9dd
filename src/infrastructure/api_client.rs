use crate::domain::models::{Routine, RoutineDraft, RoutinePatch, Session, Task, TaskDraft, TaskPatch, User};
use crate::infrastructure::error::ApiError;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/";

/// Remote record-store seam. Everything that talks to the Rootine API goes
/// through this trait so the optimistic engines can be exercised against
/// scripted fakes.
#[async_trait]
pub trait RoutineApi: Send + Sync {
    async fn list_routines(&self, session: &Session) -> Result<Vec<Routine>, ApiError>;

    async fn fetch_routine(&self, session: &Session, routine_id: i64) -> Result<Routine, ApiError>;

    async fn create_routine(
        &self,
        session: &Session,
        draft: &RoutineDraft,
    ) -> Result<Routine, ApiError>;

    async fn update_routine(
        &self,
        session: &Session,
        routine_id: i64,
        patch: &RoutinePatch,
    ) -> Result<Routine, ApiError>;

    async fn delete_routine(&self, session: &Session, routine_id: i64) -> Result<(), ApiError>;

    async fn list_tasks(&self, session: &Session, routine_id: i64) -> Result<Vec<Task>, ApiError>;

    async fn create_task(
        &self,
        session: &Session,
        routine_id: i64,
        draft: &TaskDraft,
    ) -> Result<Task, ApiError>;

    async fn update_task(
        &self,
        session: &Session,
        task_id: i64,
        patch: &TaskPatch,
    ) -> Result<Task, ApiError>;

    async fn delete_task(&self, session: &Session, task_id: i64) -> Result<(), ApiError>;

    async fn reorder_tasks(
        &self,
        session: &Session,
        routine_id: i64,
        ordered_task_ids: &[i64],
    ) -> Result<(), ApiError>;

    async fn fetch_user(&self, session: &Session, user_id: i64) -> Result<User, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestRoutineApi {
    client: Client,
    base_url: Url,
}

#[derive(Debug, serde::Serialize)]
struct ReorderTasksRequest<'a> {
    #[serde(rename = "orderedTaskIds")]
    ordered_task_ids: &'a [i64],
}

impl ReqwestRoutineApi {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn ensure_session(session: &Session) -> Result<(), ApiError> {
        if session.token.trim().is_empty() {
            return Err(ApiError::Validation("session token must not be empty".to_string()));
        }
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|_| ApiError::Validation("api base URL cannot be a base".to_string()))?;
            parts.pop_if_empty();
            for segment in segments {
                parts.push(segment);
            }
        }
        Ok(url)
    }

    fn api_http_error(status: reqwest::StatusCode, body: &str) -> ApiError {
        ApiError::Rejected {
            status: status.as_u16(),
            message: extract_error_message(status, body),
        }
    }
}

/// Pulls the `message` field out of the server's JSON error envelope; falls
/// back to the raw body, then to a bare status line.
fn extract_error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|field| field.as_str()) {
            let message = message.trim();
            if !message.is_empty() {
                return message.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("http {}", status.as_u16())
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl RoutineApi for ReqwestRoutineApi {
    async fn list_routines(&self, session: &Session) -> Result<Vec<Routine>, ApiError> {
        Self::ensure_session(session)?;

        let endpoint = self.endpoint(&["routine", "user", &session.user_id.to_string()])?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|error| ApiError::Network(format!("network error while listing routines: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ApiError::Network(format!("failed reading routine list response: {error}")))?;

        if !status.is_success() {
            return Err(Self::api_http_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|error| {
            ApiError::Network(format!("invalid routine list payload: {error}; body={body}"))
        })
    }

    async fn fetch_routine(&self, session: &Session, routine_id: i64) -> Result<Routine, ApiError> {
        Self::ensure_session(session)?;

        let endpoint = self.endpoint(&["routine", &routine_id.to_string()])?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|error| ApiError::Network(format!("network error while fetching routine: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ApiError::Network(format!("failed reading routine response: {error}")))?;

        if !status.is_success() {
            return Err(Self::api_http_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|error| {
            ApiError::Network(format!("invalid routine payload: {error}; body={body}"))
        })
    }

    async fn create_routine(
        &self,
        session: &Session,
        draft: &RoutineDraft,
    ) -> Result<Routine, ApiError> {
        Self::ensure_session(session)?;
        draft.validate().map_err(ApiError::Validation)?;

        let endpoint = self.endpoint(&["routine"])?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&session.token)
            .json(draft)
            .send()
            .await
            .map_err(|error| ApiError::Network(format!("network error while creating routine: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ApiError::Network(format!("failed reading routine create response: {error}")))?;

        if !status.is_success() {
            return Err(Self::api_http_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|error| {
            ApiError::Network(format!("invalid routine create payload: {error}; body={body}"))
        })
    }

    async fn update_routine(
        &self,
        session: &Session,
        routine_id: i64,
        patch: &RoutinePatch,
    ) -> Result<Routine, ApiError> {
        Self::ensure_session(session)?;
        patch.validate().map_err(ApiError::Validation)?;

        let endpoint = self.endpoint(&["routine", &routine_id.to_string()])?;
        let response = self
            .client
            .put(endpoint)
            .bearer_auth(&session.token)
            .json(patch)
            .send()
            .await
            .map_err(|error| ApiError::Network(format!("network error while updating routine: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ApiError::Network(format!("failed reading routine update response: {error}")))?;

        if !status.is_success() {
            return Err(Self::api_http_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|error| {
            ApiError::Network(format!("invalid routine update payload: {error}; body={body}"))
        })
    }

    async fn delete_routine(&self, session: &Session, routine_id: i64) -> Result<(), ApiError> {
        Self::ensure_session(session)?;

        let endpoint = self.endpoint(&["routine", &routine_id.to_string()])?;
        let response = self
            .client
            .delete(endpoint)
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|error| ApiError::Network(format!("network error while deleting routine: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ApiError::Network(format!("failed reading routine delete response: {error}")))?;

        if !status.is_success() {
            return Err(Self::api_http_error(status, &body));
        }
        Ok(())
    }

    async fn list_tasks(&self, session: &Session, routine_id: i64) -> Result<Vec<Task>, ApiError> {
        Self::ensure_session(session)?;

        let endpoint = self.endpoint(&["task", "routine", &routine_id.to_string()])?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|error| ApiError::Network(format!("network error while listing tasks: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ApiError::Network(format!("failed reading task list response: {error}")))?;

        if !status.is_success() {
            return Err(Self::api_http_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|error| {
            ApiError::Network(format!("invalid task list payload: {error}; body={body}"))
        })
    }

    async fn create_task(
        &self,
        session: &Session,
        routine_id: i64,
        draft: &TaskDraft,
    ) -> Result<Task, ApiError> {
        Self::ensure_session(session)?;
        draft.validate().map_err(ApiError::Validation)?;

        let endpoint = self.endpoint(&["task"])?;
        let response = self
            .client
            .post(endpoint)
            .query(&[("routineId", routine_id)])
            .bearer_auth(&session.token)
            .json(draft)
            .send()
            .await
            .map_err(|error| ApiError::Network(format!("network error while creating task: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ApiError::Network(format!("failed reading task create response: {error}")))?;

        if !status.is_success() {
            return Err(Self::api_http_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|error| {
            ApiError::Network(format!("invalid task create payload: {error}; body={body}"))
        })
    }

    async fn update_task(
        &self,
        session: &Session,
        task_id: i64,
        patch: &TaskPatch,
    ) -> Result<Task, ApiError> {
        Self::ensure_session(session)?;
        patch.validate().map_err(ApiError::Validation)?;

        let endpoint = self.endpoint(&["task", &task_id.to_string()])?;
        let response = self
            .client
            .put(endpoint)
            .bearer_auth(&session.token)
            .json(patch)
            .send()
            .await
            .map_err(|error| ApiError::Network(format!("network error while updating task: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ApiError::Network(format!("failed reading task update response: {error}")))?;

        if !status.is_success() {
            return Err(Self::api_http_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|error| {
            ApiError::Network(format!("invalid task update payload: {error}; body={body}"))
        })
    }

    async fn delete_task(&self, session: &Session, task_id: i64) -> Result<(), ApiError> {
        Self::ensure_session(session)?;

        let endpoint = self.endpoint(&["task", &task_id.to_string()])?;
        let response = self
            .client
            .delete(endpoint)
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|error| ApiError::Network(format!("network error while deleting task: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ApiError::Network(format!("failed reading task delete response: {error}")))?;

        if !status.is_success() {
            return Err(Self::api_http_error(status, &body));
        }
        Ok(())
    }

    async fn reorder_tasks(
        &self,
        session: &Session,
        routine_id: i64,
        ordered_task_ids: &[i64],
    ) -> Result<(), ApiError> {
        Self::ensure_session(session)?;
        if ordered_task_ids.is_empty() {
            return Err(ApiError::Validation("ordered task ids must not be empty".to_string()));
        }

        let endpoint = self.endpoint(&["task", "routine", &routine_id.to_string(), "reorder"])?;
        let request = ReorderTasksRequest { ordered_task_ids };
        let response = self
            .client
            .put(endpoint)
            .bearer_auth(&session.token)
            .json(&request)
            .send()
            .await
            .map_err(|error| ApiError::Network(format!("network error while reordering tasks: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ApiError::Network(format!("failed reading reorder response: {error}")))?;

        if !status.is_success() {
            return Err(Self::api_http_error(status, &body));
        }
        Ok(())
    }

    async fn fetch_user(&self, session: &Session, user_id: i64) -> Result<User, ApiError> {
        Self::ensure_session(session)?;

        let endpoint = self.endpoint(&["user", &user_id.to_string()])?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|error| ApiError::Network(format!("network error while fetching user: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ApiError::Network(format!("failed reading user response: {error}")))?;

        if !status.is_success() {
            return Err(Self::api_http_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|error| {
            ApiError::Network(format!("invalid user payload: {error}; body={body}"))
        })
    }
}
