//! Blocking client for the to-do backend.
//!
//! Every request carries the bearer token from local storage. A 401 clears
//! that token and surfaces as [`ApiError::Unauthorized`]. Calls are made
//! once; there are no retries.

use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};

use crate::io::local_store::LocalStore;
use crate::model::config::ApiConfig;
use crate::model::datetime;
use crate::model::project::Project;
use crate::model::task::{Priority, TaskNode};

/// Error type for backend calls
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("not signed in or session expired; run `tn login`")]
    Unauthorized,
    #[error("{path} returned {status}: {detail}")]
    Status {
        path: String,
        status: u16,
        detail: String,
    },
    #[error("unexpected response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// What to do with an item's due date in a partial update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DueDateUpdate {
    /// Field omitted from the body
    #[default]
    Keep,
    /// Sent as `null`
    Clear,
    Set(DateTime<FixedOffset>),
}

impl DueDateUpdate {
    pub fn is_keep(&self) -> bool {
        matches!(self, DueDateUpdate::Keep)
    }
}

impl From<Option<DateTime<FixedOffset>>> for DueDateUpdate {
    fn from(value: Option<DateTime<FixedOffset>>) -> Self {
        match value {
            Some(dt) => DueDateUpdate::Set(dt),
            None => DueDateUpdate::Clear,
        }
    }
}

impl Serialize for DueDateUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DueDateUpdate::Set(dt) => serializer.serialize_str(&datetime::format_iso(dt)),
            DueDateUpdate::Keep | DueDateUpdate::Clear => serializer.serialize_none(),
        }
    }
}

/// Partial item update; only fields that are set are sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "DueDateUpdate::is_keep")]
    pub due_date: DueDateUpdate,
}

impl ItemUpdate {
    pub fn completion(is_completed: bool) -> Self {
        ItemUpdate {
            is_completed: Some(is_completed),
            ..Default::default()
        }
    }

    pub fn order(order: i64) -> Self {
        ItemUpdate {
            order: Some(order),
            ..Default::default()
        }
    }

    pub fn description(description: impl Into<String>) -> Self {
        ItemUpdate {
            description: Some(description.into()),
            ..Default::default()
        }
    }

    pub fn priority(priority: Priority) -> Self {
        ItemUpdate {
            priority: Some(priority),
            ..Default::default()
        }
    }

    pub fn due_date(due_date: Option<DateTime<FixedOffset>>) -> Self {
        ItemUpdate {
            due_date: due_date.into(),
            ..Default::default()
        }
    }
}

/// Partial list update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Item created directly from locally parsed fields, without server-side parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuickItem {
    pub description: String,
    pub list_id: String,
    pub priority: Priority,
    #[serde(
        with = "crate::model::datetime::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Serialize)]
struct KeywordBody<'a> {
    keyword: &'a str,
}

#[derive(Serialize)]
struct TextBody<'a> {
    text: &'a str,
    list_id: &'a str,
}

// ---------------------------------------------------------------------------
// Persistence seam
// ---------------------------------------------------------------------------

/// Item-level calls used by the session and the toggle queue.
///
/// Implementations must be callable from several threads at once: the
/// queue issues one call per changed node concurrently.
pub trait TaskStore: Send + Sync {
    fn update_item(&self, item_id: &str, update: &ItemUpdate) -> Result<(), ApiError>;
    fn delete_item(&self, item_id: &str) -> Result<(), ApiError>;
    fn create_item_from_text(&self, text: &str, list_id: &str) -> Result<TaskNode, ApiError>;
    fn create_quick_item(&self, item: &QuickItem) -> Result<TaskNode, ApiError>;
    /// Returns the item with its newly generated children
    fn generate_subtasks(&self, item_id: &str) -> Result<TaskNode, ApiError>;
    fn update_list(&self, list_id: &str, update: &ListUpdate) -> Result<(), ApiError>;
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    store: LocalStore,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, store: LocalStore) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ApiError::Client)?;
        Ok(ApiClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            store,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    // --- lists ---

    pub fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        self.fetch(Method::GET, "/todos")
    }

    pub fn get_project(&self, list_id: &str) -> Result<Project, ApiError> {
        self.fetch(Method::GET, &format!("/todos/{}", list_id))
    }

    /// Create a list whose items the server generates from `keyword`.
    pub fn generate_project(&self, keyword: &str) -> Result<Project, ApiError> {
        self.post_json("/todos/generate", &KeywordBody { keyword })
    }

    pub fn update_project(&self, list_id: &str, update: &ListUpdate) -> Result<Project, ApiError> {
        let path = format!("/todos/{}", list_id);
        let req = self.request(Method::PUT, &path).json(update);
        self.send_json(&path, req)
    }

    pub fn delete_project(&self, list_id: &str) -> Result<(), ApiError> {
        let path = format!("/todos/{}", list_id);
        self.send(&path, self.request(Method::DELETE, &path))
            .map(drop)
    }

    // --- plumbing ---

    pub(crate) fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.request(Method::POST, path).json(body);
        self.send_json(path, req)
    }

    pub(crate) fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let req = self.request(Method::POST, path).form(form);
        self.send_json(path, req)
    }

    fn fetch<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T, ApiError> {
        let req = self.request(method, path);
        self.send_json(path, req)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        match self.store.load_token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn send(&self, path: &str, req: RequestBuilder) -> Result<Response, ApiError> {
        tracing::debug!(path, "api request");
        let resp = req.send().map_err(|source| ApiError::Transport {
            path: path.to_string(),
            source,
        })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(path, "unauthorized, clearing stored token");
            self.store.remove_token();
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }
        Ok(resp)
    }

    fn send_json<T>(&self, path: &str, req: RequestBuilder) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        self.send(path, req)?
            .json()
            .map_err(|source| ApiError::Decode {
                path: path.to_string(),
                source,
            })
    }
}

impl TaskStore for ApiClient {
    fn update_item(&self, item_id: &str, update: &ItemUpdate) -> Result<(), ApiError> {
        let path = format!("/todos/items/{}", item_id);
        self.send(&path, self.request(Method::PUT, &path).json(update))
            .map(drop)
    }

    fn delete_item(&self, item_id: &str) -> Result<(), ApiError> {
        let path = format!("/todos/items/{}", item_id);
        self.send(&path, self.request(Method::DELETE, &path))
            .map(drop)
    }

    fn create_item_from_text(&self, text: &str, list_id: &str) -> Result<TaskNode, ApiError> {
        self.post_json("/todos/parse-and-create-item", &TextBody { text, list_id })
    }

    fn create_quick_item(&self, item: &QuickItem) -> Result<TaskNode, ApiError> {
        self.post_json("/todos/items/quick", item)
    }

    fn generate_subtasks(&self, item_id: &str) -> Result<TaskNode, ApiError> {
        let path = format!("/todos/items/{}/generate-subtasks", item_id);
        self.fetch(Method::POST, &path)
    }

    fn update_list(&self, list_id: &str, update: &ListUpdate) -> Result<(), ApiError> {
        self.update_project(list_id, update).map(drop)
    }
}

/// The backend reports failures as `{"detail": "..."}`; fall back to the raw body.
fn error_detail(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    match parsed.as_ref().and_then(|v| v.get("detail")) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None if body.trim().is_empty() => "no details".to_string(),
        None => body.trim().chars().take(200).collect(),
    }
}
