//! HTTP client for the FlowBoard backend REST API.
use async_trait::async_trait;
use flowboard_core::drag::Reconciler;
use flowboard_core::types::{
    NewTask, Project, ProjectSummary, ProjectUpdate, ProjectWithTasks, Task, TaskPatch, TaskUpdate,
};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("{message} ({status})")]
    Http { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct SummaryBody {
    #[serde(default)]
    summary: String,
}

#[derive(Deserialize)]
struct AnswerBody {
    #[serde(default)]
    answer: String,
}

/// Encode one path segment; column names may contain spaces or slashes.
fn segment(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:5000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }

        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|b| b.error.or(b.message))
            .unwrap_or_else(|| {
                if text.trim().is_empty() {
                    status.to_string()
                } else {
                    text
                }
            });
        log::debug!(target: "flowboard.client", "HTTP {}: {}", status, message);
        Err(ApiError::Http {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn list_projects(&self, with_task_counts: bool) -> Result<Vec<ProjectSummary>, ApiError> {
        let req = self
            .http
            .get(self.url("/projects"))
            .query(&[("populateTaskCount", with_task_counts)]);
        self.send(req).await
    }

    pub async fn create_project(&self, name: &str, description: &str) -> Result<Project, ApiError> {
        let req = self
            .http
            .post(self.url("/projects"))
            .json(&serde_json::json!({ "name": name, "description": description }));
        self.send(req).await
    }

    pub async fn get_project_with_tasks(&self, project_id: &str) -> Result<ProjectWithTasks, ApiError> {
        let req = self
            .http
            .get(self.url(&format!("/projects/{}", segment(project_id))))
            .query(&[("populateTasks", true)]);
        self.send(req).await
    }

    pub async fn update_project(&self, project_id: &str, update: &ProjectUpdate) -> Result<Project, ApiError> {
        let req = self
            .http
            .put(self.url(&format!("/projects/{}", segment(project_id))))
            .json(update);
        self.send(req).await
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<(), ApiError> {
        let req = self
            .http
            .delete(self.url(&format!("/projects/{}", segment(project_id))));
        self.send::<serde_json::Value>(req).await.map(|_| ())
    }

    pub async fn add_column(&self, project_id: &str, name: &str) -> Result<Project, ApiError> {
        let req = self
            .http
            .post(self.url(&format!("/projects/{}/columns", segment(project_id))))
            .json(&serde_json::json!({ "name": name }));
        self.send(req).await
    }

    pub async fn rename_column(&self, project_id: &str, old_name: &str, new_name: &str) -> Result<Project, ApiError> {
        let req = self
            .http
            .put(self.url(&format!(
                "/projects/{}/columns/{}",
                segment(project_id),
                segment(old_name)
            )))
            .json(&serde_json::json!({ "newName": new_name }));
        self.send(req).await
    }

    pub async fn delete_column(&self, project_id: &str, name: &str) -> Result<Project, ApiError> {
        let req = self.http.delete(self.url(&format!(
            "/projects/{}/columns/{}",
            segment(project_id),
            segment(name)
        )));
        self.send(req).await
    }

    pub async fn create_task(&self, project_id: &str, task: &NewTask) -> Result<Task, ApiError> {
        let req = self
            .http
            .post(self.url(&format!("/projects/{}/tasks", segment(project_id))))
            .json(task);
        self.send(req).await
    }

    pub async fn update_task(&self, task_id: &str, update: &TaskUpdate) -> Result<Task, ApiError> {
        let req = self
            .http
            .put(self.url(&format!("/tasks/{}", segment(task_id))))
            .json(update);
        self.send(req).await
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<(), ApiError> {
        let req = self.http.delete(self.url(&format!("/tasks/{}", segment(task_id))));
        self.send::<serde_json::Value>(req).await.map(|_| ())
    }

    pub async fn update_order(&self, patches: &[TaskPatch]) -> Result<(), ApiError> {
        let req = self
            .http
            .put(self.url("/tasks/update-order"))
            .json(&serde_json::json!({ "tasks": patches }));
        self.send::<serde_json::Value>(req).await.map(|_| ())
    }

    pub async fn summarize(&self, project_id: &str, column: Option<&str>) -> Result<String, ApiError> {
        let mut body = serde_json::json!({ "projectId": project_id });
        if let Some(column) = column {
            body["columnName"] = column.into();
        }
        let req = self.http.post(self.url("/ai/summarize")).json(&body);
        self.send::<SummaryBody>(req).await.map(|b| b.summary)
    }

    pub async fn ask(&self, project_id: &str, question: &str) -> Result<String, ApiError> {
        let req = self
            .http
            .post(self.url("/ai/ask"))
            .json(&serde_json::json!({ "projectId": project_id, "question": question }));
        self.send::<AnswerBody>(req).await.map(|b| b.answer)
    }
}

#[async_trait]
impl Reconciler for ApiClient {
    type Error = ApiError;

    async fn update_single(&self, task_id: &str, update: &TaskUpdate) -> Result<Task, ApiError> {
        self.update_task(task_id, update).await
    }

    async fn bulk_reorder(&self, patches: &[TaskPatch]) -> Result<(), ApiError> {
        self.update_order(patches).await
    }
}
