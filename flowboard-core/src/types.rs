use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Columns every new project starts with. These cannot be deleted.
pub const DEFAULT_COLUMNS: [&str; 3] = ["To Do", "In Progress", "Done"];

/// Column a new task lands in when the caller does not name one.
pub const DEFAULT_STATUS: &str = "To Do";

/// Column counted as finished work in progress figures.
pub const DONE_STATUS: &str = "Done";

pub fn is_default_column(name: &str) -> bool {
    DEFAULT_COLUMNS.contains(&name)
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Board layout, left to right. Names are unique.
    pub column_order: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: &str, description: &str) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.to_string(),
            description: description.to_string(),
            column_order: DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_order.iter().any(|c| c == name)
    }

    /// Status used for a new task with no explicit column.
    pub fn default_status(&self) -> Option<&str> {
        if self.has_column(DEFAULT_STATUS) {
            Some(DEFAULT_STATUS)
        } else {
            self.column_order.first().map(String::as_str)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Name of the column the task sits in.
    pub status: String,
    /// Zero-based rank inside the column.
    #[serde(default)]
    pub order: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn position(&self) -> TaskPatch {
        TaskPatch {
            id: self.id.clone(),
            order: self.order,
            status: self.status.clone(),
        }
    }
}

/// Position/status change for one task, the unit of bulk reordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(alias = "_id")]
    pub id: String,
    pub order: usize,
    pub status: String,
}

/// Body of a task creation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Partial edit of a single task. Rank is not part of it: ranks only change
/// through moves and bulk reorders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.status.is_none()
    }
}

/// Text fields written by `BoardStorage::update_task`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFields {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Column rename carried on the project update call.
    #[serde(default)]
    pub old_name: Option<String>,
    #[serde(default)]
    pub new_name: Option<String>,
}

/// Project plus its task count, for list responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_count: Option<usize>,
}

/// Project together with all of its tasks, sorted by rank then creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectWithTasks {
    #[serde(flatten)]
    pub project: Project,
    pub tasks: Vec<Task>,
}
