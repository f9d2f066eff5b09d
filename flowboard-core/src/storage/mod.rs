pub mod local;

use crate::types::{Project, Task, TaskFields, TaskPatch};

/// Document store holding projects and their tasks.
/// Implementations: LocalStorage (in memory, optional JSON snapshot file).
pub trait BoardStorage: Send + Sync {
    /// All projects, in no particular order.
    fn list_projects(&self) -> Vec<Project>;

    fn get_project(&self, project_id: &str) -> Option<Project>;

    /// Insert or replace a project document.
    fn save_project(&self, project: &Project) -> Result<(), StorageError>;

    /// Delete a project together with every task it owns.
    /// Returns the number of tasks removed.
    fn delete_project(&self, project_id: &str) -> Result<usize, StorageError>;

    fn find_tasks_by_project(&self, project_id: &str) -> Vec<Task>;

    fn get_task(&self, task_id: &str) -> Option<Task>;

    fn insert_task(&self, task: &Task) -> Result<(), StorageError>;

    /// Write title/description of one task, plus any position patches that
    /// go with it, in a single write.
    fn update_task(
        &self,
        task_id: &str,
        fields: &TaskFields,
        positions: &[TaskPatch],
    ) -> Result<Task, StorageError>;

    fn delete_task(&self, task_id: &str) -> Result<Task, StorageError>;

    /// Apply all position patches in one write. Patches naming unknown tasks
    /// are skipped; returns how many tasks were written.
    fn bulk_write_task_positions(&self, patches: &[TaskPatch]) -> Result<usize, StorageError>;

    /// Save `project` (already without column `status`) and remove every
    /// task of it sitting in that column, in a single write.
    fn remove_column(&self, project: &Project, status: &str) -> Result<usize, StorageError>;

    /// Move every task of `project_id` from column `from` to column `to`.
    fn rename_status(&self, project_id: &str, from: &str, to: &str)
        -> Result<usize, StorageError>;

    /// Counter bumped on every successful write (used for ETags). It never
    /// goes back, not even across a restart of the store.
    fn version(&self) -> u64;
}

/// Coarse error classes the HTTP layer and the board client react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Persistence,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{0}")]
    Validation(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Write failed: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt data file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl StorageError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::ProjectNotFound(_) | Self::TaskNotFound(_) | Self::ColumnNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::Persistence(_) | Self::Io(_) | Self::Corrupt(_) => ErrorKind::Persistence,
        }
    }
}
