use std::sync::Arc;

use chrono::Utc;

use crate::storage::{BoardStorage, StorageError};
use crate::types::{
    is_default_column, Project, ProjectSummary, ProjectUpdate, ProjectWithTasks, Task,
};

/// Project metadata and column layout on top of a `BoardStorage`.
#[derive(Clone)]
pub struct ProjectService {
    storage: Arc<dyn BoardStorage>,
}

impl ProjectService {
    pub fn new(storage: Arc<dyn BoardStorage>) -> Self {
        Self { storage }
    }

    /// All projects, newest first.
    pub fn list_projects(&self, with_task_counts: bool) -> Vec<ProjectSummary> {
        let mut projects = self.storage.list_projects();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        projects
            .into_iter()
            .map(|project| {
                let task_count = with_task_counts
                    .then(|| self.storage.find_tasks_by_project(&project.id).len());
                ProjectSummary {
                    project,
                    task_count,
                }
            })
            .collect()
    }

    pub fn get_project(&self, project_id: &str) -> Result<Project, StorageError> {
        self.storage
            .get_project(project_id)
            .ok_or_else(|| StorageError::ProjectNotFound(project_id.to_string()))
    }

    /// Project with its tasks sorted by rank, then creation time.
    pub fn get_project_with_tasks(&self, project_id: &str) -> Result<ProjectWithTasks, StorageError> {
        let project = self.get_project(project_id)?;
        let mut tasks = self.storage.find_tasks_by_project(project_id);
        sort_tasks(&mut tasks);
        Ok(ProjectWithTasks { project, tasks })
    }

    pub fn column_order(&self, project_id: &str) -> Result<Vec<String>, StorageError> {
        Ok(self.get_project(project_id)?.column_order)
    }

    pub fn create_project(&self, name: &str, description: &str) -> Result<Project, StorageError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::validation("Project name is required"));
        }
        let project = Project::new(name, description.trim());
        self.storage.save_project(&project)?;
        log::info!(target: "flowboard.projects", "Created project {} ({})", project.id, project.name);
        Ok(project)
    }

    /// Update name and description. `old_name` + `new_name` together rename a
    /// column in the same call.
    pub fn update_project(&self, project_id: &str, update: &ProjectUpdate) -> Result<Project, StorageError> {
        let mut project = self.get_project(project_id)?;

        if let (Some(old_name), Some(new_name)) = (&update.old_name, &update.new_name) {
            project = self.rename_column(project_id, old_name, new_name)?;
        }

        let name = update.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
        if name.is_none() && update.description.is_none() {
            return Ok(project);
        }
        if let Some(name) = name {
            project.name = name.to_string();
        }
        if let Some(description) = &update.description {
            project.description = description.trim().to_string();
        }
        project.updated_at = Utc::now();
        self.storage.save_project(&project)?;
        Ok(project)
    }

    pub fn delete_project(&self, project_id: &str) -> Result<usize, StorageError> {
        let removed = self.storage.delete_project(project_id)?;
        log::info!(
            target: "flowboard.projects",
            "Deleted project {} with {} tasks",
            project_id,
            removed
        );
        Ok(removed)
    }

    /// Append a column to the right end of the board.
    pub fn add_column(&self, project_id: &str, name: &str) -> Result<Project, StorageError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::validation("Column name is required"));
        }
        let mut project = self.get_project(project_id)?;
        if project.has_column(name) {
            return Err(StorageError::validation(format!(
                "Column '{}' already exists",
                name
            )));
        }
        project.column_order.push(name.to_string());
        project.updated_at = Utc::now();
        self.storage.save_project(&project)?;
        Ok(project)
    }

    /// Rename a column in place. Tasks in the column follow the new name.
    pub fn rename_column(&self, project_id: &str, old_name: &str, new_name: &str) -> Result<Project, StorageError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(StorageError::validation("New column name cannot be empty"));
        }
        let previous = self.get_project(project_id)?;
        if previous.has_column(new_name) {
            return Err(StorageError::validation(format!(
                "Column '{}' already exists",
                new_name
            )));
        }
        let index = previous
            .column_order
            .iter()
            .position(|c| c == old_name)
            .ok_or_else(|| StorageError::ColumnNotFound(old_name.to_string()))?;

        let mut project = previous.clone();
        project.column_order[index] = new_name.to_string();
        project.updated_at = Utc::now();
        self.storage.save_project(&project)?;

        if let Err(e) = self.storage.rename_status(project_id, old_name, new_name) {
            if let Err(restore) = self.storage.save_project(&previous) {
                log::error!(
                    target: "flowboard.projects",
                    "Could not restore columns of {} after failed rename: {}",
                    project_id,
                    restore
                );
            }
            return Err(e);
        }
        Ok(project)
    }

    /// Remove a non-default column and every task in it.
    pub fn delete_column(&self, project_id: &str, name: &str) -> Result<Project, StorageError> {
        if is_default_column(name) {
            return Err(StorageError::validation("Cannot delete a default column"));
        }
        let mut project = self.get_project(project_id)?;
        if !project.has_column(name) {
            return Err(StorageError::ColumnNotFound(name.to_string()));
        }

        project.column_order.retain(|c| c != name);
        project.updated_at = Utc::now();
        let removed = self.storage.remove_column(&project, name)?;

        log::info!(
            target: "flowboard.projects",
            "Deleted column '{}' of {} with {} tasks",
            name,
            project_id,
            removed
        );
        Ok(project)
    }
}

pub(crate) fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}
