//! One open board: the projected view, drag gestures and edits, all talking
//! to the backend through `ApiClient`.
//!
//! Inputs that would certainly be rejected (blank names, duplicate or default
//! columns) raise a notice locally and send nothing. Every successful edit
//! refetches the project so the view reflects the server's ranks.

use flowboard_core::board::{orphaned_tasks, project, BoardView};
use flowboard_core::drag::{BoardObserver, DragHandler, DragSource, DropOutcome, DropTarget, Notice};
use flowboard_core::types::{
    is_default_column, NewTask, Project, ProjectUpdate, TaskUpdate, DEFAULT_COLUMNS,
};

use crate::api::{ApiClient, ApiError};

pub const NO_SUMMARY: &str = "No summary generated.";
pub const NO_ANSWER: &str = "No answer generated.";

/// Text fields of the task form.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub status: Option<String>,
}

pub struct KanbanSession<O> {
    api: ApiClient,
    project: Option<Project>,
    board: DragHandler<ApiClient, O>,
}

impl<O: BoardObserver> KanbanSession<O> {
    pub fn new(api: ApiClient, observer: O) -> Self {
        Self {
            board: DragHandler::new(BoardView::default(), api.clone(), observer),
            api,
            project: None,
        }
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn view(&self) -> &BoardView {
        self.board.view()
    }

    fn notify(&self, notice: Notice) {
        self.board.observer().notify(notice);
    }

    fn fail(&self, message: impl Into<String>) -> bool {
        self.notify(Notice::error(message));
        false
    }

    fn current_project_id(&self) -> Option<String> {
        let id = self.project.as_ref().map(|p| p.id.clone());
        if id.is_none() {
            self.notify(Notice::error("Please select a project first"));
        }
        id
    }

    /// Fetch a project with its tasks and show it.
    pub async fn load(&mut self, project_id: &str) -> Result<(), ApiError> {
        let full = match self.api.get_project_with_tasks(project_id).await {
            Ok(full) => full,
            Err(e) => {
                self.notify(Notice::error(format!("Failed to load project: {}", e)));
                self.project = None;
                return Err(e);
            }
        };

        let columns: Vec<String> = if full.project.column_order.is_empty() {
            DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect()
        } else {
            full.project.column_order.clone()
        };
        let orphans = orphaned_tasks(&full.tasks, &columns);
        if !orphans.is_empty() {
            log::warn!(
                target: "flowboard.client",
                "Hiding {} task(s) of {} whose column no longer exists",
                orphans.len(),
                project_id
            );
        }

        self.board.replace_view(project(&full.tasks, &columns));
        self.project = Some(full.project);
        Ok(())
    }

    async fn refresh(&mut self) {
        if let Some(id) = self.project.as_ref().map(|p| p.id.clone()) {
            // load() already raised a notice on failure
            let _ = self.load(&id).await;
        }
    }

    pub fn begin_drag(&mut self, column: &str, index: usize) -> bool {
        self.board.begin_drag(DragSource {
            column: column.to_string(),
            index,
        })
    }

    /// `None` drops outside every column.
    pub async fn drop_on(&mut self, target: Option<(&str, usize)>) -> DropOutcome {
        let target = target.map(|(column, index)| DropTarget {
            column: column.to_string(),
            index,
        });
        self.board.drop_on(target).await
    }

    /// Create a task (`task_id` = None) or edit an existing one.
    pub async fn save_task(&mut self, task_id: Option<&str>, draft: &TaskDraft) -> bool {
        let Some(project_id) = self.current_project_id() else {
            return false;
        };
        let title = draft.title.trim();
        if title.is_empty() {
            return self.fail("Task title is required.");
        }
        let status = draft
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(status) = status {
            if self.view().column(status).is_none() {
                return self.fail(format!("Column '{}' does not exist.", status));
            }
        }

        let result = match task_id {
            Some(id) => self
                .api
                .update_task(
                    id,
                    &TaskUpdate {
                        title: Some(title.to_string()),
                        description: Some(draft.description.trim().to_string()),
                        status: status.map(str::to_string),
                    },
                )
                .await
                .map(|_| "Task updated!"),
            None => self
                .api
                .create_task(
                    &project_id,
                    &NewTask {
                        title: title.to_string(),
                        description: Some(draft.description.trim().to_string()),
                        status: status.map(str::to_string),
                    },
                )
                .await
                .map(|_| "Task created!"),
        };

        match result {
            Ok(message) => {
                self.notify(Notice::info(message));
                self.refresh().await;
                true
            }
            Err(e) => self.fail(format!("Failed to save task: {}", e)),
        }
    }

    pub async fn delete_task(&mut self, task_id: &str) -> bool {
        match self.api.delete_task(task_id).await {
            Ok(()) => {
                self.notify(Notice::info("Task deleted!"));
                self.refresh().await;
                true
            }
            Err(e) => self.fail(format!("Failed to delete task: {}", e)),
        }
    }

    pub async fn add_column(&mut self, name: &str) -> bool {
        let Some(project_id) = self.current_project_id() else {
            return false;
        };
        let name = name.trim();
        if name.is_empty() {
            return self.fail("Column name cannot be empty.");
        }
        if self.view().column(name).is_some() {
            return self.fail("A column with this name already exists.");
        }

        match self.api.add_column(&project_id, name).await {
            Ok(_) => {
                self.notify(Notice::info("Column added!"));
                self.refresh().await;
                true
            }
            Err(e) => self.fail(format!("Failed to add column: {}", e)),
        }
    }

    pub async fn rename_column(&mut self, old_name: &str, new_name: &str) -> bool {
        let Some(project_id) = self.current_project_id() else {
            return false;
        };
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return self.fail("Column name cannot be empty.");
        }
        if new_name == old_name {
            return false;
        }
        if self.view().column(new_name).is_some() {
            return self.fail("A column with this name already exists.");
        }

        match self.api.rename_column(&project_id, old_name, new_name).await {
            Ok(_) => {
                self.notify(Notice::info("Column renamed successfully!"));
                self.refresh().await;
                true
            }
            Err(e) => self.fail(format!("Failed to rename column: {}", e)),
        }
    }

    /// Edit the open project's name and/or description.
    pub async fn update_details(&mut self, name: Option<&str>, description: Option<&str>) -> bool {
        let Some(project_id) = self.current_project_id() else {
            return false;
        };
        let name = name.map(str::trim);
        if name == Some("") {
            return self.fail("Project name is required.");
        }

        let update = ProjectUpdate {
            name: name.map(str::to_string),
            description: description.map(|d| d.trim().to_string()),
            ..ProjectUpdate::default()
        };
        match self.api.update_project(&project_id, &update).await {
            Ok(_) => {
                self.notify(Notice::info("Project updated!"));
                self.refresh().await;
                true
            }
            Err(e) => self.fail(format!("Failed to update project: {}", e)),
        }
    }

    /// Delete the open project and all of its tasks, then close it.
    pub async fn delete_project(&mut self) -> bool {
        let Some(project_id) = self.current_project_id() else {
            return false;
        };
        match self.api.delete_project(&project_id).await {
            Ok(()) => {
                self.project = None;
                self.board.replace_view(BoardView::default());
                self.notify(Notice::info("Project deleted!"));
                true
            }
            Err(e) => self.fail(format!("Failed to delete project: {}", e)),
        }
    }

    /// Delete a custom column together with its tasks.
    pub async fn delete_column(&mut self, name: &str) -> bool {
        let Some(project_id) = self.current_project_id() else {
            return false;
        };
        if is_default_column(name) {
            return self.fail("Default columns cannot be deleted.");
        }

        match self.api.delete_column(&project_id, name).await {
            Ok(_) => {
                self.notify(Notice::info("Column deleted successfully!"));
                self.refresh().await;
                true
            }
            Err(e) => self.fail(format!("Failed to delete column: {}", e)),
        }
    }

    /// Summary of the whole project, or of one column.
    pub async fn summarize(&self, column: Option<&str>) -> Option<String> {
        let project_id = self.current_project_id()?;
        match self.api.summarize(&project_id, column).await {
            Ok(summary) => Some(non_empty_or(summary, NO_SUMMARY)),
            Err(e) => {
                log::warn!(target: "flowboard.client", "Summary failed: {}", e);
                self.notify(Notice::error("Failed to generate summary"));
                None
            }
        }
    }

    pub async fn ask(&self, question: &str) -> Option<String> {
        let project_id = self.current_project_id()?;
        let question = question.trim();
        if question.is_empty() {
            self.notify(Notice::error("Please enter a question."));
            return None;
        }
        match self.api.ask(&project_id, question).await {
            Ok(answer) => Some(non_empty_or(answer, NO_ANSWER)),
            Err(e) => {
                log::warn!(target: "flowboard.client", "Question failed: {}", e);
                self.notify(Notice::error("Failed to get answer"));
                None
            }
        }
    }
}

fn non_empty_or(text: String, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
}
