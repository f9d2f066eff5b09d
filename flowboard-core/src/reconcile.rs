//! Server-side authority for task creation, edits, moves and bulk reorders.
//!
//! Every write leaves each column it touches ranked `0..n`. Unknown ids in a
//! bulk reorder are skipped and reported; unknown ids on the single-task path
//! are `TaskNotFound`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::drag::Reconciler;
use crate::storage::{BoardStorage, StorageError};
use crate::types::{new_id, NewTask, Project, Task, TaskFields, TaskPatch, TaskUpdate};

/// Result of a bulk reorder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    /// Tasks whose rank or status was written, including re-ranked neighbours.
    pub written: usize,
    /// Patch ids that matched no stored task.
    pub skipped: Vec<String>,
    pub project_ids: Vec<String>,
}

#[derive(Clone)]
pub struct ReconciliationService {
    storage: Arc<dyn BoardStorage>,
}

impl ReconciliationService {
    pub fn new(storage: Arc<dyn BoardStorage>) -> Self {
        Self { storage }
    }

    fn project(&self, project_id: &str) -> Result<Project, StorageError> {
        self.storage
            .get_project(project_id)
            .ok_or_else(|| StorageError::ProjectNotFound(project_id.to_string()))
    }

    /// Create a task at the end of its column.
    pub fn create_task(&self, project_id: &str, new: &NewTask) -> Result<Task, StorageError> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(StorageError::validation("Task title is required"));
        }
        let project = self.project(project_id)?;

        let status = match new.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(status) => {
                ensure_column(&project, status)?;
                status.to_string()
            }
            None => project
                .default_status()
                .ok_or_else(|| StorageError::validation("Project has no columns"))?
                .to_string(),
        };

        let tasks = self.storage.find_tasks_by_project(project_id);
        let now = Utc::now();
        let task = Task {
            id: new_id(),
            project_id: project_id.to_string(),
            title: title.to_string(),
            description: new
                .description
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            order: next_rank(&tasks, &status),
            status,
            created_at: now,
            updated_at: now,
        };
        self.storage.insert_task(&task)?;

        log::debug!(
            target: "flowboard.reconcile",
            "Created task {} in {}[{}]",
            task.id,
            task.status,
            task.order
        );
        Ok(task)
    }

    /// Partial update of one task. A status change appends the task to the
    /// destination column and closes the gap it leaves behind.
    pub fn update_single(&self, task_id: &str, update: &TaskUpdate) -> Result<Task, StorageError> {
        let task = self
            .storage
            .get_task(task_id)
            .ok_or_else(|| StorageError::TaskNotFound(task_id.to_string()))?;
        if update.is_empty() {
            return Ok(task);
        }

        let title = match update.title.as_deref().map(str::trim) {
            Some("") => return Err(StorageError::validation("Task title cannot be empty")),
            other => other,
        };

        let new_status = update
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| *s != task.status);
        let mut patches = Vec::new();
        if let Some(status) = new_status {
            let project = self.project(&task.project_id)?;
            ensure_column(&project, status)?;

            let tasks = self.storage.find_tasks_by_project(&task.project_id);
            patches.push(TaskPatch {
                id: task.id.clone(),
                order: next_rank(&tasks, status),
                status: status.to_string(),
            });
            let remaining: Vec<Task> = tasks.into_iter().filter(|t| t.id != task.id).collect();
            patches.extend(compact_column(&remaining, &task.status));
        }

        let fields = TaskFields {
            title: title.map(str::to_string),
            description: update.description.as_deref().map(|d| d.trim().to_string()),
        };
        if patches.is_empty() && fields.title.is_none() && fields.description.is_none() {
            return Ok(task);
        }
        self.storage.update_task(task_id, &fields, &patches)
    }

    /// Delete a task and re-rank the rest of its column.
    pub fn delete_task(&self, task_id: &str) -> Result<Task, StorageError> {
        let task = self.storage.delete_task(task_id)?;

        let remaining = self.storage.find_tasks_by_project(&task.project_id);
        let patches = compact_column(&remaining, &task.status);
        if !patches.is_empty() {
            if let Err(e) = self.storage.bulk_write_task_positions(&patches) {
                // The delete itself went through; the next move re-ranks the column.
                log::warn!(
                    target: "flowboard.reconcile",
                    "Deleted task {} but could not close the gap in {}: {}",
                    task_id,
                    task.status,
                    e
                );
            }
        }
        Ok(task)
    }

    /// Apply a batch of `{id, order, status}` patches as one write.
    pub fn bulk_reorder(&self, patches: &[TaskPatch]) -> Result<BulkOutcome, StorageError> {
        if patches.is_empty() {
            return Err(StorageError::validation(
                "Invalid request body: 'tasks' must be a non-empty array",
            ));
        }
        let mut seen = HashSet::new();
        for patch in patches {
            if patch.id.trim().is_empty() || patch.status.trim().is_empty() {
                return Err(StorageError::validation(
                    "Every task entry needs an id and a status",
                ));
            }
            if !seen.insert(patch.id.as_str()) {
                return Err(StorageError::validation(format!(
                    "Task {} appears more than once",
                    patch.id
                )));
            }
        }

        let mut skipped = Vec::new();
        let mut by_project: BTreeMap<String, Vec<&TaskPatch>> = BTreeMap::new();
        for patch in patches {
            match self.storage.get_task(&patch.id) {
                Some(task) => by_project.entry(task.project_id).or_default().push(patch),
                None => skipped.push(patch.id.clone()),
            }
        }

        let mut writes = Vec::new();
        let mut project_ids = Vec::new();
        for (project_id, project_patches) in &by_project {
            let Some(project) = self.storage.get_project(project_id) else {
                log::warn!(
                    target: "flowboard.reconcile",
                    "Skipping {} task(s) of missing project {}",
                    project_patches.len(),
                    project_id
                );
                skipped.extend(project_patches.iter().map(|p| p.id.clone()));
                continue;
            };
            for patch in project_patches {
                ensure_column(&project, &patch.status)?;
            }
            let tasks = self.storage.find_tasks_by_project(project_id);
            writes.extend(rerank_patched(&tasks, project_patches));
            project_ids.push(project_id.clone());
        }

        if !skipped.is_empty() {
            log::warn!(
                target: "flowboard.reconcile",
                "Bulk reorder skipped unknown task ids: {}",
                skipped.join(", ")
            );
        }

        let written = if writes.is_empty() {
            0
        } else {
            self.storage.bulk_write_task_positions(&writes)?
        };
        Ok(BulkOutcome {
            written,
            skipped,
            project_ids,
        })
    }
}

#[async_trait]
impl Reconciler for ReconciliationService {
    type Error = StorageError;

    async fn update_single(&self, task_id: &str, update: &TaskUpdate) -> Result<Task, StorageError> {
        ReconciliationService::update_single(self, task_id, update)
    }

    async fn bulk_reorder(&self, patches: &[TaskPatch]) -> Result<(), StorageError> {
        ReconciliationService::bulk_reorder(self, patches).map(|_| ())
    }
}

fn ensure_column(project: &Project, status: &str) -> Result<(), StorageError> {
    if project.has_column(status) {
        Ok(())
    } else {
        Err(StorageError::validation(format!(
            "Column '{}' does not exist in project {}",
            status, project.id
        )))
    }
}

/// Rank for a task appended to `status`: current max + 1, or 0 when empty.
fn next_rank(tasks: &[Task], status: &str) -> usize {
    tasks
        .iter()
        .filter(|t| t.status == status)
        .map(|t| t.order + 1)
        .max()
        .unwrap_or(0)
}

/// Patches that rank the tasks of one column `0..n`, keeping their order.
pub(crate) fn compact_column(tasks: &[Task], status: &str) -> Vec<TaskPatch> {
    let mut column: Vec<&Task> = tasks.iter().filter(|t| t.status == status).collect();
    column.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    column
        .into_iter()
        .enumerate()
        .filter(|(rank, t)| t.order != *rank)
        .map(|(rank, t)| TaskPatch {
            id: t.id.clone(),
            order: rank,
            status: status.to_string(),
        })
        .collect()
}

/// Apply `patches` to the project's tasks and re-rank every column they touch.
/// Patched tasks come first when their requested rank ties with an untouched
/// task. Returns only the positions that differ from what is stored.
fn rerank_patched(tasks: &[Task], patches: &[&TaskPatch]) -> Vec<TaskPatch> {
    let requested: HashMap<&str, &TaskPatch> =
        patches.iter().map(|p| (p.id.as_str(), *p)).collect();

    let mut touched = BTreeSet::new();
    for task in tasks {
        if let Some(patch) = requested.get(task.id.as_str()) {
            touched.insert(task.status.as_str());
            touched.insert(patch.status.as_str());
        }
    }

    let mut writes = Vec::new();
    for column in touched {
        let mut members: Vec<(&Task, usize, bool)> = tasks
            .iter()
            .filter_map(|t| match requested.get(t.id.as_str()) {
                Some(p) if p.status == column => Some((t, p.order, true)),
                Some(_) => None,
                None if t.status == column => Some((t, t.order, false)),
                None => None,
            })
            .collect();
        members.sort_by(|(a, a_rank, a_pinned), (b, b_rank, b_pinned)| {
            a_rank
                .cmp(b_rank)
                .then_with(|| b_pinned.cmp(a_pinned))
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        for (rank, (task, _, _)) in members.into_iter().enumerate() {
            if task.order != rank || task.status != column {
                writes.push(TaskPatch {
                    id: task.id.clone(),
                    order: rank,
                    status: column.to_string(),
                });
            }
        }
    }
    writes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{apply_move, project};
    use crate::drag::{BoardObserver, DragHandler, DragSource, DropOutcome, DropTarget, Notice};
    use crate::storage::local::LocalStorage;
    use crate::storage::ErrorKind;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn setup() -> (Arc<LocalStorage>, ReconciliationService, Project) {
        let storage = Arc::new(LocalStorage::new());
        let project = Project::new("Launch", "");
        storage.save_project(&project).unwrap();
        let service = ReconciliationService::new(storage.clone());
        (storage, service, project)
    }

    fn add(service: &ReconciliationService, project: &Project, title: &str, status: &str) -> Task {
        service
            .create_task(
                &project.id,
                &NewTask {
                    title: title.to_string(),
                    description: None,
                    status: Some(status.to_string()),
                },
            )
            .unwrap()
    }

    fn column(storage: &LocalStorage, project: &Project, status: &str) -> Vec<(String, usize)> {
        let view = project_view(storage, project);
        view.column(status)
            .unwrap()
            .tasks
            .iter()
            .map(|t| (t.title.clone(), t.order))
            .collect()
    }

    fn project_view(storage: &LocalStorage, p: &Project) -> crate::board::BoardView {
        project(&storage.find_tasks_by_project(&p.id), &p.column_order)
    }

    #[test]
    fn test_create_appends_to_column() {
        let (storage, service, p) = setup();
        add(&service, &p, "A", "To Do");
        add(&service, &p, "B", "To Do");
        add(&service, &p, "X", "Done");
        let c = service
            .create_task(&p.id, &NewTask { title: "  C  ".into(), ..NewTask::default() })
            .unwrap();

        assert_eq!(c.title, "C");
        assert_eq!(c.status, "To Do");
        assert_eq!(
            column(&storage, &p, "To Do"),
            vec![("A".into(), 0), ("B".into(), 1), ("C".into(), 2)]
        );
        assert_eq!(column(&storage, &p, "Done"), vec![("X".into(), 0)]);
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let (_, service, p) = setup();
        let blank = service.create_task(&p.id, &NewTask { title: "   ".into(), ..NewTask::default() });
        assert_eq!(blank.unwrap_err().kind(), ErrorKind::Validation);

        let unknown = service.create_task(
            &p.id,
            &NewTask { title: "A".into(), status: Some("Review".into()), ..NewTask::default() },
        );
        assert_eq!(unknown.unwrap_err().kind(), ErrorKind::Validation);

        let missing = service.create_task("nope", &NewTask { title: "A".into(), ..NewTask::default() });
        assert!(matches!(missing, Err(StorageError::ProjectNotFound(_))));
    }

    #[test]
    fn test_status_change_appends_and_closes_gap() {
        let (storage, service, p) = setup();
        add(&service, &p, "A", "To Do");
        let b = add(&service, &p, "B", "To Do");
        add(&service, &p, "C", "To Do");
        add(&service, &p, "D", "Done");

        let moved = service
            .update_single(&b.id, &TaskUpdate { status: Some("Done".into()), ..TaskUpdate::default() })
            .unwrap();

        assert_eq!(moved.status, "Done");
        assert_eq!(moved.order, 1);
        assert_eq!(column(&storage, &p, "To Do"), vec![("A".into(), 0), ("C".into(), 1)]);
        assert_eq!(column(&storage, &p, "Done"), vec![("D".into(), 0), ("B".into(), 1)]);
    }

    #[test]
    fn test_text_edit_keeps_rank() {
        let (storage, service, p) = setup();
        add(&service, &p, "A", "To Do");
        let b = add(&service, &p, "B", "To Do");

        let edited = service
            .update_single(
                &b.id,
                &TaskUpdate {
                    title: Some("Renamed".into()),
                    description: Some("details".into()),
                    status: None,
                },
            )
            .unwrap();

        assert_eq!(edited.title, "Renamed");
        assert_eq!(edited.description, "details");
        assert_eq!(edited.order, 1);
        assert!(project_view(&storage, &p).is_contiguous());
    }

    #[test]
    fn test_move_with_text_edit_is_one_write() {
        let (storage, service, p) = setup();
        let a = add(&service, &p, "A", "To Do");
        add(&service, &p, "B", "To Do");
        let version = storage.version();

        let edited = service
            .update_single(
                &a.id,
                &TaskUpdate {
                    title: Some("A2".into()),
                    description: None,
                    status: Some("Done".into()),
                },
            )
            .unwrap();

        assert_eq!(edited.title, "A2");
        assert_eq!(edited.status, "Done");
        assert_eq!(storage.version(), version + 1);
        assert_eq!(column(&storage, &p, "To Do"), vec![("B".into(), 0)]);
    }

    #[test]
    fn test_failed_move_with_text_edit_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir(&data_dir).unwrap();
        let storage = Arc::new(LocalStorage::open(&data_dir.join("board.json")).unwrap());
        let p = Project::new("Launch", "");
        storage.save_project(&p).unwrap();
        let service = ReconciliationService::new(storage.clone());
        let a = add(&service, &p, "A", "To Do");

        std::fs::remove_dir_all(&data_dir).unwrap();
        let result = service.update_single(
            &a.id,
            &TaskUpdate {
                title: Some("A2".into()),
                description: None,
                status: Some("Done".into()),
            },
        );

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Persistence);
        assert_eq!(storage.get_task(&a.id), Some(a));
    }

    #[test]
    fn test_empty_update_writes_nothing() {
        let (storage, service, p) = setup();
        let a = add(&service, &p, "A", "To Do");
        let version = storage.version();

        let same = service.update_single(&a.id, &TaskUpdate::default()).unwrap();
        assert_eq!(same, a);
        assert_eq!(storage.version(), version);
    }

    #[test]
    fn test_single_update_errors() {
        let (_, service, p) = setup();
        let a = add(&service, &p, "A", "To Do");

        let missing = service.update_single("ghost", &TaskUpdate::default());
        assert!(matches!(missing, Err(StorageError::TaskNotFound(_))));

        let bad_column = service
            .update_single(&a.id, &TaskUpdate { status: Some("Review".into()), ..TaskUpdate::default() });
        assert_eq!(bad_column.unwrap_err().kind(), ErrorKind::Validation);

        let blank = service
            .update_single(&a.id, &TaskUpdate { title: Some(" ".into()), ..TaskUpdate::default() });
        assert_eq!(blank.unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_delete_closes_gap() {
        let (storage, service, p) = setup();
        let a = add(&service, &p, "A", "To Do");
        add(&service, &p, "B", "To Do");
        add(&service, &p, "C", "To Do");

        service.delete_task(&a.id).unwrap();

        assert_eq!(column(&storage, &p, "To Do"), vec![("B".into(), 0), ("C".into(), 1)]);
        assert!(matches!(service.delete_task(&a.id), Err(StorageError::TaskNotFound(_))));
    }

    #[test]
    fn test_bulk_rejects_malformed_batches() {
        let (_, service, p) = setup();
        let a = add(&service, &p, "A", "To Do");

        assert_eq!(service.bulk_reorder(&[]).unwrap_err().kind(), ErrorKind::Validation);

        let dup = TaskPatch { id: a.id.clone(), order: 0, status: "To Do".into() };
        assert_eq!(
            service.bulk_reorder(&[dup.clone(), dup]).unwrap_err().kind(),
            ErrorKind::Validation
        );

        let blank = TaskPatch { id: a.id.clone(), order: 0, status: " ".into() };
        assert_eq!(service.bulk_reorder(&[blank]).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_bulk_skips_unknown_ids_and_applies_the_rest() {
        let (storage, service, p) = setup();
        let a = add(&service, &p, "A", "To Do");
        let b = add(&service, &p, "B", "To Do");

        let outcome = service
            .bulk_reorder(&[
                TaskPatch { id: b.id.clone(), order: 0, status: "To Do".into() },
                TaskPatch { id: "ghost".into(), order: 3, status: "Done".into() },
                TaskPatch { id: a.id.clone(), order: 1, status: "To Do".into() },
            ])
            .unwrap();

        assert_eq!(outcome.skipped, vec!["ghost".to_string()]);
        assert_eq!(outcome.written, 2);
        assert_eq!(column(&storage, &p, "To Do"), vec![("B".into(), 0), ("A".into(), 1)]);
    }

    #[test]
    fn test_bulk_unknown_column_writes_nothing() {
        let (storage, service, p) = setup();
        let a = add(&service, &p, "A", "To Do");
        let b = add(&service, &p, "B", "To Do");
        let version = storage.version();

        let result = service.bulk_reorder(&[
            TaskPatch { id: b.id.clone(), order: 0, status: "To Do".into() },
            TaskPatch { id: a.id.clone(), order: 0, status: "Review".into() },
        ]);

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(storage.version(), version);
        assert_eq!(column(&storage, &p, "To Do"), vec![("A".into(), 0), ("B".into(), 1)]);
    }

    #[test]
    fn test_bulk_partial_patch_keeps_columns_contiguous() {
        let (storage, service, p) = setup();
        add(&service, &p, "A", "To Do");
        add(&service, &p, "B", "To Do");
        let c = add(&service, &p, "C", "To Do");
        add(&service, &p, "D", "Done");

        // Stale client only sends the moved task.
        service
            .bulk_reorder(&[TaskPatch { id: c.id.clone(), order: 0, status: "Done".into() }])
            .unwrap();

        assert_eq!(column(&storage, &p, "Done"), vec![("C".into(), 0), ("D".into(), 1)]);
        assert_eq!(column(&storage, &p, "To Do"), vec![("A".into(), 0), ("B".into(), 1)]);
        assert!(project_view(&storage, &p).is_contiguous());
    }

    #[test]
    fn test_projector_patches_round_trip_through_bulk() {
        let (storage, service, p) = setup();
        for title in ["A", "B", "C"] {
            add(&service, &p, title, "To Do");
        }
        let view = project_view(&storage, &p);

        let (expected, patches) = apply_move(&view, "To Do", 1, "In Progress", 0).unwrap();
        service.bulk_reorder(&patches).unwrap();

        let stored = project_view(&storage, &p);
        assert_eq!(stored.positions(), expected.positions());
        assert!(stored.is_contiguous());
    }

    #[derive(Default)]
    struct Toasts(Mutex<Vec<Notice>>);

    impl BoardObserver for Toasts {
        fn render(&self, _view: &crate::board::BoardView) {}

        fn notify(&self, notice: Notice) {
            self.0.lock().unwrap().push(notice);
        }
    }

    #[tokio::test]
    async fn test_drag_handler_rolls_back_when_store_write_fails() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir(&data_dir).unwrap();
        let storage = Arc::new(LocalStorage::open(&data_dir.join("board.json")).unwrap());
        let p = Project::new("Launch", "");
        storage.save_project(&p).unwrap();
        let service = ReconciliationService::new(storage.clone());
        for title in ["A", "B", "C"] {
            add(&service, &p, title, "To Do");
        }

        let toasts = Arc::new(Toasts::default());
        let mut handler = DragHandler::new(project_view(&storage, &p), service, toasts.clone());
        let before = handler.view().clone();

        std::fs::remove_dir_all(&data_dir).unwrap();
        handler.begin_drag(DragSource { column: "To Do".into(), index: 1 });
        let outcome = handler
            .drop_on(Some(DropTarget { column: "In Progress".into(), index: 0 }))
            .await;

        assert!(matches!(outcome, DropOutcome::RolledBack { .. }));
        assert_eq!(handler.view(), &before);
        assert_eq!(project_view(&storage, &p).positions(), before.positions());
        assert_eq!(toasts.0.lock().unwrap().len(), 1);
    }
}
