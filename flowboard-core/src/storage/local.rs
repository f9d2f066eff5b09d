/// Local document storage backend.
///
/// Keeps every project and task in memory and, when opened with a data file,
/// mirrors the full document set to disk after each write:
/// - Copy-on-write commits: a mutation runs against a clone, the clone is
///   persisted, and only then becomes visible to readers
/// - Atomic writes (write to .tmp, fsync, rename)
/// - A single writer mutex so read-modify-write commits never interleave
/// - A persisted version counter, seeded from the clock at startup so it
///   never repeats across restarts
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock, RwLockReadGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{BoardStorage, StorageError};
use crate::types::{Project, Task, TaskFields, TaskPatch};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Documents {
    #[serde(default)]
    projects: BTreeMap<String, Project>,
    #[serde(default)]
    tasks: BTreeMap<String, Task>,
    #[serde(default)]
    version: u64,
}

/// Lowest version a freshly opened store may report: the startup time in ms.
fn boot_version() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(1).max(1)
}

pub struct LocalStorage {
    documents: RwLock<Documents>,
    /// JSON snapshot target; `None` keeps everything in memory
    data_file: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStorage {
    /// Purely in-memory store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Documents {
                version: boot_version(),
                ..Documents::default()
            }),
            data_file: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Store backed by a JSON data file. A missing file starts empty and is
    /// created on the first write.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let mut documents = match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Documents::default(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    target: "flowboard.storage",
                    "No data file at {}, starting empty",
                    path.display()
                );
                Documents::default()
            }
            Err(e) => return Err(e.into()),
        };
        documents.version = documents.version.max(boot_version());

        log::info!(
            target: "flowboard.storage",
            "Loaded {} projects and {} tasks from {}",
            documents.projects.len(),
            documents.tasks.len(),
            path.display()
        );

        Ok(Self {
            documents: RwLock::new(documents),
            data_file: Some(path.to_path_buf()),
            write_lock: Mutex::new(()),
        })
    }

    pub fn data_file(&self) -> Option<&Path> {
        self.data_file.as_deref()
    }

    fn read(&self) -> RwLockReadGuard<'_, Documents> {
        self.documents.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `mutate` against a copy of the documents, persist the copy, then
    /// publish it. Nothing becomes visible if either step fails.
    fn commit<T>(
        &self,
        mutate: impl FnOnce(&mut Documents) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut next = self.read().clone();
        let result = mutate(&mut next)?;
        next.version += 1;

        if let Some(path) = &self.data_file {
            let json = serde_json::to_string_pretty(&next)?;
            Self::atomic_write(path, &json).map_err(|e| {
                log::error!(
                    target: "flowboard.storage",
                    "Failed to persist {}: {}",
                    path.display(),
                    e
                );
                StorageError::Persistence(format!("{}: {}", path.display(), e))
            })?;
        }

        *self.documents.write().unwrap_or_else(|e| e.into_inner()) = next;
        Ok(result)
    }

    /// Atomic write with fsync: write to .tmp, fsync, rename, fsync directory.
    fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
        let tmp_path = path.with_extension("flowboard.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        if let Some(dir) = path.parent() {
            if let Ok(d) = fs::File::open(dir) {
                let _ = d.sync_all();
            }
        }
        Ok(())
    }
}

impl BoardStorage for LocalStorage {
    fn list_projects(&self) -> Vec<Project> {
        self.read().projects.values().cloned().collect()
    }

    fn get_project(&self, project_id: &str) -> Option<Project> {
        self.read().projects.get(project_id).cloned()
    }

    fn save_project(&self, project: &Project) -> Result<(), StorageError> {
        self.commit(|docs| {
            docs.projects.insert(project.id.clone(), project.clone());
            Ok(())
        })
    }

    fn delete_project(&self, project_id: &str) -> Result<usize, StorageError> {
        self.commit(|docs| {
            docs.projects
                .remove(project_id)
                .ok_or_else(|| StorageError::ProjectNotFound(project_id.to_string()))?;
            let before = docs.tasks.len();
            docs.tasks.retain(|_, t| t.project_id != project_id);
            Ok(before - docs.tasks.len())
        })
    }

    fn find_tasks_by_project(&self, project_id: &str) -> Vec<Task> {
        self.read()
            .tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect()
    }

    fn get_task(&self, task_id: &str) -> Option<Task> {
        self.read().tasks.get(task_id).cloned()
    }

    fn insert_task(&self, task: &Task) -> Result<(), StorageError> {
        self.commit(|docs| {
            docs.tasks.insert(task.id.clone(), task.clone());
            Ok(())
        })
    }

    fn update_task(
        &self,
        task_id: &str,
        fields: &TaskFields,
        positions: &[TaskPatch],
    ) -> Result<Task, StorageError> {
        self.commit(|docs| {
            if !docs.tasks.contains_key(task_id) {
                return Err(StorageError::TaskNotFound(task_id.to_string()));
            }
            let now = Utc::now();
            for patch in positions {
                if let Some(task) = docs.tasks.get_mut(&patch.id) {
                    task.order = patch.order;
                    task.status = patch.status.clone();
                    task.updated_at = now;
                }
            }
            let task = docs
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| StorageError::TaskNotFound(task_id.to_string()))?;
            if let Some(title) = &fields.title {
                task.title = title.clone();
            }
            if let Some(description) = &fields.description {
                task.description = description.clone();
            }
            task.updated_at = now;
            Ok(task.clone())
        })
    }

    fn delete_task(&self, task_id: &str) -> Result<Task, StorageError> {
        self.commit(|docs| {
            docs.tasks
                .remove(task_id)
                .ok_or_else(|| StorageError::TaskNotFound(task_id.to_string()))
        })
    }

    fn bulk_write_task_positions(&self, patches: &[TaskPatch]) -> Result<usize, StorageError> {
        self.commit(|docs| {
            let now = Utc::now();
            let mut written = 0;
            for patch in patches {
                if let Some(task) = docs.tasks.get_mut(&patch.id) {
                    task.order = patch.order;
                    task.status = patch.status.clone();
                    task.updated_at = now;
                    written += 1;
                }
            }
            Ok(written)
        })
    }

    fn remove_column(&self, project: &Project, status: &str) -> Result<usize, StorageError> {
        self.commit(|docs| {
            let before = docs.tasks.len();
            docs.tasks
                .retain(|_, t| !(t.project_id == project.id && t.status == status));
            docs.projects.insert(project.id.clone(), project.clone());
            Ok(before - docs.tasks.len())
        })
    }

    fn rename_status(&self, project_id: &str, from: &str, to: &str) -> Result<usize, StorageError> {
        self.commit(|docs| {
            let now = Utc::now();
            let mut renamed = 0;
            for task in docs.tasks.values_mut() {
                if task.project_id == project_id && task.status == from {
                    task.status = to.to_string();
                    task.updated_at = now;
                    renamed += 1;
                }
            }
            Ok(renamed)
        })
    }

    fn version(&self) -> u64 {
        self.read().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn task(project_id: &str, title: &str, status: &str, order: usize) -> Task {
        let now = Utc::now();
        Task {
            id: crate::types::new_id(),
            project_id: project_id.to_string(),
            title: title.to_string(),
            description: String::new(),
            status: status.to_string(),
            order,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_data_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("board.json");

        let storage = LocalStorage::open(&path).unwrap();
        let project = Project::new("Launch", "");
        storage.save_project(&project).unwrap();
        let t = task(&project.id, "Write docs", "To Do", 0);
        storage.insert_task(&t).unwrap();

        let reopened = LocalStorage::open(&path).unwrap();
        assert_eq!(reopened.get_project(&project.id), Some(project.clone()));
        assert_eq!(reopened.find_tasks_by_project(&project.id), vec![t]);
    }

    #[test]
    fn test_bulk_write_skips_unknown_ids() {
        let storage = LocalStorage::new();
        let a = task("p1", "A", "To Do", 0);
        let b = task("p1", "B", "To Do", 1);
        storage.insert_task(&a).unwrap();
        storage.insert_task(&b).unwrap();

        let written = storage
            .bulk_write_task_positions(&[
                TaskPatch { id: b.id.clone(), order: 0, status: "To Do".into() },
                TaskPatch { id: "missing".into(), order: 5, status: "Done".into() },
                TaskPatch { id: a.id.clone(), order: 1, status: "To Do".into() },
            ])
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(storage.get_task(&a.id).unwrap().order, 1);
        assert_eq!(storage.get_task(&b.id).unwrap().order, 0);
    }

    #[test]
    fn test_failed_persist_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        fs::create_dir(&data_dir).unwrap();
        let path = data_dir.join("board.json");

        let storage = LocalStorage::open(&path).unwrap();
        let a = task("p1", "A", "To Do", 0);
        let b = task("p1", "B", "To Do", 1);
        storage.insert_task(&a).unwrap();
        storage.insert_task(&b).unwrap();
        let version = storage.version();

        fs::remove_dir_all(&data_dir).unwrap();

        let result = storage.bulk_write_task_positions(&[
            TaskPatch { id: a.id.clone(), order: 1, status: "To Do".into() },
            TaskPatch { id: b.id.clone(), order: 0, status: "To Do".into() },
        ]);

        assert!(matches!(result, Err(StorageError::Persistence(_))));
        assert_eq!(storage.get_task(&a.id).unwrap().order, 0);
        assert_eq!(storage.get_task(&b.id).unwrap().order, 1);
        assert_eq!(storage.version(), version);
    }

    #[test]
    fn test_delete_project_cascades() {
        let storage = LocalStorage::new();
        let keep = Project::new("Keep", "");
        let doomed = Project::new("Doomed", "");
        storage.save_project(&keep).unwrap();
        storage.save_project(&doomed).unwrap();
        storage.insert_task(&task(&keep.id, "K", "To Do", 0)).unwrap();
        storage.insert_task(&task(&doomed.id, "D1", "To Do", 0)).unwrap();
        storage.insert_task(&task(&doomed.id, "D2", "Done", 0)).unwrap();

        assert_eq!(storage.delete_project(&doomed.id).unwrap(), 2);
        assert!(storage.get_project(&doomed.id).is_none());
        assert!(storage.find_tasks_by_project(&doomed.id).is_empty());
        assert_eq!(storage.find_tasks_by_project(&keep.id).len(), 1);
    }

    #[test]
    fn test_remove_and_rename_column_stay_inside_project() {
        let storage = LocalStorage::new();
        let mut p1 = Project::new("One", "");
        p1.column_order.push("Review".into());
        storage.save_project(&p1).unwrap();
        storage.insert_task(&task(&p1.id, "A", "Review", 0)).unwrap();
        storage.insert_task(&task(&p1.id, "B", "To Do", 0)).unwrap();
        storage.insert_task(&task("p2", "C", "Review", 0)).unwrap();

        assert_eq!(storage.rename_status(&p1.id, "To Do", "Backlog").unwrap(), 1);
        p1.column_order.retain(|c| c != "Review");
        assert_eq!(storage.remove_column(&p1, "Review").unwrap(), 1);

        let tasks = storage.find_tasks_by_project(&p1.id);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, "Backlog");
        assert_eq!(storage.get_project(&p1.id).unwrap().column_order.len(), 3);
        assert_eq!(storage.find_tasks_by_project("p2")[0].status, "Review");
    }

    #[test]
    fn test_failed_column_removal_keeps_tasks_and_column() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        fs::create_dir(&data_dir).unwrap();
        let storage = LocalStorage::open(&data_dir.join("board.json")).unwrap();
        let mut project = Project::new("Launch", "");
        project.column_order.push("Review".into());
        storage.save_project(&project).unwrap();
        let t = task(&project.id, "A", "Review", 0);
        storage.insert_task(&t).unwrap();

        fs::remove_dir_all(&data_dir).unwrap();
        let mut trimmed = project.clone();
        trimmed.column_order.retain(|c| c != "Review");
        let result = storage.remove_column(&trimmed, "Review");

        assert!(matches!(result, Err(StorageError::Persistence(_))));
        assert_eq!(storage.get_project(&project.id), Some(project.clone()));
        assert_eq!(storage.find_tasks_by_project(&project.id), vec![t]);
    }

    #[test]
    fn test_version_keeps_rising_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("board.json");

        let storage = LocalStorage::open(&path).unwrap();
        let project = Project::new("Launch", "");
        storage.save_project(&project).unwrap();
        storage.insert_task(&task(&project.id, "A", "To Do", 0)).unwrap();
        let before = storage.version();
        drop(storage);

        let reopened = LocalStorage::open(&path).unwrap();
        assert!(reopened.version() >= before);
        reopened.insert_task(&task(&project.id, "B", "To Do", 1)).unwrap();
        assert!(reopened.version() > before);
    }

    #[test]
    fn test_text_and_positions_land_in_one_write() {
        let storage = LocalStorage::new();
        let a = task("p1", "A", "To Do", 0);
        let b = task("p1", "B", "To Do", 1);
        storage.insert_task(&a).unwrap();
        storage.insert_task(&b).unwrap();
        let version = storage.version();

        let fields = TaskFields {
            title: Some("A2".into()),
            description: None,
        };
        let updated = storage
            .update_task(
                &a.id,
                &fields,
                &[
                    TaskPatch { id: a.id.clone(), order: 0, status: "Done".into() },
                    TaskPatch { id: b.id.clone(), order: 0, status: "To Do".into() },
                ],
            )
            .unwrap();

        assert_eq!(updated.title, "A2");
        assert_eq!(updated.status, "Done");
        assert_eq!(storage.get_task(&b.id).unwrap().order, 0);
        assert_eq!(storage.version(), version + 1);
    }

    #[test]
    fn test_update_unknown_task_is_not_found() {
        let storage = LocalStorage::new();
        let ghost = TaskPatch { id: "nope".into(), order: 0, status: "Done".into() };
        let result = storage.update_task("nope", &TaskFields::default(), &[ghost]);
        assert!(matches!(result, Err(StorageError::TaskNotFound(_))));
    }
}
