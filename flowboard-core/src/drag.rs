//! Drag interaction handler: optimistic moves with snapshot rollback.
//!
//! One gesture at a time goes Idle -> Dragging -> Committing -> Idle. The
//! projected move is rendered before the write is sent; if the write fails the
//! view captured before the move is put back and one error notice is raised.
//! Failed writes are never retried.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;

use crate::board::{apply_move, BoardView};
use crate::types::{Task, TaskPatch, TaskUpdate};

/// Write side used by the handler to persist a move.
#[async_trait]
pub trait Reconciler: Send + Sync {
    type Error: Display + Send;

    /// Partial update of one task. Rank is not sent; a status change appends
    /// the task to the end of the destination column.
    async fn update_single(&self, task_id: &str, update: &TaskUpdate) -> Result<Task, Self::Error>;

    /// All-or-nothing position write.
    async fn bulk_reorder(&self, patches: &[TaskPatch]) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// User-facing notification (a toast in the board UI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Receives every view the handler wants shown, plus notices.
pub trait BoardObserver: Send + Sync {
    fn render(&self, view: &BoardView);
    fn notify(&self, notice: Notice);
}

impl<T: BoardObserver + ?Sized> BoardObserver for Arc<T> {
    fn render(&self, view: &BoardView) {
        (**self).render(view)
    }

    fn notify(&self, notice: Notice) {
        (**self).notify(notice)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSource {
    pub column: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    pub column: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragPhase {
    Idle,
    Dragging(DragSource),
    /// Optimistic view is shown; `snapshot` is what to restore on failure.
    Committing { snapshot: BoardView },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// No drag was in progress.
    Ignored,
    /// Dropped outside any column.
    Cancelled,
    /// Dropped where it started, or the move was invalid; nothing sent.
    Unchanged,
    /// Write succeeded; `patches` tasks changed.
    Committed { patches: usize },
    /// Write failed and the pre-drag view was restored.
    RolledBack { error: String },
}

pub struct DragHandler<R, O> {
    view: BoardView,
    phase: DragPhase,
    reconciler: R,
    observer: O,
}

impl<R: Reconciler, O: BoardObserver> DragHandler<R, O> {
    pub fn new(view: BoardView, reconciler: R, observer: O) -> Self {
        Self {
            view,
            phase: DragPhase::Idle,
            reconciler,
            observer,
        }
    }

    pub fn view(&self) -> &BoardView {
        &self.view
    }

    pub fn phase(&self) -> &DragPhase {
        &self.phase
    }

    pub fn reconciler(&self) -> &R {
        &self.reconciler
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Install a freshly fetched view and return to Idle.
    pub fn replace_view(&mut self, view: BoardView) {
        self.view = view;
        self.phase = DragPhase::Idle;
        self.observer.render(&self.view);
    }

    /// Start a gesture. Refused while another gesture is in flight or when the
    /// source does not point at a task.
    pub fn begin_drag(&mut self, source: DragSource) -> bool {
        if self.phase != DragPhase::Idle {
            log::debug!(
                target: "flowboard.drag",
                "Ignoring drag from {}[{}]: another gesture is active",
                source.column,
                source.index
            );
            return false;
        }
        let valid = self
            .view
            .column(&source.column)
            .is_some_and(|c| source.index < c.tasks.len());
        if !valid {
            log::warn!(
                target: "flowboard.drag",
                "Ignoring drag from {}[{}]: no task there",
                source.column,
                source.index
            );
            return false;
        }
        self.phase = DragPhase::Dragging(source);
        true
    }

    /// Finish the gesture. `None` means the task was dropped outside any column.
    pub async fn drop_on(&mut self, target: Option<DropTarget>) -> DropOutcome {
        let source = match std::mem::replace(&mut self.phase, DragPhase::Idle) {
            DragPhase::Dragging(source) => source,
            other => {
                self.phase = other;
                return DropOutcome::Ignored;
            }
        };
        let Some(target) = target else {
            return DropOutcome::Cancelled;
        };

        let (next, patches) = match apply_move(
            &self.view,
            &source.column,
            source.index,
            &target.column,
            target.index,
        ) {
            Ok(result) => result,
            Err(e) => {
                log::warn!(target: "flowboard.drag", "Rejected drop: {}", e);
                return DropOutcome::Unchanged;
            }
        };
        if patches.is_empty() {
            return DropOutcome::Unchanged;
        }

        let snapshot = std::mem::replace(&mut self.view, next);
        self.phase = DragPhase::Committing {
            snapshot: snapshot.clone(),
        };
        self.observer.render(&self.view);

        let result = match single_append(&self.view, &source, &patches) {
            Some(patch) => {
                let update = TaskUpdate {
                    status: Some(patch.status.clone()),
                    ..TaskUpdate::default()
                };
                self.reconciler
                    .update_single(&patch.id, &update)
                    .await
                    .map(|_| ())
            }
            None => self.reconciler.bulk_reorder(&patches).await,
        };

        self.phase = DragPhase::Idle;
        match result {
            Ok(()) => DropOutcome::Committed {
                patches: patches.len(),
            },
            Err(e) => {
                let error = e.to_string();
                log::warn!(
                    target: "flowboard.drag",
                    "Move of {} task(s) failed, restoring board: {}",
                    patches.len(),
                    error
                );
                self.view = snapshot;
                self.observer.render(&self.view);
                self.observer
                    .notify(Notice::error(format!("Failed to move task: {}", error)));
                DropOutcome::RolledBack { error }
            }
        }
    }
}

/// The patch to send through `update_single` when the move is a lone
/// cross-column append, which the server reproduces on its own.
fn single_append<'a>(
    view: &BoardView,
    source: &DragSource,
    patches: &'a [TaskPatch],
) -> Option<&'a TaskPatch> {
    let [patch] = patches else {
        return None;
    };
    if patch.status == source.column {
        return None;
    }
    let dest = view.column(&patch.status)?;
    (patch.order + 1 == dest.tasks.len()).then_some(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::project;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        renders: Mutex<Vec<BoardView>>,
        notices: Mutex<Vec<Notice>>,
    }

    impl BoardObserver for RecordingObserver {
        fn render(&self, view: &BoardView) {
            self.renders.lock().unwrap().push(view.clone());
        }

        fn notify(&self, notice: Notice) {
            self.notices.lock().unwrap().push(notice);
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Single(String, TaskUpdate),
        Bulk(Vec<TaskPatch>),
    }

    #[derive(Default)]
    struct FakeReconciler {
        fail: bool,
        calls: Mutex<Vec<Call>>,
    }

    #[async_trait]
    impl Reconciler for FakeReconciler {
        type Error = String;

        async fn update_single(&self, task_id: &str, update: &TaskUpdate) -> Result<Task, String> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Single(task_id.to_string(), update.clone()));
            if self.fail {
                return Err("storage offline".to_string());
            }
            Ok(task(task_id, update.status.as_deref().unwrap_or("To Do"), 0))
        }

        async fn bulk_reorder(&self, patches: &[TaskPatch]) -> Result<(), String> {
            self.calls.lock().unwrap().push(Call::Bulk(patches.to_vec()));
            if self.fail {
                return Err("storage offline".to_string());
            }
            Ok(())
        }
    }

    fn task(id: &str, status: &str, order: usize) -> Task {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            project_id: "p1".to_string(),
            title: id.to_string(),
            description: String::new(),
            status: status.to_string(),
            order,
            created_at: now,
            updated_at: now,
        }
    }

    fn board() -> BoardView {
        let columns = vec!["To Do".to_string(), "In Progress".to_string(), "Done".to_string()];
        project(
            &[
                task("a", "To Do", 0),
                task("b", "To Do", 1),
                task("c", "To Do", 2),
                task("d", "Done", 0),
            ],
            &columns,
        )
    }

    fn handler(fail: bool) -> DragHandler<FakeReconciler, Arc<RecordingObserver>> {
        DragHandler::new(
            board(),
            FakeReconciler {
                fail,
                ..Default::default()
            },
            Arc::new(RecordingObserver::default()),
        )
    }

    fn src(column: &str, index: usize) -> DragSource {
        DragSource {
            column: column.to_string(),
            index,
        }
    }

    fn dst(column: &str, index: usize) -> Option<DropTarget> {
        Some(DropTarget {
            column: column.to_string(),
            index,
        })
    }

    #[tokio::test]
    async fn test_drop_outside_column_sends_nothing() {
        let mut h = handler(false);
        assert!(h.begin_drag(src("To Do", 0)));
        let before = h.view().clone();
        assert_eq!(h.drop_on(None).await, DropOutcome::Cancelled);
        assert_eq!(h.phase(), &DragPhase::Idle);
        assert_eq!(h.view(), &before);
        assert!(h.reconciler().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_in_place_sends_nothing() {
        let mut h = handler(false);
        assert!(h.begin_drag(src("To Do", 1)));
        assert_eq!(h.drop_on(dst("To Do", 1)).await, DropOutcome::Unchanged);
        assert!(h.reconciler().calls.lock().unwrap().is_empty());
        assert!(h.observer().renders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_displacing_move_uses_bulk_reorder() {
        let mut h = handler(false);
        h.begin_drag(src("To Do", 1));
        let outcome = h.drop_on(dst("In Progress", 0)).await;

        assert_eq!(outcome, DropOutcome::Committed { patches: 2 });
        let calls = h.reconciler().calls.lock().unwrap().clone();
        assert!(matches!(calls.as_slice(), [Call::Bulk(p)] if p.len() == 2));
        assert_eq!(h.view().locate("b"), Some(("In Progress", 0)));
        assert_eq!(h.observer().renders.lock().unwrap().len(), 1);
        assert!(h.observer().notices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tail_append_uses_single_update() {
        let mut h = handler(false);
        h.begin_drag(src("To Do", 2));
        let outcome = h.drop_on(dst("Done", 5)).await;

        assert_eq!(outcome, DropOutcome::Committed { patches: 1 });
        let calls = h.reconciler().calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![Call::Single(
                "c".to_string(),
                TaskUpdate {
                    status: Some("Done".to_string()),
                    ..TaskUpdate::default()
                }
            )]
        );
    }

    #[tokio::test]
    async fn test_failed_cross_column_move_restores_snapshot() {
        let mut h = handler(true);
        let before = h.view().clone();

        h.begin_drag(src("To Do", 0));
        let outcome = h.drop_on(dst("In Progress", 0)).await;

        assert!(matches!(outcome, DropOutcome::RolledBack { .. }));
        assert_eq!(h.view().positions(), before.positions());
        assert_eq!(h.view(), &before);
        assert_eq!(h.phase(), &DragPhase::Idle);

        let renders = h.observer().renders.lock().unwrap().clone();
        assert_eq!(renders.len(), 2);
        assert_eq!(renders[1], before);

        let notices = h.observer().notices.lock().unwrap().clone();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.contains("storage offline"));
    }

    #[tokio::test]
    async fn test_overlapping_gesture_is_ignored() {
        let mut h = handler(false);
        assert!(h.begin_drag(src("To Do", 0)));
        assert!(!h.begin_drag(src("Done", 0)));
        assert_eq!(h.phase(), &DragPhase::Dragging(src("To Do", 0)));
    }

    #[tokio::test]
    async fn test_drag_from_empty_slot_is_refused() {
        let mut h = handler(false);
        assert!(!h.begin_drag(src("In Progress", 0)));
        assert_eq!(h.drop_on(dst("Done", 0)).await, DropOutcome::Ignored);
    }
}
