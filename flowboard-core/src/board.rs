//! Board projection: turns a project's flat task list into ordered columns and
//! computes the speculative result of a drag before it is persisted.
//!
//! Everything in here is pure. Fetching and persisting belong to the caller
//! (see [`crate::drag`]).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::{Task, TaskPatch};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardColumn {
    pub name: String,
    pub tasks: Vec<Task>,
}

/// Columns in board layout order, each holding its tasks sorted by rank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardView {
    pub columns: Vec<BoardColumn>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("No task at index {index} in column {column} ({len} tasks)")]
    SourceOutOfRange {
        column: String,
        index: usize,
        len: usize,
    },
}

/// Group `tasks` into the columns named by `column_names`.
///
/// Every named column is present even when empty. Tasks whose status names no
/// column are left out of the view; [`orphaned_tasks`] lists them.
pub fn project(tasks: &[Task], column_names: &[String]) -> BoardView {
    let mut seen = HashSet::new();
    let mut columns: Vec<BoardColumn> = column_names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .map(|name| BoardColumn {
            name: name.clone(),
            tasks: Vec::new(),
        })
        .collect();

    let slots: HashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.as_str(), i))
        .collect();
    let mut placed = vec![Vec::new(); columns.len()];
    for task in tasks {
        if let Some(&slot) = slots.get(task.status.as_str()) {
            placed[slot].push(task.clone());
        }
    }

    for (column, mut tasks) in columns.iter_mut().zip(placed) {
        tasks.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        column.tasks = tasks;
    }

    BoardView { columns }
}

/// Tasks that [`project`] drops because their status matches no column.
pub fn orphaned_tasks<'a>(tasks: &'a [Task], column_names: &[String]) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| !column_names.iter().any(|c| *c == t.status))
        .collect()
}

/// Move the task at `source_index` of `source_column` to `dest_index` of
/// `dest_column`.
///
/// Returns the new view and the patches needed to persist it: only tasks whose
/// rank or status changed. Every affected column is re-ranked `0..n`. A
/// destination index past the end appends.
pub fn apply_move(
    view: &BoardView,
    source_column: &str,
    source_index: usize,
    dest_column: &str,
    dest_index: usize,
) -> Result<(BoardView, Vec<TaskPatch>), MoveError> {
    if source_column == dest_column && source_index == dest_index {
        return Ok((view.clone(), Vec::new()));
    }

    let source = view
        .column_index(source_column)
        .ok_or_else(|| MoveError::UnknownColumn(source_column.to_string()))?;
    let dest = view
        .column_index(dest_column)
        .ok_or_else(|| MoveError::UnknownColumn(dest_column.to_string()))?;

    let len = view.columns[source].tasks.len();
    if source_index >= len {
        return Err(MoveError::SourceOutOfRange {
            column: source_column.to_string(),
            index: source_index,
            len,
        });
    }

    let mut next = view.clone();
    let mut moved = next.columns[source].tasks.remove(source_index);
    if source != dest {
        moved.status = dest_column.to_string();
    }
    let dest_tasks = &mut next.columns[dest].tasks;
    let at = dest_index.min(dest_tasks.len());
    dest_tasks.insert(at, moved);

    let affected: &[usize] = if source == dest {
        &[source]
    } else {
        &[source, dest]
    };

    let before: HashMap<&str, (usize, &str)> = view
        .columns
        .iter()
        .flat_map(|c| c.tasks.iter())
        .map(|t| (t.id.as_str(), (t.order, t.status.as_str())))
        .collect();

    let mut patches = Vec::new();
    for &slot in affected {
        for (rank, task) in next.columns[slot].tasks.iter_mut().enumerate() {
            task.order = rank;
            let unchanged = before
                .get(task.id.as_str())
                .is_some_and(|&(order, status)| order == rank && status == task.status);
            if !unchanged {
                patches.push(task.position());
            }
        }
    }

    Ok((next, patches))
}

impl BoardView {
    pub fn column(&self, name: &str) -> Option<&BoardColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    /// Column name and index of a task.
    pub fn locate(&self, task_id: &str) -> Option<(&str, usize)> {
        self.columns.iter().find_map(|c| {
            c.tasks
                .iter()
                .position(|t| t.id == task_id)
                .map(|i| (c.name.as_str(), i))
        })
    }

    /// (id, order, status) of every task in display order.
    pub fn positions(&self) -> Vec<TaskPatch> {
        self.columns
            .iter()
            .flat_map(|c| c.tasks.iter().map(Task::position))
            .collect()
    }

    /// True when every column's ranks are exactly `0..n`.
    pub fn is_contiguous(&self) -> bool {
        self.columns
            .iter()
            .all(|c| c.tasks.iter().enumerate().all(|(i, t)| t.order == i))
    }
}
