use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use flowboard_core::events::BoardChangeEvent;
use flowboard_core::types::{NewTask, Task, TaskPatch, TaskUpdate};
use serde::Deserialize;

use super::{json_body, storage_error, ApiError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdateOrderBody {
    tasks: Vec<TaskPatch>,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let full = state
        .projects
        .get_project_with_tasks(&project_id)
        .map_err(|e| storage_error("flowboard.api.list_tasks", format!("Project {}", project_id), e))?;
    Ok(Json(full.tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    body: Result<Json<NewTask>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let target = "flowboard.api.create_task";
    let new_task = json_body(body, target)?;
    let task = state
        .tasks
        .create_task(&project_id, &new_task)
        .map_err(|e| storage_error(target, format!("Failed to create task in {}", project_id), e))?;

    state.publish(BoardChangeEvent::changed(&project_id));
    Ok((StatusCode::CREATED, Json(task)))
}

/// PUT /tasks/{id} -- title, description and status. A client-sent `order`
/// is ignored; ranks only change through moves.
pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    body: Result<Json<TaskUpdate>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let target = "flowboard.api.update_task";
    let update = json_body(body, target)?;
    let task = state
        .tasks
        .update_single(&task_id, &update)
        .map_err(|e| storage_error(target, format!("Failed to update task {}", task_id), e))?;

    state.publish(BoardChangeEvent::changed(&task.project_id));
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let task = state.tasks.delete_task(&task_id).map_err(|e| {
        storage_error(
            "flowboard.api.delete_task",
            format!("Failed to delete task {}", task_id),
            e,
        )
    })?;

    state.publish(BoardChangeEvent::changed(&task.project_id));
    Ok(Json(serde_json::json!({ "message": "Task deleted" })))
}

/// PUT /tasks/update-order -- `{tasks: [{id|_id, order, status}]}` in one write.
pub async fn update_order(
    State(state): State<AppState>,
    body: Result<Json<UpdateOrderBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let target = "flowboard.api.update_order";
    let body = json_body(body, target)?;
    let outcome = state
        .tasks
        .bulk_reorder(&body.tasks)
        .map_err(|e| storage_error(target, "Failed to reorder tasks", e))?;

    log::debug!(
        target: target,
        "Reordered {} task(s) across {} project(s)",
        outcome.written,
        outcome.project_ids.len()
    );
    if !outcome.project_ids.is_empty() {
        state.publish(BoardChangeEvent::TasksReordered {
            project_ids: outcome.project_ids.clone(),
        });
    }
    Ok(Json(serde_json::json!({
        "message": "Tasks updated successfully",
        "updated": outcome.written,
        "skipped": outcome.skipped,
    })))
}
