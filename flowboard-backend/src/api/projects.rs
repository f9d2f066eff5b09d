use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use flowboard_core::board::orphaned_tasks;
use flowboard_core::events::BoardChangeEvent;
use flowboard_core::types::{Project, ProjectSummary, ProjectUpdate};
use serde::Deserialize;

use super::{api_error, insert_header_safe, json_body, storage_error, ApiError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(rename = "populateTaskCount", default)]
    populate_task_count: bool,
}

#[derive(Deserialize)]
pub struct DetailQuery {
    #[serde(rename = "populateTasks", default)]
    populate_tasks: bool,
}

#[derive(Deserialize)]
pub struct CreateProjectBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
pub struct AddColumnBody {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
pub struct RenameColumnBody {
    #[serde(rename = "newName", default)]
    new_name: String,
}

pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<ProjectSummary>> {
    Json(state.projects.list_projects(query.populate_task_count))
}

pub async fn create_project(
    State(state): State<AppState>,
    body: Result<Json<CreateProjectBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let body = json_body(body, "flowboard.api.create_project")?;
    let project = state
        .projects
        .create_project(&body.name, &body.description)
        .map_err(|e| storage_error("flowboard.api.create_project", "Failed to create project", e))?;

    state.publish(BoardChangeEvent::changed(&project.id));
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /projects/{id} -- project, optionally with tasks; honours If-None-Match.
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(query): Query<DetailQuery>,
    headers: HeaderMap,
) -> Result<(StatusCode, HeaderMap, Json<serde_json::Value>), ApiError> {
    let target = "flowboard.api.get_project";
    let version = state.storage.version();

    let serialized = if query.populate_tasks {
        let full = state
            .projects
            .get_project_with_tasks(&project_id)
            .map_err(|e| storage_error(target, format!("Project {}", project_id), e))?;
        let orphans = orphaned_tasks(&full.tasks, &full.project.column_order);
        if !orphans.is_empty() {
            log::warn!(
                target: target,
                "Project {} has {} task(s) in no known column",
                project_id,
                orphans.len()
            );
        }
        serde_json::to_value(&full)
    } else {
        let project = state
            .projects
            .get_project(&project_id)
            .map_err(|e| storage_error(target, format!("Project {}", project_id), e))?;
        serde_json::to_value(&project)
    };
    let body = serialized.map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            target,
            format!("Failed to serialize project {}: {}", project_id, e),
        )
    })?;

    let etag = format!(
        "\"{}{}\"",
        version,
        if query.populate_tasks { "-tasks" } else { "" }
    );
    let mut resp_headers = HeaderMap::new();
    insert_header_safe(&mut resp_headers, "etag", &etag);

    // Check If-None-Match for conditional response
    if let Some(if_none_match) = headers.get("if-none-match") {
        if let Ok(value) = if_none_match.to_str() {
            if value == etag {
                return Ok((
                    StatusCode::NOT_MODIFIED,
                    resp_headers,
                    Json(serde_json::json!({})),
                ));
            }
        }
    }

    Ok((StatusCode::OK, resp_headers, Json(body)))
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    body: Result<Json<ProjectUpdate>, JsonRejection>,
) -> Result<Json<Project>, ApiError> {
    let target = "flowboard.api.update_project";
    let update = json_body(body, target)?;
    let project = state
        .projects
        .update_project(&project_id, &update)
        .map_err(|e| storage_error(target, format!("Failed to update project {}", project_id), e))?;

    state.publish(BoardChangeEvent::changed(&project_id));
    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state.projects.delete_project(&project_id).map_err(|e| {
        storage_error(
            "flowboard.api.delete_project",
            format!("Failed to delete project {}", project_id),
            e,
        )
    })?;

    state.publish(BoardChangeEvent::ProjectDeleted {
        project_id: project_id.clone(),
    });
    Ok(Json(serde_json::json!({
        "message": "Project and related tasks deleted",
        "deletedTasks": removed,
    })))
}

pub async fn add_column(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    body: Result<Json<AddColumnBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let target = "flowboard.api.add_column";
    let body = json_body(body, target)?;
    let project = state
        .projects
        .add_column(&project_id, &body.name)
        .map_err(|e| storage_error(target, format!("Failed to add column to {}", project_id), e))?;

    state.publish(BoardChangeEvent::changed(&project_id));
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn rename_column(
    State(state): State<AppState>,
    Path((project_id, column)): Path<(String, String)>,
    body: Result<Json<RenameColumnBody>, JsonRejection>,
) -> Result<Json<Project>, ApiError> {
    let target = "flowboard.api.rename_column";
    let body = json_body(body, target)?;
    let project = state
        .projects
        .rename_column(&project_id, &column, &body.new_name)
        .map_err(|e| {
            storage_error(
                target,
                format!("Failed to rename column '{}' of {}", column, project_id),
                e,
            )
        })?;

    state.publish(BoardChangeEvent::changed(&project_id));
    Ok(Json(project))
}

pub async fn delete_column(
    State(state): State<AppState>,
    Path((project_id, column)): Path<(String, String)>,
) -> Result<Json<Project>, ApiError> {
    let project = state
        .projects
        .delete_column(&project_id, &column)
        .map_err(|e| {
            storage_error(
                "flowboard.api.delete_column",
                format!("Failed to delete column '{}' of {}", column, project_id),
                e,
            )
        })?;

    state.publish(BoardChangeEvent::changed(&project_id));
    Ok(Json(project))
}
