use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, StatusCode},
    middleware,
    response::Json,
    routing::{get, post, put},
    Router,
};
use flowboard_core::storage::{ErrorKind, StorageError};
use serde::Serialize;

mod ai;
mod events;
mod projects;
pub mod rate_limit;
mod tasks;


use crate::state::AppState;
use rate_limit::{rate_limit_middleware, RateLimiter};

/// Axum REST API routes, mounted under `/api`.
///
///   GET    /projects?populateTaskCount=true      -> list projects, newest first
///   POST   /projects                             -> create project
///   GET    /projects/{id}?populateTasks=true     -> project (+ tasks) with ETag
///   PUT    /projects/{id}                        -> update name/description, rename column
///   DELETE /projects/{id}                        -> delete project and its tasks
///   POST   /projects/{id}/columns                -> add column
///   PUT    /projects/{id}/columns/{name}         -> rename column
///   DELETE /projects/{id}/columns/{name}         -> delete custom column and its tasks
///   GET    /projects/{id}/tasks                  -> tasks sorted by rank
///   POST   /projects/{id}/tasks                  -> create task at the end of its column
///   PUT    /tasks/update-order                   -> bulk reorder
///   PUT    /tasks/{id}                           -> partial task update
///   DELETE /tasks/{id}                           -> delete task
///   POST   /ai/summarize                         -> project or column summary
///   POST   /ai/ask                               -> question about a project
///   GET    /events                               -> SSE stream of board changes
///   GET    /status                               -> health check
///   GET    /logs                                 -> recent backend log lines
///   GET    /logs/stream                          -> SSE stream of new log lines
pub fn api_router(ai_rate_limit: usize) -> Router<AppState> {
    let ai_routes = Router::new()
        .route("/ai/summarize", post(ai::summarize))
        .route("/ai/ask", post(ai::ask))
        .route_layer(middleware::from_fn_with_state(
            RateLimiter::new(ai_rate_limit),
            rate_limit_middleware,
        ));

    Router::new()
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/projects/{project_id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/projects/{project_id}/columns", post(projects::add_column))
        .route(
            "/projects/{project_id}/columns/{column}",
            put(projects::rename_column).delete(projects::delete_column),
        )
        .route(
            "/projects/{project_id}/tasks",
            get(tasks::list_tasks).post(tasks::create_task),
        )
        .route("/tasks/update-order", put(tasks::update_order))
        .route(
            "/tasks/{task_id}",
            put(tasks::update_task).delete(tasks::delete_task),
        )
        .route("/events", get(events::sse_events))
        .route("/status", get(events::status))
        .route("/logs", get(events::list_logs))
        .route("/logs/stream", get(events::stream_logs))
        .merge(ai_routes)
}

// ── Shared types and helpers used across sub-modules ────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

fn insert_header_safe(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match value.parse() {
        Ok(parsed) => {
            headers.insert(name, parsed);
        }
        Err(e) => {
            log::warn!("Failed to set header {}={} ({})", name, value, e);
        }
    }
}

fn log_api_issue(status: StatusCode, target: &'static str, message: impl AsRef<str>) {
    let message = message.as_ref();
    if status.is_server_error() {
        log::error!(target: target, "{}", message);
    } else {
        log::warn!(target: target, "{}", message);
    }
}

fn api_error(status: StatusCode, target: &'static str, error: impl Into<String>) -> ApiError {
    let error = error.into();
    log_api_issue(status, target, &error);
    (status, Json(ErrorResponse { error }))
}

fn status_for(e: &StorageError) -> StatusCode {
    match e.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map a storage error to its HTTP status, logging `context` alongside it.
fn storage_error(target: &'static str, context: impl AsRef<str>, e: StorageError) -> ApiError {
    let status = status_for(&e);
    log_api_issue(status, target, format!("{}: {}", context.as_ref(), e));
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// Unwrap a JSON body, turning a rejection into a 400 `{error}` response.
fn json_body<T>(body: Result<Json<T>, JsonRejection>, target: &'static str) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        api_error(
            StatusCode::BAD_REQUEST,
            target,
            format!("Invalid request body: {}", rejection.body_text()),
        )
    })
}
