use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use flowboard_core::storage::StorageError;
use flowboard_core::types::ProjectWithTasks;
use serde::{Deserialize, Serialize};

use super::{api_error, json_body, log_api_issue, storage_error, ApiError, ErrorResponse};
use crate::ai::prompt;
use crate::state::AppState;

pub const NO_SUMMARY: &str = "No summary generated.";
pub const NO_ANSWER: &str = "No answer generated.";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeBody {
    #[serde(default)]
    project_id: String,
    #[serde(default)]
    column_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskBody {
    #[serde(default)]
    project_id: String,
    #[serde(default)]
    question: String,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    summary: String,
}

#[derive(Serialize)]
pub struct AnswerResponse {
    answer: String,
}

fn load_project(state: &AppState, project_id: &str, target: &'static str) -> Result<ProjectWithTasks, ApiError> {
    state
        .projects
        .get_project_with_tasks(project_id)
        .map_err(|e| storage_error(target, format!("AI request for {}", project_id), e))
}

async fn generate(
    state: &AppState,
    prompt: &str,
    target: &'static str,
    public_error: &str,
) -> Result<String, ApiError> {
    state.ai.generate_text(prompt).await.map_err(|e| {
        let status = StatusCode::BAD_GATEWAY;
        log_api_issue(status, target, format!("{}: {}", public_error, e));
        (
            status,
            Json(ErrorResponse {
                error: public_error.to_string(),
            }),
        )
    })
}

fn or_fallback(text: String, fallback: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// POST /ai/summarize -- whole project, or one column when `columnName` is set.
pub async fn summarize(
    State(state): State<AppState>,
    body: Result<Json<SummarizeBody>, JsonRejection>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let target = "flowboard.api.ai_summarize";
    let body = json_body(body, target)?;
    let project_id = body.project_id.trim();
    if project_id.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, target, "projectId is required"));
    }

    let full = load_project(&state, project_id, target)?;
    let column = body
        .column_name
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let text = match column {
        Some(column) => {
            if !full.project.has_column(column) {
                return Err(storage_error(
                    target,
                    format!("Summary for {}", project_id),
                    StorageError::ColumnNotFound(column.to_string()),
                ));
            }
            prompt::column_summary(&full.project, column, &full.tasks)
        }
        None => prompt::project_summary(&full.project, &full.tasks),
    };

    let summary = generate(&state, &text, target, "AI summarization failed").await?;
    Ok(Json(SummaryResponse {
        summary: or_fallback(summary, NO_SUMMARY),
    }))
}

/// POST /ai/ask -- answer a question from the project's tasks.
pub async fn ask(
    State(state): State<AppState>,
    body: Result<Json<AskBody>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let target = "flowboard.api.ai_ask";
    let body = json_body(body, target)?;
    let project_id = body.project_id.trim();
    let question = body.question.trim();
    if project_id.is_empty() || question.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            target,
            "projectId and question are required",
        ));
    }

    let full = load_project(&state, project_id, target)?;
    let text = prompt::ask(&full.project, &full.tasks, question);

    let answer = generate(&state, &text, target, "AI Q&A failed").await?;
    Ok(Json(AnswerResponse {
        answer: or_fallback(answer, NO_ANSWER),
    }))
}
