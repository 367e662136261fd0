//! Axum route handlers for the Scoring API.
//!
//! The boundary validates inputs and hands off to the task manager; all
//! scoring happens in the background. Clients poll the task id they get
//! back. Sorting and top-N truncation of results are deliberately left to
//! the consumer.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::candidate::Candidate;
use crate::provider::ModelProvider;
use crate::state::AppState;
use crate::tasks::store::{Task, TaskStatus};
use crate::tasks::ScoringJob;

/// Hard cap on the job description. Enforced here, assumed by the core.
pub const MAX_JOB_DESCRIPTION_CHARS: usize = 200;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub job_description: String,
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub model_provider: ModelProvider,
}

#[derive(Debug, Serialize)]
pub struct ScoreAcceptedResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/score
///
/// Accepts a scoring request and returns a task id immediately.
/// Poll GET /api/v1/score/:task_id for progress and the final result.
pub async fn handle_create_scoring_task(
    State(state): State<AppState>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<ScoreAcceptedResponse>, AppError> {
    validate_score_request(&request)?;

    let task_id = state.tasks.create(ScoringJob {
        job_description: request.job_description.trim().to_string(),
        candidates: request.candidates,
        provider: request.model_provider,
    });

    Ok(Json(ScoreAcceptedResponse {
        task_id,
        status: TaskStatus::Pending,
    }))
}

/// GET /api/v1/score/:task_id
///
/// Returns the current task snapshot. A completed task carries the scoring
/// result; a failed one carries the failure detail.
pub async fn handle_get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Task>, AppError> {
    state.tasks.get(task_id).map(Json)
}

/// DELETE /api/v1/score/:task_id
///
/// Removes the task record. In-flight provider calls are not interrupted;
/// their results are discarded.
pub async fn handle_delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.tasks.delete(task_id)?;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_score_request(request: &ScoreRequest) -> Result<(), AppError> {
    let description = request.job_description.trim();
    if description.is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }
    if description.chars().count() > MAX_JOB_DESCRIPTION_CHARS {
        return Err(AppError::Validation(format!(
            "job_description exceeds {MAX_JOB_DESCRIPTION_CHARS} characters"
        )));
    }
    if request.candidates.is_empty() {
        // The upstream loader returns an empty list on any load failure;
        // treat that as a failed precondition, not a scorable request.
        return Err(AppError::Validation(
            "candidates cannot be empty".to_string(),
        ));
    }
    Ok(())
}
