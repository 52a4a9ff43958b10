use super::state::{AppState, Completed, InterviewEntry};
use crate::persist::SaveStatus;
use crate::report::InterviewLog;
use crate::session::{InterviewResult, JobRole, Language, SessionConfig};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartInterviewRequest {
    pub name: String,
    pub role: JobRole,
    pub language: Language,
}

#[derive(Debug, Serialize)]
pub struct StartInterviewResponse {
    pub interview_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct TerminateResponse {
    pub interview_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub interview_id: Uuid,
    pub candidate: String,
    pub role: String,
    pub status: String,
    pub result: InterviewResult,
    pub save_status: SaveStatus,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

async fn find(state: &AppState, id: Uuid) -> Result<Arc<InterviewEntry>, Response> {
    let interviews = state.interviews.read().await;
    interviews
        .get(&id)
        .cloned()
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, format!("Interview {} not found", id)))
}

/// Finished interview result, or the response explaining why there is none yet
fn finished_result(id: Uuid, entry: &InterviewEntry) -> Result<(InterviewResult, Completed), Response> {
    let Some(completed) = entry.completed() else {
        return Err(error_response(
            StatusCode::CONFLICT,
            format!("Interview {} is still running", id),
        ));
    };

    match &completed.outcome {
        Ok(result) => Ok((result.clone(), completed)),
        Err(e) => Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /interviews
/// Start a new interview session
pub async fn start_interview(
    State(state): State<AppState>,
    Json(req): Json<StartInterviewRequest>,
) -> impl IntoResponse {
    let config = match SessionConfig::new(req.name, req.role, req.language) {
        Ok(config) => config,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let handle = match state.launcher.launch(config.clone()) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start interview: {:#}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to start interview: {}", e),
            );
        }
    };

    let interview_id = Uuid::new_v4();
    state.track(interview_id, config, handle).await;

    info!("Interview {} started", interview_id);

    (
        StatusCode::OK,
        Json(StartInterviewResponse {
            interview_id,
            status: "started".to_string(),
        }),
    )
        .into_response()
}

/// POST /interviews/:interview_id/terminate
/// Request user termination
pub async fn terminate_interview(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
) -> impl IntoResponse {
    let entry = match find(&state, interview_id).await {
        Ok(entry) => entry,
        Err(response) => return response,
    };

    if entry.completed().is_some() || !entry.control.terminate() {
        return error_response(
            StatusCode::CONFLICT,
            format!("Interview {} has already finished", interview_id),
        );
    }

    info!("Termination requested for interview {}", interview_id);

    (
        StatusCode::ACCEPTED,
        Json(TerminateResponse {
            interview_id,
            status: "terminating".to_string(),
        }),
    )
        .into_response()
}

/// GET /interviews/:interview_id/status
/// Live session snapshot
pub async fn get_interview_status(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
) -> impl IntoResponse {
    match find(&state, interview_id).await {
        Ok(entry) => (StatusCode::OK, Json(entry.control.snapshot())).into_response(),
        Err(response) => response,
    }
}

/// GET /interviews/:interview_id/result
/// Final result once the interview has finished
pub async fn get_interview_result(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
) -> impl IntoResponse {
    let entry = match find(&state, interview_id).await {
        Ok(entry) => entry,
        Err(response) => return response,
    };

    match finished_result(interview_id, &entry) {
        Ok((result, _)) => (
            StatusCode::OK,
            Json(ResultResponse {
                interview_id,
                candidate: entry.config.candidate_name.clone(),
                role: entry.config.role.title().to_string(),
                status: result.status_label().to_string(),
                result,
                save_status: entry.save_status(),
            }),
        )
            .into_response(),
        Err(response) => response,
    }
}

/// GET /interviews/:interview_id/log
/// Plain-text interview log
pub async fn get_interview_log(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
) -> impl IntoResponse {
    let entry = match find(&state, interview_id).await {
        Ok(entry) => entry,
        Err(response) => return response,
    };

    let (result, completed) = match finished_result(interview_id, &entry) {
        Ok(finished) => finished,
        Err(response) => return response,
    };

    if result.transcript.is_empty() {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Interview {} has no transcript", interview_id),
        );
    }

    let log = InterviewLog::new(&entry.config, &result, &state.recruiter, completed.at);
    let disposition = format!("attachment; filename=\"{}\"", log.file_name());

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        log.to_string(),
    )
        .into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
