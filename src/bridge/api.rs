use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::classify::ErrorClass;
use super::db::DbHandle;
use super::models::{NewIssue, StepNote, is_valid_tracker_id};
use super::reconcile::{JobState, ReconcileRegistry};
use super::tracker::{IssueTracker, TicketRequest};
use crate::config::BridgeConfig;
use crate::errors::BridgeError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub tracker: Arc<dyn IssueTracker>,
    pub jobs: ReconcileRegistry,
    pub config: BridgeConfig,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueRequest {
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub content: String,
    pub reporter_name: Option<String>,
    pub tenant_id: Option<String>,
    pub vpc_id: Option<String>,
    pub region_id: Option<String>,
    pub name: Option<String>,
    pub service: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIssueRequest {
    pub id: i64,
    pub reporter_name: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateErrorRequest {
    pub error_code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub service: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatus {
    pub job: String,
    pub state: JobState,
}

// ── Error handling ────────────────────────────────────────────────────

const INVALID_PAYLOAD: &str = "Invalid request payload";

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    BadGateway,
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadGateway => (
                StatusCode::BAD_GATEWAY,
                "Issue tracker request failed".to_string(),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::IssueNotFound { .. } | BridgeError::IssueRowNotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            BridgeError::DuplicateTrackerId { .. } => ApiError::Conflict(err.to_string()),
            BridgeError::BadRequest(msg) => ApiError::BadRequest(msg),
            BridgeError::Tracker(e) => {
                warn!(error = %e, "issue tracker call failed");
                ApiError::BadGateway
            }
            BridgeError::Database(e) => {
                error!(error = %e, "storage operation failed");
                ApiError::Internal
            }
        }
    }
}

fn storage(err: anyhow::Error) -> ApiError {
    BridgeError::Database(err).into()
}

/// Unwrap a JSON body, turning any decode failure into the generic 400.
fn payload<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!(error = %rejection, "rejected request body");
            Err(ApiError::BadRequest(INVALID_PAYLOAD.into()))
        }
    }
}

fn check_tracker_id(id: &str) -> Result<(), ApiError> {
    if is_valid_tracker_id(id) {
        Ok(())
    } else {
        Err(BridgeError::BadRequest(format!("Invalid issue id '{}'", id)).into())
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/issue", get(list_issues).post(create_issue))
        .route("/issue/jira", post(submit_issue))
        .route("/issue/status/{id}", get(get_issue_status))
        .route(
            "/issue/{id}",
            get(get_issue).patch(update_status).delete(delete_issue),
        )
        .route("/error", get(list_errors).post(create_error))
        .route("/job/{id}", get(start_job).delete(stop_job))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn create_issue(
    State(state): State<SharedState>,
    body: Result<Json<CreateIssueRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = payload(body)?;
    let class = ErrorClass::classify(&req.error_code);
    let code = req.error_code.clone();
    let catalog = state
        .db
        .call(move |db| db.get_error_by_code(&code))
        .await
        .map_err(storage)?;

    let config = &state.config;
    let reporter = req
        .reporter_name
        .clone()
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| config.step_log.reporter_name.clone());
    let ticket = TicketRequest {
        project_id: class.project_id().to_string(),
        issue_type: config.tracker.issue_type.clone(),
        assignee: config.tracker.assignee.clone(),
        reporter: reporter.clone(),
        content: req.content.clone(),
    };
    let tracker_id = submit_ticket(state.tracker.as_ref(), &ticket).await?;

    let defaults = &config.issue_defaults;
    let (catalog_name, catalog_service) = match catalog {
        Some(entry) => (
            Some(entry.name).filter(|n| !n.is_empty()),
            Some(entry.service).filter(|s| !s.is_empty()),
        ),
        None => (None, None),
    };
    let issue = NewIssue {
        tenant_id: req.tenant_id.unwrap_or_else(|| defaults.tenant_id.clone()),
        vpc_id: req.vpc_id.unwrap_or_else(|| defaults.vpc_id.clone()),
        region_id: req.region_id.unwrap_or_else(|| defaults.region_id.clone()),
        issue_jira_id: tracker_id.clone(),
        name: req
            .name
            .or(catalog_name)
            .unwrap_or_else(|| defaults.name.clone()),
        data_log: req.content.clone(),
        error_code: req.error_code,
        status: defaults.status.clone(),
        service: req
            .service
            .or(catalog_service)
            .unwrap_or_else(|| defaults.service.clone()),
    };
    let note = StepNote {
        reporter_name: reporter,
        supporter_name: config.step_log.supporter_name.clone(),
        description: req.content,
    };

    let created = state
        .db
        .call(move |db| db.create_issue(&issue, &note))
        .await
        .map_err(storage)?;
    match created {
        Some(issue) => {
            info!(tracker_id = %issue.issue_jira_id, class = %class, "issue created");
            Ok((StatusCode::CREATED, Json(issue)))
        }
        None => {
            warn!(
                tracker_id = %tracker_id,
                "tracker id already stored; the new ticket is orphaned in the tracker"
            );
            Err(BridgeError::DuplicateTrackerId { tracker_id }.into())
        }
    }
}

/// Create a tracker ticket and sanity-check the returned ID.
async fn submit_ticket(
    tracker: &dyn IssueTracker,
    ticket: &TicketRequest,
) -> Result<String, ApiError> {
    let tracker_id = tracker
        .create_ticket(ticket)
        .await
        .map_err(BridgeError::from)?;
    if !is_valid_tracker_id(&tracker_id) {
        warn!(tracker_id = %tracker_id, "tracker returned a malformed ticket id");
        return Err(ApiError::BadGateway);
    }
    Ok(tracker_id)
}

async fn submit_issue(
    State(state): State<SharedState>,
    body: Result<Json<SubmitIssueRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = payload(body)?;
    let id = req.id;
    let existing = state
        .db
        .call(move |db| db.get_issue(id))
        .await
        .map_err(storage)?
        .ok_or(BridgeError::IssueRowNotFound { id })?;

    let config = &state.config;
    let reporter = req
        .reporter_name
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| config.step_log.reporter_name.clone());
    let ticket = TicketRequest {
        project_id: ErrorClass::classify(&existing.error_code)
            .project_id()
            .to_string(),
        issue_type: config.tracker.issue_type.clone(),
        assignee: config.tracker.assignee.clone(),
        reporter: reporter.clone(),
        content: existing.data_log.clone(),
    };
    let tracker_id = submit_ticket(state.tracker.as_ref(), &ticket).await?;

    let note = StepNote {
        reporter_name: reporter,
        supporter_name: config.step_log.supporter_name.clone(),
        description: format!(
            "Resubmitted to tracker: {} -> {}",
            existing.issue_jira_id, tracker_id
        ),
    };
    let new_id = tracker_id.clone();
    let outcome = state
        .db
        .call(move |db| {
            if let Some(other) = db.get_issue_by_tracker_id(&new_id)? {
                if other.id != id {
                    return Ok(Err(BridgeError::DuplicateTrackerId {
                        tracker_id: new_id,
                    }));
                }
            }
            Ok(db
                .update_tracker_id(id, &new_id, &note)?
                .ok_or(BridgeError::IssueRowNotFound { id }))
        })
        .await
        .map_err(storage)?;
    let issue = outcome?;

    // A job keyed by the old ticket would only find its issue gone.
    if state.jobs.stop(&existing.issue_jira_id).await == JobState::Stopped {
        state.jobs.start(&tracker_id).await;
    }
    info!(id, tracker_id = %tracker_id, "issue resubmitted to tracker");
    Ok(Json(issue))
}

async fn get_issue_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_tracker_id(&id)?;
    let tracker_id = id.clone();
    let status = state
        .db
        .call(move |db| db.get_status(&tracker_id))
        .await
        .map_err(storage)?
        .ok_or(BridgeError::IssueNotFound { tracker_id: id })?;
    Ok(Json(status))
}

async fn list_issues(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let issues = state
        .db
        .call(move |db| db.list_issues())
        .await
        .map_err(storage)?;
    Ok(Json(issues))
}

async fn get_issue(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_tracker_id(&id)?;
    let tracker_id = id.clone();
    let detail = state
        .db
        .call(move |db| db.get_issue_with_logs(&tracker_id))
        .await
        .map_err(storage)?
        .ok_or(BridgeError::IssueNotFound { tracker_id: id })?;
    Ok(Json(detail))
}

async fn update_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    check_tracker_id(&id)?;
    let req = payload(body)?;
    let status = req.status.trim().to_string();
    if status.is_empty() {
        return Err(BridgeError::BadRequest("status must not be empty".into()).into());
    }

    let note = StepNote {
        reporter_name: state.config.step_log.reporter_name.clone(),
        supporter_name: state.config.step_log.supporter_name.clone(),
        description: format!("Status set to {}", status),
    };
    let tracker_id = id.clone();
    let issue = state
        .db
        .call(move |db| db.set_status(&tracker_id, &status, &note))
        .await
        .map_err(storage)?
        .ok_or(BridgeError::IssueNotFound { tracker_id: id })?;
    Ok(Json(issue))
}

async fn delete_issue(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_tracker_id(&id)?;
    let tracker_id = id.clone();
    let deleted = state
        .db
        .call(move |db| db.delete_issue(&tracker_id))
        .await
        .map_err(storage)?;
    if !deleted {
        return Err(BridgeError::IssueNotFound { tracker_id: id }.into());
    }
    state.jobs.stop(&id).await;
    info!(tracker_id = %id, "issue deleted");
    Ok(Json(serde_json::json!({"delete": "success"})))
}

async fn create_error(
    State(state): State<SharedState>,
    body: Result<Json<CreateErrorRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = payload(body)?;
    if req.error_code.trim().is_empty() {
        return Err(BridgeError::BadRequest("errorCode must not be empty".into()).into());
    }
    let entry = state
        .db
        .call(move |db| {
            db.create_error(&req.error_code, &req.name, &req.description, &req.service)
        })
        .await
        .map_err(storage)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_errors(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .db
        .call(move |db| db.list_errors())
        .await
        .map_err(storage)?;
    Ok(Json(entries))
}

async fn start_job(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_tracker_id(&id)?;
    let tracker_id = id.clone();
    let exists = state
        .db
        .call(move |db| db.get_status(&tracker_id))
        .await
        .map_err(storage)?
        .is_some();
    if !exists {
        return Err(BridgeError::IssueNotFound { tracker_id: id }.into());
    }

    let job_state = state.jobs.start(&id).await;
    Ok((
        StatusCode::ACCEPTED,
        Json(JobStatus {
            job: id,
            state: job_state,
        }),
    ))
}

async fn stop_job(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_tracker_id(&id)?;
    let job_state = state.jobs.stop(&id).await;
    Ok(Json(JobStatus {
        job: id,
        state: job_state,
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────
