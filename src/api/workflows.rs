/// Workflow, job and queue REST endpoints
///
/// Thin handlers over `WorkflowEngine`: every engine error is turned into an
/// HTTP status by `ApiError`.

use crate::api::{ApiResult, AppState};
use crate::queue::{JobStatus, QueueStats};
use crate::workflow::{ExecutionLogEntry, WorkflowDefinition};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Default number of log entries returned by the logs endpoint
const DEFAULT_LOG_LIMIT: u32 = 50;

/// Body for `PUT /api/workflows/{id}`; the path supplies the id
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveWorkflowRequest {
    pub project_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub language: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunWorkflowRequest {
    pub project_id: String,
    #[serde(default)]
    pub input: Option<Value>,
    /// Hold the job as `delayed` for this long before it can run
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub project_id: String,
    pub cron: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebhookRequest {
    pub project_id: String,
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookCreated {
    pub webhook_id: String,
}

pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows/{id}", put(save_workflow))
        .route("/api/workflows/{id}", get(get_workflow))
        .route("/api/workflows/{id}/run", post(run_workflow))
        .route("/api/workflows/{id}/schedule", post(schedule_workflow))
        .route("/api/workflows/{id}/webhooks", post(create_webhook))
        .route("/api/workflows/{id}/triggers", delete(stop_triggers))
        .route("/api/workflows/{id}/logs", get(list_logs))
        .route("/api/jobs/{id}", get(get_job_status))
        .route("/api/queues/stats", get(get_queue_stats))
}

/// PUT /api/workflows/{id}
/// Body: { "projectId": "...", "name": "...", "type": "javascript", "code": "return input;" }
async fn save_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SaveWorkflowRequest>,
) -> ApiResult<Json<WorkflowDefinition>> {
    let workflow = WorkflowDefinition {
        id,
        project_id: payload.project_id,
        name: payload.name,
        language: payload.language,
        code: payload.code,
    };
    state.engine.save_workflow(&workflow).await?;
    Ok(Json(workflow))
}

/// GET /api/workflows/{id}
async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WorkflowDefinition>> {
    Ok(Json(state.engine.get_workflow(&id).await?))
}

/// POST /api/workflows/{id}/run
/// Body: { "projectId": "...", "input": {...}, "delayMs": 0 }
async fn run_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<RunWorkflowRequest>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let job_id = match payload.delay_ms {
        Some(ms) if ms > 0 => {
            state
                .engine
                .run_workflow_delayed(&id, &payload.project_id, payload.input, Duration::from_millis(ms))
                .await?
        }
        _ => {
            state
                .engine
                .run_workflow(&id, &payload.project_id, payload.input)
                .await?
        }
    };
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id })))
}

/// POST /api/workflows/{id}/schedule
/// Body: { "projectId": "...", "cron": "*/5 * * * *" }
async fn schedule_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ScheduleRequest>,
) -> ApiResult<Json<Value>> {
    state
        .engine
        .schedule_workflow(&id, &payload.project_id, &payload.cron)
        .await?;
    Ok(Json(json!({ "workflowId": id, "cron": payload.cron })))
}

/// POST /api/workflows/{id}/webhooks
/// Body: { "projectId": "...", "path": "/orders" }
async fn create_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CreateWebhookRequest>,
) -> ApiResult<(StatusCode, Json<WebhookCreated>)> {
    let webhook_id = state
        .engine
        .create_webhook_trigger(&id, &payload.project_id, &payload.path)
        .await?;
    Ok((StatusCode::CREATED, Json(WebhookCreated { webhook_id })))
}

/// DELETE /api/workflows/{id}/triggers
async fn stop_triggers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine.stop_workflow_trigger(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/workflows/{id}/logs?limit=20
async fn list_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<Vec<ExecutionLogEntry>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    Ok(Json(state.engine.list_execution_logs(&id, limit).await?))
}

/// GET /api/jobs/{id}
async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobStatus>> {
    Ok(Json(state.engine.get_workflow_status(&id).await?))
}

/// GET /api/queues/stats
async fn get_queue_stats(State(state): State<AppState>) -> ApiResult<Json<QueueStats>> {
    Ok(Json(state.engine.get_queue_stats().await?))
}
