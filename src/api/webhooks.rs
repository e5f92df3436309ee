/// Inbound webhook endpoint
///
/// `POST /webhook/{webhookId}` enqueues a run of the workflow the identifier
/// was registered for, with the JSON body as input.

use crate::api::{ApiError, ApiResult, AppState};
use crate::api::workflows::JobAccepted;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde_json::{json, Value};

pub fn create_webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook/{webhook_id}", post(receive_webhook))
}

/// POST /webhook/{webhook_id}
/// Body: any JSON value; an empty body counts as `{}`
async fn receive_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<String>,
    body: String,
) -> Response {
    tracing::info!("📥 Webhook request received: {}", webhook_id);

    let payload = match parse_payload(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("❌ Invalid JSON payload for webhook {}: {}", webhook_id, e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Invalid JSON payload: {e}") })),
            )
                .into_response();
        }
    };

    match enqueue(&state, &webhook_id, payload).await {
        Ok(accepted) => (StatusCode::ACCEPTED, Json(accepted)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn enqueue(state: &AppState, webhook_id: &str, payload: Value) -> ApiResult<JobAccepted> {
    let job_id = state
        .engine
        .trigger_webhook(webhook_id, payload)
        .await
        .map_err(ApiError)?;
    Ok(JobAccepted { job_id })
}

fn parse_payload(body: &str) -> Result<Value, serde_json::Error> {
    if body.trim().is_empty() {
        Ok(json!({}))
    } else {
        serde_json::from_str(body)
    }
}
