use crate::AppState;
use crate::middleware::correlation::CorrelationId;
use crate::routes::error::{ErrorEnvelope, error_response, map_error};
use crate::sse;
use ad_core::types::{Job, JobId};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateChangelogInput {
    #[serde(default)]
    pub epic_key: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: JobId,
    pub message: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/generate-changelog", post(generate_changelog))
        .route("/status/{job_id}", get(get_status))
        .route("/status/{job_id}/events", get(job_events))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/generate-changelog",
    request_body = GenerateChangelogInput,
    responses(
        (status = 202, body = JobAccepted),
        (status = 400, body = ErrorEnvelope)
    )
)]
pub(crate) async fn generate_changelog(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    body: Bytes,
) -> Response {
    let input = if body.is_empty() {
        GenerateChangelogInput::default()
    } else {
        match serde_json::from_slice::<GenerateChangelogInput>(&body) {
            Ok(input) => input,
            Err(err) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "invalid_input",
                    format!("invalid request body: {err}"),
                    Some(correlation.0),
                )
                .into_response();
            }
        }
    };

    let epic_key = input.epic_key.unwrap_or_default();
    match state.jobs.submit(&epic_key) {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            Json(JobAccepted {
                job_id,
                message: "Process started".to_string(),
            }),
        )
            .into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/status/{job_id}",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, body = Job),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn get_status(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(job_id): Path<String>,
) -> Response {
    match state.jobs.get_status(&job_id) {
        Ok(job) => Json(job).into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/status/{job_id}/events",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Server-sent stream: one `snapshot` event with the job, then `log` and `status` events until the job finishes", content_type = "text/event-stream"),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn job_events(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(job_id): Path<String>,
) -> Response {
    match sse::job_stream(&state.jobs, &job_id) {
        Ok(response) => response,
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}
