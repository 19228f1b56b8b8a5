use crate::routes::error::ErrorEnvelope;
use crate::routes::jobs::{GenerateChangelogInput, JobAccepted};
use ad_core::types::{Job, JobId, JobStatus, LogLine};
use ad_events::{JobEvent, JobEventKind};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "autodoc", description = "Engineering changelog generation jobs"),
    paths(
        crate::routes::jobs::generate_changelog,
        crate::routes::jobs::get_status,
        crate::routes::jobs::job_events
    ),
    components(schemas(
        GenerateChangelogInput,
        JobAccepted,
        ErrorEnvelope,
        Job,
        JobId,
        JobStatus,
        LogLine,
        JobEvent,
        JobEventKind
    ))
)]
struct ApiDoc;

pub fn generate_spec() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .unwrap_or_else(|_| "{}".to_string())
}

pub fn router() -> Router {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
