use ad_core::error::JobError;
use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: String,
    pub code: &'static str,
    pub correlation_id: Option<String>,
}

pub fn error_response(
    status: StatusCode,
    code: &'static str,
    error: String,
    correlation_id: Option<String>,
) -> (StatusCode, Json<ErrorEnvelope>) {
    (
        status,
        Json(ErrorEnvelope {
            error,
            code,
            correlation_id,
        }),
    )
}

pub fn map_error(err: &JobError, correlation_id: Option<String>) -> (StatusCode, Json<ErrorEnvelope>) {
    let (status, code) = match err {
        JobError::MissingEpicKey => (StatusCode::BAD_REQUEST, "invalid_input"),
        JobError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        JobError::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    };
    error_response(status, code, err.to_string(), correlation_id)
}
