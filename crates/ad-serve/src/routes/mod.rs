pub mod error;
pub mod jobs;

use crate::middleware::correlation::correlation_middleware;
use crate::{AppState, openapi};
use axum::Router;
use axum::middleware;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(jobs::router(state))
        .merge(openapi::router());

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn(correlation_middleware))
}
