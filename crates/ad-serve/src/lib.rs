pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod sse;

use ad_core::JobManager;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub jobs: JobManager,
}

impl AppState {
    pub fn new(jobs: JobManager) -> Self {
        Self { jobs }
    }
}

pub fn app(state: AppState) -> Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves until `shutdown` resolves, then drains in-flight requests.
pub async fn serve<F>(state: AppState, addr: SocketAddr, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await
}
