//! HTTP server for mindd

use crate::config::Config;
use crate::routes;
use anyhow::{Context, Result};
use axum::Router;
use mind_common::ProgressService;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub service: ProgressService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: ProgressService) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}

/// Assemble every route group with the standard layers
pub fn router(state: AppState, request_timeout: Duration, max_body_bytes: usize) -> Router {
    let state = Arc::new(state);

    Router::new()
        .merge(routes::progress_routes())
        .merge(routes::energy_routes())
        .merge(routes::store_routes())
        .merge(routes::learner_routes())
        .merge(routes::lesson_routes())
        .merge(routes::account_routes())
        .merge(routes::support_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until Ctrl-C
pub async fn run(state: AppState, config: &Config) -> Result<()> {
    let app = router(state, config.request_timeout(), config.server.max_body_bytes);

    let addr = config.server.listen.as_str();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("  Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down gracefully");
        })
        .await?;
    Ok(())
}
