//! HTTP/SSE endpoint layer
//!
//! JSON API under `/api`, with the browser client served from the static
//! directory for every other path.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use eyre::{Context, Result};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::advisor::Advisor;

mod dto;
mod error;
mod handlers;

pub use error::ApiError;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub advisor: Arc<Advisor>,
}

/// Build the application router
///
/// Static assets are only mounted when `static_dir` exists.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    debug!(?static_dir, "router: called");
    let api = Router::new()
        .route("/api/session/start", post(handlers::start_session))
        .route(
            "/api/session/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/api/recommend/stream", post(handlers::recommend_stream))
        .route("/api/analyze/feedback", post(handlers::analyze_feedback))
        .route("/api/export/{session_id}", get(handlers::export_session));

    let app = if static_dir.is_dir() {
        debug!("router: serving static assets");
        api.fallback_service(ServeDir::new(static_dir))
    } else {
        warn!("Static directory {} not found, browser client disabled", static_dir.display());
        api
    };

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(state: AppState, bind: &str, static_dir: &Path) -> Result<()> {
    let app = router(state, static_dir);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .context(format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
