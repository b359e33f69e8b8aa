// HTTP routes: health, metrics, latest scoreboard as JSON, and the rendered
// web root as static files.

use std::path::PathBuf;

use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::metrics;
use crate::render::Scoreboard;

#[derive(Clone)]
pub struct AppState {
    pub scoreboard: watch::Receiver<Scoreboard>,
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "propane" }))
}

async fn get_scores(State(state): State<AppState>) -> impl IntoResponse {
    let scoreboard = state.scoreboard.borrow().clone();
    Json(scoreboard)
}

async fn get_metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(scoreboard: watch::Receiver<Scoreboard>, outdir: PathBuf) -> Router {
    let state = AppState { scoreboard };

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .route("/api/scores", get(get_scores))
        .with_state(state)
        .fallback_service(ServeDir::new(outdir))
        .layer(CorsLayer::permissive())
}

/// Serve `router` on `listener` until `shutdown` flips to true.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}
