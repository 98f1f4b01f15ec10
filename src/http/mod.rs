use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::memory::ResourceManager;

#[derive(Clone)]
pub struct AppState {
    manager: Arc<ResourceManager>,
}

/// Health and memory endpoints for a host server
pub fn router(manager: Arc<ResourceManager>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/memory/stats", get(memory_stats))
        .route("/memory/report", post(generate_report))
        .route("/memory/optimize", post(optimize))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { manager })
}

/// Serve the router until `shutdown` resolves
pub async fn serve<F>(manager: Arc<ResourceManager>, port: u16, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Memory endpoints listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router(manager))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.manager.get_memory_stats();
    let threshold = state.manager.config().gc_threshold_ratio;

    let memory_status = match stats.utilization {
        Some(u) if u > threshold => "pressure",
        Some(_) => "healthy",
        None => "unknown",
    };

    Json(json!({
        "status": if memory_status == "pressure" { "degraded" } else { "ok" },
        "server": "kg-memory-manager",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "sampling": stats.running,
        "memory": {
            "status": memory_status,
            "utilization": stats.utilization,
            "rss": stats.snapshot.rss,
            "heap_used": stats.snapshot.heap_used,
        }
    }))
}

async fn memory_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.get_memory_stats())
}

async fn generate_report(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.manager.generate_report().await;
    (StatusCode::CREATED, Json(report))
}

async fn optimize(State(state): State<AppState>) -> impl IntoResponse {
    let runs = state.manager.optimize().await;
    if runs.is_empty() {
        // Another pass holds the guard
        return (
            StatusCode::CONFLICT,
            Json(json!({ "status": "skipped", "reason": "optimization already in progress" })),
        );
    }
    (StatusCode::OK, Json(json!({ "status": "completed", "runs": runs })))
}
