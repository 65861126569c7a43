//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/` except `/health`.
//! Middleware: CORS, request tracing.

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Relay
        .route(
            "/threads/{id}/messages",
            post(handlers::chat::send_message).get(handlers::transcript::list_messages),
        )
        .route("/threads/{id}/stream", get(handlers::stream::stream_thread))
        .route("/threads/{id}/ws", get(handlers::ws::ws_thread))
        // Transcript
        .route("/threads", get(handlers::transcript::list_threads))
        .route(
            "/threads/{id}",
            get(handlers::transcript::get_thread).delete(handlers::transcript::delete_thread),
        )
        .route("/messages/{id}", get(handlers::transcript::get_message))
        .route("/usage", get(handlers::transcript::usage))
        // Stats
        .route("/relay/stats", get(handlers::stats::relay_stats));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct HealthQuery {
    #[serde(default)]
    deep: bool,
}

/// GET /health - Liveness; with `?deep=true` also probes the database and providers.
async fn health_check(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
) -> (StatusCode, axum::Json<serde_json::Value>) {
    let mut body = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": state.pump.registry().active_sessions(),
    });
    if !query.deep {
        return (StatusCode::OK, axum::Json(body));
    }

    let report = state.health_report().await;
    let status = if report.healthy() {
        StatusCode::OK
    } else {
        body["status"] = "degraded".into();
        StatusCode::SERVICE_UNAVAILABLE
    };
    body["checks"] = serde_json::to_value(&report).unwrap_or_default();
    (status, axum::Json(body))
}
