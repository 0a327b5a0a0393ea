//! Router assembly: HTTP endpoints, sketch WebSocket, static files, CORS, and HTTP tracing.

use std::{path::Path, sync::Arc};

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - sketch WebSocket at `/ws/sketch?client_id=...`
/// - REST-ish API under `/api/v1/...`
/// - static frontend from `static_dir` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = Path::new(&state.config.static_dir);
    let static_service = ServeDir::new(static_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route("/ws/sketch", get(ws::ws_upgrade))
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/clients", post(http::http_create_client))
        // Reference data
        .route("/api/v1/classes", get(http::http_get_classes))
        .route("/api/v1/reference", get(http::http_get_reference))
        .route("/api/v1/syllabus/search", get(http::http_search_syllabus))
        .route("/api/v1/textbooks/search", get(http::http_search_textbooks))
        // Student viewer and coverage
        .route("/api/v1/plans/:class_id", get(http::http_get_plan_view))
        .route("/api/v1/plans/:class_id/current_week", get(http::http_get_current_week))
        .route("/api/v1/plans/:class_id/coverage", get(http::http_get_coverage))
        .route("/api/v1/plans/:class_id/download", get(http::http_download_plan))
        // Editor sessions
        .route("/api/v1/sessions", post(http::http_create_session))
        .route(
            "/api/v1/sessions/:sid",
            get(http::http_get_session).delete(http::http_close_session),
        )
        .route("/api/v1/sessions/:sid/load", post(http::http_load_session))
        .route("/api/v1/sessions/:sid/select", post(http::http_select))
        .route("/api/v1/sessions/:sid/toggle", post(http::http_toggle))
        .route("/api/v1/sessions/:sid/weeks", post(http::http_add_week))
        .route("/api/v1/sessions/:sid/lessons", post(http::http_add_lesson))
        .route(
            "/api/v1/sessions/:sid/lesson",
            put(http::http_edit_lesson).delete(http::http_delete_lesson),
        )
        .route("/api/v1/sessions/:sid/lesson/attach", post(http::http_attach_ref))
        .route("/api/v1/sessions/:sid/lesson/detach", post(http::http_detach_ref))
        .route("/api/v1/sessions/:sid/lesson/move", post(http::http_move_lesson))
        .route("/api/v1/sessions/:sid/week/start_date", put(http::http_set_start_date))
        .route("/api/v1/sessions/:sid/download", get(http::http_download_session))
        .route("/api/v1/sessions/:sid/commit", post(http::http_commit_session))
        // GitHub settings
        .route(
            "/api/v1/github/settings",
            get(http::http_get_github_settings).put(http::http_put_github_settings),
        )
        // Student annotations
        .route("/api/v1/annotations", get(http::http_get_annotations))
        .route("/api/v1/annotations/notes", put(http::http_put_notes))
        .route("/api/v1/annotations/sketch", axum::routing::delete(http::http_clear_sketch))
        // State + CORS + HTTP tracing
        .with_state(state.clone())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
