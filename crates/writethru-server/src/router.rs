//! Router assembly for the writethru HTTP API.
//!
//! [`build_router`] wires all handler functions to their routes with
//! CORS and tracing middleware layers.

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router with all API routes.
///
/// Routes use axum 0.8 `/{param}` path syntax.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Sessions
        .route(
            "/sessions",
            get(handlers::sessions::list_sessions).post(handlers::sessions::open_session),
        )
        .route(
            "/sessions/{session_id}",
            delete(handlers::sessions::close_session),
        )
        .route(
            "/sessions/{session_id}/eval",
            post(handlers::sessions::eval),
        )
        // Proxy lifecycle
        .route("/proxy/init", post(handlers::proxy::init))
        .route("/proxy/targets", get(handlers::proxy::targets))
        .route("/proxy/status", get(handlers::proxy::status))
        .route("/proxy/config", post(handlers::proxy::config))
        // Backend targets
        .route("/targets", post(handlers::targets::attach_target))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
