//! Session lifecycle and command evaluation handlers.

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::schema::sessions::{
    EvalRequest, EvalResponse, ListSessionsResponse, OpenSessionResponse,
};
use crate::session::SessionId;
use crate::state::AppState;

fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    Uuid::parse_str(raw).map(SessionId).map_err(|_| {
        ApiError::BadRequest(format!("invalid session id '{}': expected UUID", raw))
    })
}

/// `POST /sessions`
pub async fn open_session(
    State(state): State<AppState>,
) -> Result<Json<OpenSessionResponse>, ApiError> {
    let (id, handlers) = state.open_session();
    Ok(Json(OpenSessionResponse {
        session_id: id.0,
        handlers,
    }))
}

/// `GET /sessions`
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<ListSessionsResponse>, ApiError> {
    let mut sessions: Vec<Uuid> = state.sessions.ids().into_iter().map(|id| id.0).collect();
    sessions.sort();
    Ok(Json(ListSessionsResponse { sessions }))
}

/// `DELETE /sessions/{session_id}`
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_session_id(&session_id)?;
    if !state.sessions.close(&id) {
        return Err(ApiError::NotFound(format!("session {} not found", id)));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

/// `POST /sessions/{session_id}/eval`
///
/// Replication talks to backends synchronously, so evaluation runs on the
/// blocking pool. Commands on one session are serialized by its evaluator
/// lock.
pub async fn eval(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<EvalRequest>,
) -> Result<Json<EvalResponse>, ApiError> {
    let id = parse_session_id(&session_id)?;
    let evaluator = state
        .sessions
        .evaluator(&id)
        .ok_or_else(|| ApiError::NotFound(format!("session {} not found", id)))?;

    let reply = tokio::task::spawn_blocking(move || {
        let session = evaluator.lock().unwrap();
        let reply = session.eval(&req.command, &req.arg);
        reply
    })
    .await
    .map_err(|err| ApiError::InternalError(format!("evaluation task failed: {}", err)))??;

    Ok(Json(EvalResponse { reply }))
}
