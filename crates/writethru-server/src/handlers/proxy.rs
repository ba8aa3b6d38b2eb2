//! Proxy lifecycle handlers: init, registry listing, status, config.

use axum::extract::State;
use axum::Json;

use crate::error::ApiError;
use crate::proxy::Proxy;
use crate::schema::proxy::{
    ConfigRequest, ConfigResponse, StatusResponse, TargetView, TargetsResponse,
};
use crate::state::AppState;

fn registry_view(state: &AppState) -> TargetsResponse {
    let targets = state
        .proxy
        .registry()
        .snapshot()
        .iter()
        .map(|registered| TargetView {
            node: registered.node.to_hex(),
            target: registered.target.describe(),
            connected: registered.target.connected(),
        })
        .collect();
    TargetsResponse { targets }
}

/// `POST /proxy/init`
pub async fn init(State(state): State<AppState>) -> Result<Json<TargetsResponse>, ApiError> {
    let proxy = state.proxy.clone();
    tokio::task::spawn_blocking(move || proxy.init())
        .await
        .map_err(|err| ApiError::InternalError(format!("init task failed: {}", err)))?;
    Ok(Json(registry_view(&state)))
}

/// `GET /proxy/targets`
pub async fn targets(State(state): State<AppState>) -> Result<Json<TargetsResponse>, ApiError> {
    Ok(Json(registry_view(&state)))
}

/// `GET /proxy/status`
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let read_only = state.store.read().unwrap().is_read_only();
    Ok(Json(StatusResponse {
        read_only,
        registered_targets: state.proxy.registry().len(),
        annotation_key: state.proxy.annotation_key().map(|key| key.to_hex()),
        stats: state.proxy.stats(),
        sessions: state.sessions.len(),
    }))
}

/// `POST /proxy/config`
pub async fn config(
    State(state): State<AppState>,
    Json(req): Json<ConfigRequest>,
) -> Result<Json<ConfigResponse>, ApiError> {
    Ok(Json(ConfigResponse {
        accepted: state.proxy.config(&req.text),
    }))
}
