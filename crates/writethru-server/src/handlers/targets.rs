//! Backend target attachment.

use axum::extract::State;
use axum::Json;

use crate::error::ApiError;
use crate::schema::targets::{AttachTargetRequest, AttachTargetResponse};
use crate::state::AppState;

/// `POST /targets`
///
/// Binds a new target to the store. Replication to it starts after the
/// next `POST /proxy/init`.
pub async fn attach_target(
    State(state): State<AppState>,
    Json(req): Json<AttachTargetRequest>,
) -> Result<Json<AttachTargetResponse>, ApiError> {
    let config = req.into_config().map_err(ApiError::BadRequest)?;
    let name = config.name().to_string();

    tokio::task::spawn_blocking(move || state.attach_target(&config))
        .await
        .map_err(|err| ApiError::InternalError(format!("attach task failed: {}", err)))??;

    Ok(Json(AttachTargetResponse {
        success: true,
        name,
        registered: false,
    }))
}
