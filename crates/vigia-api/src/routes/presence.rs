use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use vigia_core::presence::PresenceRegistry;
use vigia_core::AppState;
use vigia_models::PresenceEntry;

use crate::error::ApiError;

#[derive(Deserialize)]
pub struct AnnounceRequest {
    pub session_id: String,
    pub display_name: String,
    pub neighborhood: String,
}

#[derive(Deserialize)]
pub struct WithdrawRequest {
    pub session_id: String,
}

pub async fn roster(
    State(state): State<AppState>,
) -> Result<Json<Vec<PresenceEntry>>, ApiError> {
    let registry = PresenceRegistry::new(state.db.clone(), state.event_bus.clone());
    Ok(Json(registry.list().await?))
}

/// Heartbeat path for clients that are not on the gateway. Idempotent
/// upsert keyed by the caller's session id.
pub async fn announce(
    State(state): State<AppState>,
    Json(body): Json<AnnounceRequest>,
) -> Result<Json<PresenceEntry>, ApiError> {
    if body.session_id.trim().is_empty() {
        return Err(ApiError::BadRequest("session_id must not be empty".into()));
    }
    let registry = PresenceRegistry::new(state.db.clone(), state.event_bus.clone());
    let entry = registry
        .announce(&body.session_id, &body.display_name, &body.neighborhood)
        .await?;
    Ok(Json(entry))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Json(body): Json<WithdrawRequest>,
) -> Result<StatusCode, ApiError> {
    let registry = PresenceRegistry::new(state.db.clone(), state.event_bus.clone());
    registry.withdraw(&body.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
