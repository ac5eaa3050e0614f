use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use vigia_core::feed::MessageFeed;
use vigia_core::AppState;
use vigia_models::Message;

use crate::error::ApiError;

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub sender_name: String,
    pub sender_neighborhood: String,
    pub content: String,
}

/// The bounded recent window, oldest first. `limit` is capped at the
/// configured window size; there is no pagination further back.
pub async fn recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(state.chat.recent_limit)
        .clamp(1, state.chat.recent_limit);
    let feed = MessageFeed::new(state.db.clone(), state.event_bus.clone());
    Ok(Json(feed.load_recent(limit).await?))
}

pub async fn send(
    State(state): State<AppState>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let feed = MessageFeed::new(state.db.clone(), state.event_bus.clone());
    let message = feed
        .send(&body.sender_name, &body.sender_neighborhood, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
