use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use vigia_core::AppState;

pub mod error;
pub mod routes;

pub fn build_router() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health", get(health))
        // Entry screen data
        .route("/api/neighborhoods", get(routes::neighborhoods::list))
        // Message feed
        .route(
            "/api/messages",
            get(routes::messages::recent).post(routes::messages::send),
        )
        // Presence
        .route("/api/online", get(routes::presence::roster))
        .route(
            "/api/presence/announce",
            post(routes::presence::announce),
        )
        .route(
            "/api/presence/withdraw",
            post(routes::presence::withdraw),
        )
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health() -> StatusCode {
    StatusCode::OK
}
