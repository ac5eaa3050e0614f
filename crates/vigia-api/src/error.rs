use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Internal(err) => {
                tracing::error!("API internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message, "message": message }))).into_response()
    }
}

impl From<vigia_core::error::CoreError> for ApiError {
    fn from(e: vigia_core::error::CoreError) -> Self {
        match e {
            vigia_core::error::CoreError::Validation(err) => ApiError::BadRequest(err.to_string()),
            vigia_core::error::CoreError::NotJoined
            | vigia_core::error::CoreError::AlreadyJoined => ApiError::BadRequest(e.to_string()),
            vigia_core::error::CoreError::Database(_) => {
                ApiError::Internal(anyhow::anyhow!("database error"))
            }
            vigia_core::error::CoreError::Internal(msg) => ApiError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl From<vigia_db::DbError> for ApiError {
    fn from(e: vigia_db::DbError) -> Self {
        match e {
            vigia_db::DbError::NotFound => ApiError::NotFound,
            vigia_db::DbError::Sqlx(_) => ApiError::Internal(anyhow::anyhow!("database error")),
        }
    }
}
