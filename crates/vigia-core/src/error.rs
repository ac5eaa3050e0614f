use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(#[from] vigia_util::validation::ValidationError),
    #[error("database error: {0}")]
    Database(#[from] vigia_db::DbError),
    #[error("room session is not joined")]
    NotJoined,
    #[error("room session is already joined")]
    AlreadyJoined,
    #[error("internal error: {0}")]
    Internal(String),
}
