use crate::{datetime_from_db_text, datetime_to_db_text, DbError, DbPool};
use chrono::{DateTime, Utc};
use sqlx::Row;
use vigia_models::Message;

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub sender_name: String,
    pub sender_neighborhood: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::any::AnyRow> for MessageRow {
    fn from_row(row: &'r sqlx::any::AnyRow) -> Result<Self, sqlx::Error> {
        let created_at_raw: String = row.try_get("created_at")?;
        Ok(Self {
            id: row.try_get("id")?,
            sender_name: row.try_get("sender_name")?,
            sender_neighborhood: row.try_get("sender_neighborhood")?,
            content: row.try_get("content")?,
            created_at: datetime_from_db_text(&created_at_raw)?,
        })
    }
}

impl MessageRow {
    pub fn into_model(self) -> Message {
        Message {
            id: self.id,
            sender_name: self.sender_name,
            sender_neighborhood: self.sender_neighborhood,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

pub async fn create_message(
    pool: &DbPool,
    id: i64,
    sender_name: &str,
    sender_neighborhood: &str,
    content: &str,
    created_at: DateTime<Utc>,
) -> Result<MessageRow, DbError> {
    let row = sqlx::query_as::<_, MessageRow>(
        "INSERT INTO messages (id, sender_name, sender_neighborhood, content, created_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, sender_name, sender_neighborhood, content, created_at",
    )
    .bind(id)
    .bind(sender_name)
    .bind(sender_neighborhood)
    .bind(content)
    .bind(datetime_to_db_text(created_at))
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// The most recent messages, newest first. Callers wanting chronological
/// order reverse the result.
pub async fn list_recent(pool: &DbPool, limit: i64) -> Result<Vec<MessageRow>, DbError> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT id, sender_name, sender_neighborhood, content, created_at
         FROM messages ORDER BY id DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn count_messages(pool: &DbPool) -> Result<i64, DbError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
