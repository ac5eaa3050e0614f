use crate::{datetime_from_db_text, datetime_to_db_text, DbError, DbPool};
use chrono::{DateTime, Utc};
use sqlx::Row;
use vigia_models::PresenceEntry;

#[derive(Debug, Clone)]
pub struct PresenceRow {
    pub session_id: String,
    pub display_name: String,
    pub neighborhood: String,
    pub last_seen: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::any::AnyRow> for PresenceRow {
    fn from_row(row: &'r sqlx::any::AnyRow) -> Result<Self, sqlx::Error> {
        let last_seen_raw: String = row.try_get("last_seen")?;
        Ok(Self {
            session_id: row.try_get("session_id")?,
            display_name: row.try_get("display_name")?,
            neighborhood: row.try_get("neighborhood")?,
            last_seen: datetime_from_db_text(&last_seen_raw)?,
        })
    }
}

impl PresenceRow {
    pub fn into_model(self) -> PresenceEntry {
        PresenceEntry {
            session_id: self.session_id,
            display_name: self.display_name,
            neighborhood: self.neighborhood,
            last_seen: self.last_seen,
        }
    }
}

/// Insert-or-refresh keyed by session id. A write with an existing key
/// replaces the row; it never duplicates.
pub async fn upsert(
    pool: &DbPool,
    session_id: &str,
    display_name: &str,
    neighborhood: &str,
    last_seen: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO online_users (session_id, display_name, neighborhood, last_seen)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (session_id) DO UPDATE SET
             display_name = excluded.display_name,
             neighborhood = excluded.neighborhood,
             last_seen = excluded.last_seen",
    )
    .bind(session_id)
    .bind(display_name)
    .bind(neighborhood)
    .bind(datetime_to_db_text(last_seen))
    .execute(pool)
    .await?;
    Ok(())
}

/// Remove one session's row. Returns whether a row existed.
pub async fn delete_by_session(pool: &DbPool, session_id: &str) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM online_users WHERE session_id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove every row older than the cutoff, returning the swept session
/// ids. Idempotent; concurrent sweeps from multiple clients are safe.
pub async fn delete_stale(pool: &DbPool, cutoff: DateTime<Utc>) -> Result<Vec<String>, DbError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "DELETE FROM online_users WHERE last_seen < $1 RETURNING session_id",
    )
    .bind(datetime_to_db_text(cutoff))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(session_id,)| session_id).collect())
}

pub async fn list_all(pool: &DbPool) -> Result<Vec<PresenceRow>, DbError> {
    let rows = sqlx::query_as::<_, PresenceRow>(
        "SELECT session_id, display_name, neighborhood, last_seen
         FROM online_users ORDER BY display_name ASC, session_id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
