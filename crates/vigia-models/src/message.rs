use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat message. Immutable once created; there is no edit or
/// delete path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_name: String,
    pub sender_neighborhood: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
