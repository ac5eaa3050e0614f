use chrono::Utc;
use tokio::sync::broadcast;
use vigia_db::{messages, DbPool};
use vigia_models::Message;
use vigia_util::{snowflake, validation};

use crate::error::CoreError;
use crate::events::{EventBus, StoreEvent};

/// Maintains and extends the append-only message log. Writers never block
/// readers: every write is an independent immutable insert.
#[derive(Clone)]
pub struct MessageFeed {
    db: DbPool,
    bus: EventBus,
}

impl MessageFeed {
    pub fn new(db: DbPool, bus: EventBus) -> Self {
        Self { db, bus }
    }

    /// The bounded initial window: up to `limit` messages, oldest first.
    /// There is no pagination further back.
    pub async fn load_recent(&self, limit: i64) -> Result<Vec<Message>, CoreError> {
        let mut rows = messages::list_recent(&self.db, limit).await?;
        // Storage returns newest-first.
        rows.reverse();
        Ok(rows.into_iter().map(|row| row.into_model()).collect())
    }

    /// Validate, truncate to the storage cap and append an immutable row,
    /// then notify subscribers. Failures surface to the caller; the feed
    /// never retries on its own.
    pub async fn send(
        &self,
        sender_name: &str,
        sender_neighborhood: &str,
        content: &str,
    ) -> Result<Message, CoreError> {
        validation::validate_display_name(sender_name)?;
        validation::validate_neighborhood(sender_neighborhood)?;
        validation::validate_message_content(content)?;
        let content = validation::truncate_content(content.trim());

        let id = snowflake::generate(1);
        let row = messages::create_message(
            &self.db,
            id,
            sender_name.trim(),
            sender_neighborhood.trim(),
            content,
            Utc::now(),
        )
        .await?;
        let message = row.into_model();
        self.bus.message_inserted(&message);
        Ok(message)
    }

    /// Change stream carrying every newly inserted message, room-wide.
    /// Events for other tables are interleaved; consumers filter on
    /// `event.table`. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.bus.subscribe()
    }
}
