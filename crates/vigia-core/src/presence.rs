use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use vigia_db::{online_users, DbPool};
use vigia_models::PresenceEntry;
use vigia_util::validation;

use crate::error::CoreError;
use crate::events::{EventBus, StoreEvent};

/// Keeps "I am online" rows fresh and exposes the current roster.
///
/// Correctness here is deliberately approximate: without a reliable
/// disconnect signal, the heartbeat plus the sweep bound staleness instead
/// of eliminating it.
#[derive(Clone)]
pub struct PresenceRegistry {
    db: DbPool,
    bus: EventBus,
}

impl PresenceRegistry {
    pub fn new(db: DbPool, bus: EventBus) -> Self {
        Self { db, bus }
    }

    /// Upsert keyed by session id with `last_seen = now`. Idempotent:
    /// called on join and on every heartbeat tick.
    pub async fn announce(
        &self,
        session_id: &str,
        display_name: &str,
        neighborhood: &str,
    ) -> Result<PresenceEntry, CoreError> {
        validation::validate_display_name(display_name)?;
        validation::validate_neighborhood(neighborhood)?;
        let entry = PresenceEntry {
            session_id: session_id.to_string(),
            display_name: display_name.trim().to_string(),
            neighborhood: neighborhood.trim().to_string(),
            last_seen: Utc::now(),
        };
        online_users::upsert(
            &self.db,
            &entry.session_id,
            &entry.display_name,
            &entry.neighborhood,
            entry.last_seen,
        )
        .await?;
        self.bus.presence_upserted(&entry);
        Ok(entry)
    }

    /// Delete the row for a session. Call sites treat this as best-effort;
    /// the sweep remains the authoritative cleanup.
    pub async fn withdraw(&self, session_id: &str) -> Result<(), CoreError> {
        if online_users::delete_by_session(&self.db, session_id).await? {
            self.bus.presence_deleted(session_id);
        }
        Ok(())
    }

    /// Delete every row whose `last_seen` is older than `now - threshold`,
    /// returning how many were swept. Every connected client runs this on
    /// a timer; concurrent sweeps are safe because deleting an
    /// already-deleted row is a no-op.
    pub async fn sweep_stale(&self, threshold: Duration) -> Result<usize, CoreError> {
        let cutoff = Utc::now() - chrono::Duration::milliseconds(threshold.as_millis() as i64);
        let swept = online_users::delete_stale(&self.db, cutoff).await?;
        for session_id in &swept {
            self.bus.presence_deleted(session_id);
        }
        if !swept.is_empty() {
            tracing::debug!(count = swept.len(), "swept stale presence rows");
        }
        Ok(swept.len())
    }

    /// Full roster snapshot, ordered by display name.
    pub async fn list(&self) -> Result<Vec<PresenceEntry>, CoreError> {
        let rows = online_users::list_all(&self.db).await?;
        Ok(rows.into_iter().map(|row| row.into_model()).collect())
    }

    /// Change stream for presence rows. Events for other tables are
    /// interleaved; consumers filter on `event.table`. Dropping the
    /// receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.bus.subscribe()
    }
}
