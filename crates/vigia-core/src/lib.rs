pub mod error;
pub mod events;
pub mod feed;
pub mod identity;
pub mod presence;
pub mod room;

use std::time::Duration;

use vigia_db::DbPool;

/// Room behavior knobs shared across surfaces. The defaults are the
/// production values; tests compress them.
#[derive(Clone, Debug)]
pub struct ChatSettings {
    /// How often a joined session re-announces its presence.
    pub heartbeat: Duration,
    /// How often a joined session sweeps stale presence rows.
    pub sweep: Duration,
    /// Age past which a presence row is considered stale.
    pub stale_after: Duration,
    /// Fallback full-roster refresh period.
    pub roster_refresh: Duration,
    /// Bounded initial message window.
    pub recent_limit: i64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(30),
            sweep: Duration::from_secs(30),
            stale_after: Duration::from_secs(60),
            roster_refresh: Duration::from_secs(10),
            recent_limit: 200,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub event_bus: events::EventBus,
    pub chat: ChatSettings,
}
