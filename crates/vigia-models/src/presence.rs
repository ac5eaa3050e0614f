use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record asserting that a session is currently online.
///
/// `last_seen` is refreshed by the heartbeat; rows whose timestamp falls
/// behind the staleness threshold are removed by the sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub session_id: String,
    pub display_name: String,
    pub neighborhood: String,
    pub last_seen: DateTime<Utc>,
}
