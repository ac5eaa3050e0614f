use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use vigia_models::{Message, PresenceEntry};

/// Logical store tables that emit change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Messages,
    OnlineUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A change notification for one row of one logical table.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub row: serde_json::Value,
}

/// Broadcast-based push channel for store change events.
///
/// Receivers for all tables share one channel; consumers filter on
/// `event.table`. Dropping a receiver is clean unsubscription.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: StoreEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    pub fn message_inserted(&self, message: &Message) {
        if let Ok(row) = serde_json::to_value(message) {
            self.publish(StoreEvent {
                table: Table::Messages,
                kind: ChangeKind::Insert,
                row,
            });
        }
    }

    /// Presence upserts are announced as updates; subscribers re-fetch
    /// the roster rather than distinguishing insert from refresh.
    pub fn presence_upserted(&self, entry: &PresenceEntry) {
        if let Ok(row) = serde_json::to_value(entry) {
            self.publish(StoreEvent {
                table: Table::OnlineUsers,
                kind: ChangeKind::Update,
                row,
            });
        }
    }

    pub fn presence_deleted(&self, session_id: &str) {
        self.publish(StoreEvent {
            table: Table::OnlineUsers,
            kind: ChangeKind::Delete,
            row: serde_json::json!({ "session_id": session_id }),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn publish_without_receivers_is_a_noop() {
        let bus = EventBus::default();
        bus.presence_deleted("s1");
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let message = Message {
            id: 1,
            sender_name: "Ana".into(),
            sender_neighborhood: "Centro".into(),
            content: "oi".into(),
            created_at: Utc::now(),
        };
        bus.message_inserted(&message);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.table, Table::Messages);
        assert_eq!(event.kind, ChangeKind::Insert);
        let decoded: Message = serde_json::from_value(event.row).unwrap();
        assert_eq!(decoded, message);
    }

    #[tokio::test]
    async fn dropped_receiver_gets_no_further_delivery() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        drop(rx);
        // Must not panic or error with no live receivers.
        bus.presence_deleted("gone");
    }
}
