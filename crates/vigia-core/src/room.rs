use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use vigia_db::DbPool;
use vigia_models::{Message, PresenceEntry};

use crate::error::CoreError;
use crate::events::{ChangeKind, EventBus, StoreEvent, Table};
use crate::feed::MessageFeed;
use crate::identity::SessionIdentity;
use crate::presence::PresenceRegistry;
use crate::ChatSettings;

/// Profile supplied by the entry screen.
#[derive(Debug, Clone)]
pub struct Profile {
    pub display_name: String,
    pub neighborhood: String,
}

/// Derived state of the single shared room.
///
/// `messages` is chronological oldest-first and append-only within a
/// session; `online` holds at most one entry per session id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomState {
    pub messages: Vec<Message>,
    pub online: HashMap<String, PresenceEntry>,
}

/// Discrete state transitions applied by the room's single intake loop.
/// All event sources (timers, push subscriptions) are merged here instead
/// of mutating shared state directly.
enum RoomEvent {
    MessageInserted(Message),
    RosterLoaded(Vec<PresenceEntry>),
}

struct ActiveSession {
    profile: Profile,
    session_id: String,
    state_rx: watch::Receiver<RoomState>,
    stop_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

/// Orchestrates presence, feed and identity into one room session.
///
/// Lifecycle: not joined → joined → left. `leave` releases every timer and
/// subscription the session started; no exit path skips that cleanup.
pub struct ChatController {
    presence: PresenceRegistry,
    feed: MessageFeed,
    identity: SessionIdentity,
    settings: ChatSettings,
    session: Option<ActiveSession>,
}

impl ChatController {
    pub fn new(db: DbPool, bus: EventBus, settings: ChatSettings) -> Self {
        Self {
            presence: PresenceRegistry::new(db.clone(), bus.clone()),
            feed: MessageFeed::new(db, bus),
            identity: SessionIdentity::new(),
            settings,
            session: None,
        }
    }

    pub fn session_id(&self) -> &str {
        self.identity.id()
    }

    pub fn is_joined(&self) -> bool {
        self.session.is_some()
    }

    /// Enter the room: announce presence, load the initial window and
    /// roster, then start the session's event sources (heartbeat, sweep,
    /// roster refresh, both push listeners).
    pub async fn join(&mut self, profile: Profile) -> Result<(), CoreError> {
        if self.session.is_some() {
            return Err(CoreError::AlreadyJoined);
        }
        let session_id = self.identity.id().to_string();

        // Subscribe before the initial load so an insert landing in
        // between is not lost; the apply step dedups anything that shows
        // up in both.
        let message_events = self.feed.subscribe();
        let presence_events = self.presence.subscribe();

        self.presence
            .announce(&session_id, &profile.display_name, &profile.neighborhood)
            .await?;
        let messages = self.feed.load_recent(self.settings.recent_limit).await?;
        let roster = self.presence.list().await?;

        let initial = RoomState {
            messages,
            online: roster
                .into_iter()
                .map(|entry| (entry.session_id.clone(), entry))
                .collect(),
        };
        let (state_tx, state_rx) = watch::channel(initial);
        let (intake_tx, intake_rx) = mpsc::channel(256);
        let (stop_tx, stop_rx) = watch::channel(false);

        let tasks = vec![
            tokio::spawn(apply_loop(intake_rx, state_tx)),
            tokio::spawn(heartbeat_loop(
                self.presence.clone(),
                session_id.clone(),
                profile.clone(),
                self.settings.heartbeat,
                stop_rx.clone(),
            )),
            tokio::spawn(sweep_loop(
                self.presence.clone(),
                self.settings.sweep,
                self.settings.stale_after,
                stop_rx.clone(),
            )),
            tokio::spawn(roster_refresh_loop(
                self.presence.clone(),
                intake_tx.clone(),
                self.settings.roster_refresh,
                stop_rx.clone(),
            )),
            tokio::spawn(message_listener(
                message_events,
                intake_tx.clone(),
                stop_rx.clone(),
            )),
            tokio::spawn(presence_listener(
                presence_events,
                self.presence.clone(),
                intake_tx,
                stop_rx,
            )),
        ];

        self.session = Some(ActiveSession {
            profile,
            session_id,
            state_rx,
            stop_tx,
            tasks,
        });
        Ok(())
    }

    /// Post a message as the joined profile.
    pub async fn send(&self, content: &str) -> Result<Message, CoreError> {
        let session = self.session.as_ref().ok_or(CoreError::NotJoined)?;
        self.feed
            .send(
                &session.profile.display_name,
                &session.profile.neighborhood,
                content,
            )
            .await
    }

    /// Leave the room: stop every timer and subscription, then withdraw
    /// presence best-effort. Idempotent; safe to call when not joined.
    pub async fn leave(&mut self) -> Result<(), CoreError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let _ = session.stop_tx.send(true);
        // Listener tasks drop their intake senders as they stop, which in
        // turn ends the apply task.
        for task in session.tasks {
            let _ = task.await;
        }
        if let Err(err) = self.presence.withdraw(&session.session_id).await {
            tracing::warn!(error = %err, "withdraw failed; the sweep will reclaim the row");
        }
        Ok(())
    }

    /// Watch handle over the room state; resolves on every applied change.
    pub fn state(&self) -> Result<watch::Receiver<RoomState>, CoreError> {
        Ok(self
            .session
            .as_ref()
            .ok_or(CoreError::NotJoined)?
            .state_rx
            .clone())
    }

    pub fn snapshot(&self) -> Result<RoomState, CoreError> {
        Ok(self
            .session
            .as_ref()
            .ok_or(CoreError::NotJoined)?
            .state_rx
            .borrow()
            .clone())
    }
}

/// The single update path: applies each incoming event atomically to the
/// room state. Ends when every event source has dropped its sender.
async fn apply_loop(mut intake: mpsc::Receiver<RoomEvent>, state: watch::Sender<RoomState>) {
    while let Some(event) = intake.recv().await {
        match event {
            RoomEvent::MessageInserted(message) => {
                state.send_modify(|room| {
                    // A pushed insert may already be in the initial load
                    // window; the message id is the dedup key.
                    if !room.messages.iter().any(|m| m.id == message.id) {
                        room.messages.push(message);
                    }
                });
            }
            RoomEvent::RosterLoaded(roster) => {
                state.send_modify(|room| {
                    room.online = roster
                        .into_iter()
                        .map(|entry| (entry.session_id.clone(), entry))
                        .collect();
                });
            }
        }
    }
}

async fn heartbeat_loop(
    presence: PresenceRegistry,
    session_id: String,
    profile: Profile,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // join already announced; skip immediate first tick
    loop {
        tokio::select! {
            res = stop.changed() => {
                if res.is_err() || *stop.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                if let Err(err) = presence
                    .announce(&session_id, &profile.display_name, &profile.neighborhood)
                    .await
                {
                    tracing::warn!(error = %err, "heartbeat announce failed; retrying next tick");
                }
            }
        }
    }
}

async fn sweep_loop(
    presence: PresenceRegistry,
    period: Duration,
    stale_after: Duration,
    mut stop: watch::Receiver<bool>,
) {
    // Unlike the heartbeat, the sweep also runs immediately on join to
    // clear rows left behind by sessions that never withdrew.
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            res = stop.changed() => {
                if res.is_err() || *stop.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                if let Err(err) = presence.sweep_stale(stale_after).await {
                    tracing::warn!(error = %err, "presence sweep failed; retrying next tick");
                }
            }
        }
    }
}

async fn roster_refresh_loop(
    presence: PresenceRegistry,
    intake: mpsc::Sender<RoomEvent>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // join already loaded the roster
    loop {
        tokio::select! {
            res = stop.changed() => {
                if res.is_err() || *stop.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                match presence.list().await {
                    Ok(roster) => {
                        if intake.send(RoomEvent::RosterLoaded(roster)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "roster refresh failed; retrying next tick");
                    }
                }
            }
        }
    }
}

async fn message_listener(
    mut events: broadcast::Receiver<StoreEvent>,
    intake: mpsc::Sender<RoomEvent>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            res = stop.changed() => {
                if res.is_err() || *stop.borrow() {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if event.table != Table::Messages || event.kind != ChangeKind::Insert {
                        continue;
                    }
                    match serde_json::from_value::<Message>(event.row) {
                        Ok(message) => {
                            if intake.send(RoomEvent::MessageInserted(message)).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            tracing::debug!(error = %err, "ignoring malformed message event");
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // The receiver is still usable after a lag; newer
                    // inserts keep flowing.
                    tracing::warn!(skipped, "message subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

async fn presence_listener(
    mut events: broadcast::Receiver<StoreEvent>,
    presence: PresenceRegistry,
    intake: mpsc::Sender<RoomEvent>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            res = stop.changed() => {
                if res.is_err() || *stop.borrow() {
                    break;
                }
            }
            event = events.recv() => {
                let refresh = match event {
                    Ok(event) => event.table == Table::OnlineUsers,
                    // After a lag the roster may be arbitrarily behind;
                    // a full re-list self-heals.
                    Err(broadcast::error::RecvError::Lagged(_)) => true,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if !refresh {
                    continue;
                }
                match presence.list().await {
                    Ok(roster) => {
                        if intake.send(RoomEvent::RosterLoaded(roster)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "roster re-fetch failed; next event retries");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::time::timeout;

    async fn test_env() -> (DbPool, EventBus) {
        let pool = vigia_db::create_pool("sqlite::memory:", 1).await.unwrap();
        vigia_db::run_migrations(&pool).await.unwrap();
        (pool, EventBus::default())
    }

    fn profile(name: &str, neighborhood: &str) -> Profile {
        Profile {
            display_name: name.to_string(),
            neighborhood: neighborhood.to_string(),
        }
    }

    async fn wait_until(
        rx: &mut watch::Receiver<RoomState>,
        cond: impl Fn(&RoomState) -> bool,
    ) -> RoomState {
        timeout(Duration::from_secs(5), async {
            loop {
                {
                    let state = rx.borrow_and_update();
                    if cond(&state) {
                        return state.clone();
                    }
                }
                rx.changed().await.expect("state channel closed");
            }
        })
        .await
        .expect("condition not reached in time")
    }

    #[tokio::test]
    async fn join_loads_recent_window_and_roster() {
        let (pool, bus) = test_env().await;
        let feed = MessageFeed::new(pool.clone(), bus.clone());
        feed.send("Ana", "Centro", "primeira").await.unwrap();
        feed.send("Ana", "Centro", "segunda").await.unwrap();

        let mut controller = ChatController::new(pool, bus, ChatSettings::default());
        controller.join(profile("Bia", "Benfica")).await.unwrap();

        let state = controller.snapshot().unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].content, "primeira");
        assert!(state.online.contains_key(controller.session_id()));

        controller.leave().await.unwrap();
    }

    #[tokio::test]
    async fn send_requires_a_joined_session() {
        let (pool, bus) = test_env().await;
        let controller = ChatController::new(pool, bus, ChatSettings::default());
        assert!(matches!(
            controller.send("oi").await,
            Err(CoreError::NotJoined)
        ));
        assert!(controller.state().is_err());
    }

    #[tokio::test]
    async fn join_twice_is_rejected_and_leave_is_idempotent() {
        let (pool, bus) = test_env().await;
        let mut controller = ChatController::new(pool, bus, ChatSettings::default());
        controller.join(profile("Ana", "Centro")).await.unwrap();
        assert!(matches!(
            controller.join(profile("Ana", "Centro")).await,
            Err(CoreError::AlreadyJoined)
        ));
        controller.leave().await.unwrap();
        controller.leave().await.unwrap();
        assert!(!controller.is_joined());
    }

    #[tokio::test]
    async fn join_rejects_invalid_profile_without_leaking_tasks() {
        let (pool, bus) = test_env().await;
        let mut controller = ChatController::new(pool, bus, ChatSettings::default());
        assert!(controller.join(profile("  ", "Centro")).await.is_err());
        assert!(!controller.is_joined());
    }

    #[tokio::test]
    async fn own_send_appears_exactly_once() {
        let (pool, bus) = test_env().await;
        let mut controller = ChatController::new(pool, bus.clone(), ChatSettings::default());
        controller.join(profile("Ana", "Centro")).await.unwrap();

        let sent = controller.send("Ajuda no bairro").await.unwrap();
        let mut rx = controller.state().unwrap();
        wait_until(&mut rx, |state| {
            state.messages.iter().any(|m| m.id == sent.id)
        })
        .await;

        // Replaying the same insert must not duplicate it.
        bus.message_inserted(&sent);
        tokio::time::sleep(Duration::from_millis(100)).await;
        let state = controller.snapshot().unwrap();
        assert_eq!(
            state.messages.iter().filter(|m| m.id == sent.id).count(),
            1
        );

        controller.leave().await.unwrap();
    }

    #[tokio::test]
    async fn insert_already_in_the_loaded_window_is_deduplicated() {
        let (pool, bus) = test_env().await;
        let feed = MessageFeed::new(pool.clone(), bus.clone());
        let preloaded = feed.send("Ana", "Centro", "antes do join").await.unwrap();

        let mut controller = ChatController::new(pool, bus.clone(), ChatSettings::default());
        controller.join(profile("Bia", "Benfica")).await.unwrap();

        // Simulate the push channel racing ahead of the load snapshot.
        bus.message_inserted(&preloaded);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = controller.snapshot().unwrap();
        assert_eq!(
            state
                .messages
                .iter()
                .filter(|m| m.id == preloaded.id)
                .count(),
            1
        );

        controller.leave().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_senders_are_observed_exactly_once_each() {
        let (pool, bus) = test_env().await;
        let mut ana = ChatController::new(pool.clone(), bus.clone(), ChatSettings::default());
        let mut bia = ChatController::new(pool, bus, ChatSettings::default());
        ana.join(profile("Ana", "Centro")).await.unwrap();
        bia.join(profile("Bia", "Centro")).await.unwrap();

        let (from_ana, from_bia) = tokio::join!(
            ana.send("Ajuda no bairro"),
            bia.send("Preciso de água")
        );
        let from_ana = from_ana.unwrap();
        let from_bia = from_bia.unwrap();

        for controller in [&ana, &bia] {
            let mut rx = controller.state().unwrap();
            let state = wait_until(&mut rx, |state| {
                state.messages.iter().any(|m| m.id == from_ana.id)
                    && state.messages.iter().any(|m| m.id == from_bia.id)
            })
            .await;
            let ana_copy: Vec<_> = state
                .messages
                .iter()
                .filter(|m| m.id == from_ana.id)
                .collect();
            assert_eq!(ana_copy.len(), 1);
            assert_eq!(ana_copy[0].sender_name, "Ana");
            assert_eq!(
                state
                    .messages
                    .iter()
                    .filter(|m| m.id == from_bia.id)
                    .count(),
                1
            );
        }

        ana.leave().await.unwrap();
        bia.leave().await.unwrap();
    }

    #[tokio::test]
    async fn never_reannounced_session_is_swept_from_the_roster() {
        let (pool, bus) = test_env().await;
        let settings = ChatSettings {
            heartbeat: Duration::from_millis(50),
            sweep: Duration::from_millis(100),
            stale_after: Duration::from_millis(300),
            roster_refresh: Duration::from_millis(100),
            recent_limit: 200,
        };
        let mut controller = ChatController::new(pool.clone(), bus, settings);
        controller.join(profile("Ana", "Centro")).await.unwrap();

        // A session that announced once and then went silent.
        vigia_db::online_users::upsert(&pool, "ghost", "Cai", "Centro", Utc::now())
            .await
            .unwrap();

        let mut rx = controller.state().unwrap();
        wait_until(&mut rx, |state| state.online.contains_key("ghost")).await;
        // Past the staleness threshold the sweep removes it, while the
        // heartbeating session survives.
        let state = wait_until(&mut rx, |state| !state.online.contains_key("ghost")).await;
        assert!(state.online.contains_key(controller.session_id()));

        let remaining = vigia_db::online_users::list_all(&pool).await.unwrap();
        assert!(remaining.iter().all(|row| row.session_id != "ghost"));

        controller.leave().await.unwrap();
    }

    #[tokio::test]
    async fn leave_withdraws_and_is_visible_to_other_sessions() {
        let (pool, bus) = test_env().await;
        let mut ana = ChatController::new(pool.clone(), bus.clone(), ChatSettings::default());
        let mut bia = ChatController::new(pool.clone(), bus, ChatSettings::default());
        ana.join(profile("Ana", "Centro")).await.unwrap();
        let ana_id = ana.session_id().to_string();
        bia.join(profile("Bia", "Benfica")).await.unwrap();

        let mut rx = bia.state().unwrap();
        wait_until(&mut rx, |state| state.online.contains_key(&ana_id)).await;

        ana.leave().await.unwrap();
        wait_until(&mut rx, |state| !state.online.contains_key(&ana_id)).await;

        // The row is gone from the store, not just the local view.
        let rows = vigia_db::online_users::list_all(&pool).await.unwrap();
        assert!(rows.iter().all(|row| row.session_id != ana_id));

        bia.leave().await.unwrap();
    }
}
