use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use vigia_core::room::{ChatController, Profile, RoomState};
use vigia_core::AppState;
use vigia_models::gateway::{ClientFrame, ServerFrame};
use vigia_models::PresenceEntry;

use crate::JoinParams;

/// One gateway connection is one room session: the upgrade joins, socket
/// frames drive `send`, and any disconnect path leaves. The socket
/// teardown doubles as the best-effort withdraw signal; the staleness
/// sweep stays authoritative when it never arrives.
pub(crate) async fn handle_connection(socket: WebSocket, state: AppState, params: JoinParams) {
    let (mut sender, mut receiver) = socket.split();

    let mut controller =
        ChatController::new(state.db.clone(), state.event_bus.clone(), state.chat.clone());
    let profile = Profile {
        display_name: params.name,
        neighborhood: params.neighborhood,
    };
    if let Err(err) = controller.join(profile).await {
        tracing::debug!(error = %err, "gateway join rejected");
        let _ = send_frame(
            &mut sender,
            &ServerFrame::Error {
                message: err.to_string(),
            },
        )
        .await;
        let _ = sender.close().await;
        return;
    }

    let mut state_rx = match controller.state() {
        Ok(rx) => rx,
        Err(_) => return,
    };

    let ready = {
        let snapshot = state_rx.borrow_and_update().clone();
        ServerFrame::Ready {
            session_id: controller.session_id().to_string(),
            messages: snapshot.messages.clone(),
            online: roster_sorted(&snapshot),
        }
    };
    let mut sent_messages = match &ready {
        ServerFrame::Ready { messages, .. } => messages.len(),
        _ => 0,
    };
    let mut last_roster = match &ready {
        ServerFrame::Ready { online, .. } => online.clone(),
        _ => Vec::new(),
    };
    if send_frame(&mut sender, &ready).await.is_err() {
        let _ = controller.leave().await;
        return;
    }

    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state_rx.borrow_and_update().clone();
                // Messages are append-only within a session; push only
                // the tail that is new to this socket.
                for message in snapshot.messages.iter().skip(sent_messages) {
                    let frame = ServerFrame::MessageCreate {
                        message: message.clone(),
                    };
                    if send_frame(&mut sender, &frame).await.is_err() {
                        let _ = controller.leave().await;
                        return;
                    }
                }
                sent_messages = snapshot.messages.len();

                let roster = roster_sorted(&snapshot);
                if roster != last_roster {
                    let frame = ServerFrame::RosterUpdate {
                        online: roster.clone(),
                    };
                    if send_frame(&mut sender, &frame).await.is_err() {
                        let _ = controller.leave().await;
                        return;
                    }
                    last_roster = roster;
                }
            }
            frame = receiver.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Send { content }) => {
                                if let Err(err) = controller.send(&content).await {
                                    let frame = ServerFrame::Error {
                                        message: err.to_string(),
                                    };
                                    if send_frame(&mut sender, &frame).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Ok(ClientFrame::Leave) => break,
                            Err(err) => {
                                tracing::debug!(error = %err, "unrecognized gateway frame");
                                let frame = ServerFrame::Error {
                                    message: "unrecognized frame".to_string(),
                                };
                                if send_frame(&mut sender, &frame).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!(error = %err, "gateway socket error");
                        break;
                    }
                }
            }
        }
    }

    let _ = controller.leave().await;
}

async fn send_frame(
    sender: &mut SplitSink<WebSocket, WsMessage>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let payload = match serde_json::to_string(frame) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::error!(error = %err, "failed to encode gateway frame");
            return Ok(());
        }
    };
    sender.send(WsMessage::Text(payload.into())).await
}

fn roster_sorted(state: &RoomState) -> Vec<PresenceEntry> {
    let mut roster: Vec<PresenceEntry> = state.online.values().cloned().collect();
    roster.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    roster
}
