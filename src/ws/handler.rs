//! Push-session connection handling.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::bus::EventScope;

use super::registry::PushBinding;
use super::types::ClientFrame;

/// Keepalive interval for protocol-level pings.
const PING_INTERVAL_SECS: u64 = 30;

/// GET /ws
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

async fn handle_session(socket: WebSocket, state: AppState) {
    let hub = state.hub.clone();
    let session_id = hub.registry().allocate();
    info!(session = session_id, "push session opened");

    let (mut sender, mut receiver) = socket.split();
    let mut events = hub.bus().subscribe();
    let mut ping = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
    ping.tick().await; // the first tick fires immediately

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(bus_event) => {
                        let Some(binding) = hub.registry().get(session_id) else {
                            // Unregistered sessions receive nothing.
                            continue;
                        };
                        if !wants(&binding, &bus_event.scope) {
                            continue;
                        }
                        let frame = match serde_json::to_string(&bus_event.event) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!(session = session_id, "failed to serialize event: {}", e);
                                continue;
                            }
                        };
                        if sender.send(WsMessage::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // At-most-once: the client catches up via history.
                        warn!(session = session_id, skipped, "push session lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            frame = receiver.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => handle_frame(&state, session_id, frame).await,
                            Err(e) => {
                                warn!(session = session_id, "unparseable frame: {} - {}", e, text);
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {
                        debug!(session = session_id, "keepalive frame");
                    }
                    Some(Ok(WsMessage::Binary(_))) => {
                        debug!(session = session_id, "ignoring binary frame");
                    }
                    Some(Err(e)) => {
                        warn!(session = session_id, "push session IO error: {}", e);
                        break;
                    }
                }
            }

            _ = ping.tick() => {
                if sender.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Bounded-time cleanup: drop the binding, keep room membership.
    hub.release_push(session_id).await;
    info!(session = session_id, "push session closed");
}

async fn handle_frame(state: &AppState, session_id: u64, frame: ClientFrame) {
    let hub = &state.hub;
    match frame {
        ClientFrame::Register(reg) => {
            hub.bind_push(session_id, &reg.agent_id, &reg.room).await;
        }
        ClientFrame::Message(echo) => {
            let Some(binding) = hub.registry().get(session_id) else {
                warn!(session = session_id, "message frame before register, dropped");
                return;
            };
            let room = echo.room.unwrap_or_else(|| binding.room.clone());
            let content = echo.content.unwrap_or_default();
            hub.echo_message(
                &binding.agent_id,
                &room,
                content,
                echo.metadata.unwrap_or_default(),
            )
            .await;
        }
    }
}

fn wants(binding: &PushBinding, scope: &EventScope) -> bool {
    match scope {
        EventScope::Room(room) => binding.room == *room,
        EventScope::Agent(agent_id) => binding.agent_id == *agent_id,
    }
}
