//! WebSocket handler — the transport half of the realtime layer.
//!
//! DESIGN
//! ======
//! On upgrade, the connection waits for its handshake: the first text frame,
//! `{roomId, role, payload: {name}}` (or, as a legacy fallback, a bare
//! room-id). Only then is the connection registered and addressable for
//! broadcast. The first handshake wins — later attempts on a tagged
//! connection are ignored, so a compromised client cannot re-spoof its
//! identity mid-session.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → `select!` loop over socket frames, outbound channel, heartbeat
//! 2. Handshake text frame → tag + register
//! 3. Outbound `Event` → forward; `Kick` → forward, close, exit
//! 4. A connection that misses a full heartbeat interval is presumed dead
//! 5. Exit → unregister

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use uuid::Uuid;

use crate::event::GameEvent;
use crate::routes::gate;
use crate::services::broadcast;
use crate::state::{AppState, ClientConn, Outbound};

/// A connection must answer a ping within one interval or is presumed dead.
const HEARTBEAT_SECS: u64 = 30;

/// Outbound channel depth per connection. A client this far behind gets
/// skipped by `try_send` rather than stalling the room.
const OUTBOUND_BUFFER: usize = 256;

// =============================================================================
// HANDSHAKE
// =============================================================================

/// Identity a client claims in its first message.
#[derive(Debug, PartialEq, Eq)]
struct Handshake {
    room_id: u32,
    role: String,
    name: String,
}

/// Parse `{roomId, role, payload: {name}}`, tolerating a bare room-id
/// (number or string) as the legacy handshake shape.
fn parse_handshake(text: &str) -> Option<Handshake> {
    let legacy = |room_id| Handshake { room_id, role: String::new(), name: String::new() };

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        return match &value {
            serde_json::Value::Object(map) => {
                let room_id = gate::room_id_from_value(map.get("roomId")).ok()?;
                let role = map
                    .get("role")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                let name = map
                    .get("payload")
                    .and_then(|payload| payload.get("name"))
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                Some(Handshake { room_id, role, name })
            }
            serde_json::Value::Number(_) | serde_json::Value::String(_) => {
                gate::room_id_from_value(Some(&value)).ok().map(legacy)
            }
            _ => None,
        };
    }

    // Not JSON at all: accept plain digits, reject everything else.
    gate::parse_room_id(text).ok().map(legacy)
}

/// Tag and register an untagged connection. First assignment wins; anything
/// after it is dropped on the floor.
async fn tag_connection(
    state: &AppState,
    client_id: Uuid,
    tagged: &mut bool,
    tx: &mpsc::Sender<Outbound>,
    text: &str,
) {
    if *tagged {
        warn!(%client_id, "ws: handshake after tagging ignored");
        return;
    }

    let Some(handshake) = parse_handshake(text) else {
        warn!(%client_id, "ws: invalid handshake");
        return;
    };

    broadcast::register(
        state,
        client_id,
        ClientConn {
            room_id: handshake.room_id,
            role: handshake.role,
            player_name: handshake.name,
            tx: tx.clone(),
        },
    )
    .await;
    *tagged = true;
}

// =============================================================================
// CONNECTION
// =============================================================================

/// `GET /ws` — upgrade to the realtime channel.
pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<Outbound>(OUTBOUND_BUFFER);
    let mut tagged = false;
    let mut alive = true;

    let mut heartbeat = tokio::time::interval(Duration::from_secs(crate::env_parse(
        "WS_HEARTBEAT_SECS",
        HEARTBEAT_SECS,
    )));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(%client_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        tag_connection(&state, client_id, &mut tagged, &tx, text.as_str()).await;
                    }
                    Message::Pong(_) => alive = true,
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(out) = rx.recv() => {
                match out {
                    Outbound::Event(event) => {
                        if send_event(&mut socket, &event).await.is_err() {
                            break;
                        }
                    }
                    Outbound::Kick(event) => {
                        let _ = send_event(&mut socket, &event).await;
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                if !alive {
                    warn!(%client_id, "ws: heartbeat missed, terminating");
                    break;
                }
                alive = false;
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    broadcast::unregister(&state, client_id).await;
    info!(%client_id, "ws: client disconnected");
}

async fn send_event(socket: &mut WebSocket, event: &GameEvent) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize event");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
