//! Broadcast layer — delivers room-scoped events to live connections.
//!
//! DESIGN
//! ======
//! The registry is a side-table keyed by connection id; the ws loop registers
//! a connection only once its handshake has tagged it with a room and name.
//! Delivery walks every live connection and filters by room — fine at the
//! connection counts this runs at; a room-indexed map is the known next step
//! if that ever changes.
//!
//! Sends are best-effort `try_send`: a client whose channel is full is
//! skipped rather than allowed to stall the whole room.

use tracing::{info, warn};
use uuid::Uuid;

use crate::event::GameEvent;
use crate::state::{AppState, ClientConn, Outbound};

/// Make a tagged connection addressable for broadcast.
pub async fn register(state: &AppState, client_id: Uuid, conn: ClientConn) {
    let mut clients = state.clients.write().await;
    info!(%client_id, room_id = conn.room_id, name = %conn.player_name, "connection registered");
    clients.insert(client_id, conn);
}

/// Drop a connection from the registry. No-op if it was never tagged.
pub async fn unregister(state: &AppState, client_id: Uuid) {
    let mut clients = state.clients.write().await;
    if clients.remove(&client_id).is_some() {
        info!(%client_id, "connection unregistered");
    }
}

/// Deliver an event to every live connection tagged with `room_id`.
/// Connections in other rooms are skipped silently.
pub async fn broadcast(state: &AppState, room_id: u32, event: &GameEvent) {
    let clients = state.clients.read().await;
    let mut delivered = 0usize;
    for conn in clients.values() {
        if conn.room_id != room_id {
            continue;
        }
        if conn.tx.try_send(Outbound::Event(event.clone())).is_ok() {
            delivered += 1;
        }
    }
    info!(%room_id, event = %event.event, delivered, "broadcast");
}

/// Send a terminal notice to the one connection matching `room_id` and
/// `player_name`, then have its socket torn down. Used by the ban flow so a
/// banned user's connection dies immediately instead of at its next request.
pub async fn disconnect_user(state: &AppState, room_id: u32, player_name: &str) {
    let clients = state.clients.read().await;
    let target = clients
        .values()
        .find(|conn| conn.room_id == room_id && conn.player_name == player_name);

    let Some(conn) = target else {
        warn!(%room_id, player_name, "disconnect requested for unknown connection");
        return;
    };

    let notice = GameEvent::named("banned-by-admin");
    let _ = conn.tx.try_send(Outbound::Kick(notice));
    info!(%room_id, player_name, "connection kicked");
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;
