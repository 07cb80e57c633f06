//! Room store — the single source of truth mapping room id → `Room`.
//!
//! DESIGN
//! ======
//! Every operation acquires the rooms lock once and runs to completion
//! without awaiting while the guard is held, so two requests touching the
//! same room never interleave mid-mutation. No other module reaches into
//! `state.rooms` directly.
//!
//! Identity is the caller's IP address: the admin is whoever created the
//! room, and a participant rejoining from the same address is recognized
//! regardless of the ephemeral port.

use std::net::IpAddr;

use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::error::ApiError;
use crate::state::{AppState, Participant, Room, RoomStatus};

/// Longest item text accepted into room state.
const MAX_ITEM_LEN: usize = 100;

// =============================================================================
// TYPES
// =============================================================================

/// One row of the participant listing. Admin first, then join order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    pub name: String,
    pub is_admin: bool,
}

/// What a successful join tells the caller about itself and the room.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub is_admin: bool,
    /// The name the caller is actually known by (an admin rejoin keeps the
    /// original admin name regardless of what was submitted).
    pub name: String,
    pub rejoin: bool,
    pub status: RoomStatus,
    pub current_item: Option<String>,
}

/// Pure read used by the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub status: RoomStatus,
    pub current_item: Option<String>,
    pub remaining_items: usize,
    pub vote_count: usize,
    pub total_players: usize,
    pub completed_items: usize,
}

// =============================================================================
// CREATE / DELETE
// =============================================================================

/// Create a room owned by the caller and return its id.
///
/// # Errors
///
/// Returns `BadRequest` if the admin name is empty.
pub async fn create_room(state: &AppState, admin_name: &str, addr: IpAddr) -> Result<u32, ApiError> {
    if admin_name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name is required".into()));
    }

    let mut rooms = state.rooms.write().await;
    let room_id = loop {
        let candidate = rand::rng().random_range(100_000..=999_999);
        if !rooms.contains_key(&candidate) {
            break candidate;
        }
    };
    rooms.insert(room_id, Room::new(room_id, admin_name.to_owned(), addr));

    info!(%room_id, admin = admin_name, "room created");
    Ok(room_id)
}

/// Remove a room from the store.
///
/// # Errors
///
/// Returns `NotFound` if the room does not exist.
pub async fn delete_room(state: &AppState, room_id: u32) -> Result<(), ApiError> {
    let mut rooms = state.rooms.write().await;
    if rooms.remove(&room_id).is_none() {
        return Err(ApiError::NotFound("Room not found".into()));
    }
    info!(%room_id, "room deleted");
    Ok(())
}

/// Delete the room after the grace delay, so the summary broadcast can reach
/// slow clients before reads start failing. Returns the timer task; nothing
/// aborts it today, so a join landing mid-countdown still succeeds until the
/// timer fires.
pub fn schedule_delete(state: &AppState, room_id: u32) -> tokio::task::JoinHandle<()> {
    let state = state.clone();
    tokio::spawn(async move {
        tokio::time::sleep(state.delete_delay).await;
        if delete_room(&state, room_id).await.is_ok() {
            info!(%room_id, "room deleted after summary grace delay");
        }
    })
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

/// Whether `addr` is the admin of `room_id`. False, not an error, for an
/// unknown room.
pub async fn is_admin(state: &AppState, room_id: u32, addr: IpAddr) -> bool {
    let rooms = state.rooms.read().await;
    rooms.get(&room_id).is_some_and(|room| room.admin_addr == addr)
}

/// Join a room, or rejoin it if the address is already known.
///
/// # Errors
///
/// Returns `BadRequest` if the name is empty or already taken, `Forbidden`
/// if the address is banned, and `NotFound` for an unknown room.
pub async fn join_room(
    state: &AppState,
    room_id: u32,
    name: &str,
    addr: IpAddr,
) -> Result<JoinOutcome, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name is required".into()));
    }

    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&room_id)
        .ok_or_else(|| ApiError::NotFound("Room not found".into()))?;

    if room.banned_addrs.contains(&addr) {
        return Err(ApiError::Forbidden("You have been banned from this room".into()));
    }

    let snapshot = |room: &Room, is_admin: bool, name: String, rejoin: bool| JoinOutcome {
        is_admin,
        name,
        rejoin,
        status: room.status,
        current_item: room.current_item().map(str::to_owned),
    };

    // Admin rejoin keeps the original admin name, whatever was submitted.
    if addr == room.admin_addr {
        let name = room.admin_name.clone();
        info!(%room_id, %name, "admin rejoined room");
        return Ok(snapshot(room, true, name, true));
    }

    // Known address: rejoin, renaming in place if the client asked for a
    // different name and nobody else holds it.
    if let Some(index) = room.participants.iter().position(|p| p.addr == addr) {
        if room.participants[index].name != name {
            let taken = name == room.admin_name
                || room
                    .participants
                    .iter()
                    .enumerate()
                    .any(|(i, p)| i != index && p.name == name);
            if taken {
                return Err(ApiError::BadRequest("Username already taken".into()));
            }
            room.participants[index].name = name.to_owned();
        }
        let name = room.participants[index].name.clone();
        info!(%room_id, %name, "participant rejoined room");
        return Ok(snapshot(room, false, name, true));
    }

    // New participant. Names are unique, case-sensitive, admin included.
    if room.is_member(name) {
        return Err(ApiError::BadRequest("Username already taken".into()));
    }
    room.participants.push(Participant { name: name.to_owned(), addr });

    info!(%room_id, name, players = room.player_count(), "participant joined room");
    Ok(snapshot(room, false, name.to_owned(), false))
}

/// List the room's players, admin first, participants in join order.
///
/// # Errors
///
/// Returns `NotFound` for an unknown room.
pub async fn participants(state: &AppState, room_id: u32) -> Result<Vec<PlayerEntry>, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&room_id)
        .ok_or_else(|| ApiError::NotFound("Room not found".into()))?;
    Ok(player_entries(room))
}

/// Participant listing for a room already borrowed from the store.
#[must_use]
pub fn player_entries(room: &Room) -> Vec<PlayerEntry> {
    let mut players = Vec::with_capacity(room.player_count());
    players.push(PlayerEntry { name: room.admin_name.clone(), is_admin: true });
    players.extend(
        room.participants
            .iter()
            .map(|p| PlayerEntry { name: p.name.clone(), is_admin: false }),
    );
    players
}

/// Guard used before recording a vote.
///
/// # Errors
///
/// Returns `Forbidden` if `name` is neither the admin nor a participant.
pub fn validate_player(room: &Room, name: &str) -> Result<(), ApiError> {
    if room.is_member(name) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Player is not in this room".into()))
    }
}

/// Ban a participant: record their address and drop them from the roster.
/// Returns the removed participant.
///
/// # Errors
///
/// Returns `BadRequest` for an empty name or the admin's own name, and
/// `NotFound` for an unknown room or a name that is not a participant.
pub async fn ban_user(state: &AppState, room_id: u32, name: &str) -> Result<Participant, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name is required".into()));
    }

    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&room_id)
        .ok_or_else(|| ApiError::NotFound("Room not found".into()))?;

    if name == room.admin_name {
        return Err(ApiError::BadRequest("The admin cannot be banned".into()));
    }

    let index = room
        .participants
        .iter()
        .position(|p| p.name == name)
        .ok_or_else(|| ApiError::NotFound("Player not found in this room".into()))?;

    let banned = room.participants.remove(index);
    room.banned_addrs.insert(banned.addr);

    info!(%room_id, name = %banned.name, "participant banned");
    Ok(banned)
}

// =============================================================================
// ITEMS
// =============================================================================

/// Replace the room's backlog wholesale and advance to `items_submitted`.
/// Validation runs before any mutation, so a rejected list leaves the prior
/// items untouched.
///
/// # Errors
///
/// Returns `BadRequest` if any item fails the item-safety policy, and
/// `NotFound` for an unknown room.
pub async fn set_items(state: &AppState, room_id: u32, items: Vec<String>) -> Result<(), ApiError> {
    for item in &items {
        validate_item_text(item)?;
    }

    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&room_id)
        .ok_or_else(|| ApiError::NotFound("Room not found".into()))?;

    info!(%room_id, count = items.len(), "items submitted");
    room.items = items.into();
    room.status = RoomStatus::ItemsSubmitted;
    Ok(())
}

/// Item strings land in persisted room state and are later rendered by
/// presentation layers, so markup-significant characters are rejected here.
fn validate_item_text(item: &str) -> Result<(), ApiError> {
    if item.contains(['<', '>', '&']) {
        return Err(ApiError::BadRequest("Item text contains invalid characters".into()));
    }
    if item.chars().count() > MAX_ITEM_LEN {
        return Err(ApiError::BadRequest("Item text is too long".into()));
    }
    Ok(())
}

/// The room's remaining backlog, current item first.
///
/// # Errors
///
/// Returns `NotFound` for an unknown room.
pub async fn get_items(state: &AppState, room_id: u32) -> Result<Vec<String>, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&room_id)
        .ok_or_else(|| ApiError::NotFound("Room not found".into()))?;
    Ok(room.items.iter().cloned().collect())
}

/// Snapshot of where the room stands, for the status endpoint.
///
/// # Errors
///
/// Returns `NotFound` for an unknown room.
pub async fn room_status(state: &AppState, room_id: u32) -> Result<StatusSnapshot, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&room_id)
        .ok_or_else(|| ApiError::NotFound("Room not found".into()))?;

    Ok(StatusSnapshot {
        status: room.status,
        current_item: room.current_item().map(str::to_owned),
        remaining_items: room.items.len(),
        vote_count: room.votes.len(),
        total_players: room.player_count(),
        completed_items: room.history.len(),
    })
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
