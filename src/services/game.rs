//! Voting engine — the per-room round state machine and vote tallying.
//!
//! DESIGN
//! ======
//! `setup → items_submitted → voting ⇄ revealing → voting (repeat/next)
//! → ... → completed`. Engine functions mutate room state through the store's
//! lock and return the `GameEvent` describing the change; route handlers own
//! broadcasting. The engine never talks to the network layer.
//!
//! Guards key off the data (items present, votes present, membership), not
//! off the status enum, so a legal operation is one whose inputs exist.

use serde::Serialize;
use tracing::info;

use crate::error::ApiError;
use crate::event::GameEvent;
use crate::services::room::{PlayerEntry, player_entries, validate_player};
use crate::state::{AppState, Room, RoomStatus, RoundRecord};

/// The fixed estimation scale offered for every round.
pub const VOTING_SCALE: [u32; 7] = [1, 2, 3, 5, 8, 13, 21];

// =============================================================================
// TYPES
// =============================================================================

/// Pure read of the round in progress, for push updates and poll fallback.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatus {
    pub vote_count: usize,
    pub total_players: usize,
    pub voted_players: Vec<String>,
    pub all_players: Vec<PlayerEntry>,
}

/// Result of tallying one round.
#[derive(Debug, Clone)]
struct Tally {
    counts: std::collections::HashMap<String, u32>,
    average: f64,
    total_votes: usize,
    voters: Vec<String>,
}

// =============================================================================
// ROUND LIFECYCLE
// =============================================================================

/// Open the first voting round.
///
/// # Errors
///
/// Returns `BadRequest` if the room has no items, `NotFound` for an unknown
/// room.
pub async fn start_voting(state: &AppState, room_id: u32) -> Result<GameEvent, ApiError> {
    let mut rooms = state.rooms.write().await;
    let room = get_mut(&mut rooms, room_id)?;

    if room.items.is_empty() {
        return Err(ApiError::BadRequest("No items to vote on".into()));
    }

    room.votes.clear();
    room.status = RoomStatus::Voting;

    info!(%room_id, item = room.current_item().unwrap_or_default(), "voting started");
    Ok(round_start_event(room))
}

/// Record or overwrite one player's vote for the current round. Any non-empty
/// string is accepted; the tally step decides what is numeric.
///
/// # Errors
///
/// Returns `BadRequest` for an empty name or vote, `Forbidden` for a name
/// not in the room, `NotFound` for an unknown room.
pub async fn vote(
    state: &AppState,
    room_id: u32,
    player_name: &str,
    vote_value: &str,
) -> Result<GameEvent, ApiError> {
    if player_name.is_empty() || vote_value.is_empty() {
        return Err(ApiError::BadRequest("Player name and vote are required".into()));
    }

    let mut rooms = state.rooms.write().await;
    let room = get_mut(&mut rooms, room_id)?;
    validate_player(room, player_name)?;

    room.votes.insert(player_name.to_owned(), vote_value.to_owned());

    info!(%room_id, player = player_name, votes = room.votes.len(), "vote recorded");
    Ok(vote_status_event(room))
}

/// True iff every member (participants plus admin) has voted this round.
pub async fn is_vote_complete(state: &AppState, room_id: u32) -> bool {
    let rooms = state.rooms.read().await;
    rooms
        .get(&room_id)
        .is_some_and(|room| room.votes.len() == room.player_count())
}

/// Tally the current round, append it to history, and show the cards.
///
/// # Errors
///
/// Returns `BadRequest` if no votes have been recorded, `NotFound` for an
/// unknown room.
pub async fn reveal_votes(state: &AppState, room_id: u32) -> Result<GameEvent, ApiError> {
    let mut rooms = state.rooms.write().await;
    let room = get_mut(&mut rooms, room_id)?;

    if room.votes.is_empty() {
        return Err(ApiError::BadRequest("No votes to reveal".into()));
    }

    let tally = tally_votes(&room.votes);
    let item = room.current_item().map(str::to_owned);
    if let Some(item) = &item {
        room.history.push(RoundRecord {
            item: item.clone(),
            votes: room.votes.clone(),
            counts: tally.counts.clone(),
            average: tally.average,
        });
    }
    room.status = RoomStatus::Revealing;
    let is_last_item = room.items.len() <= 1;

    info!(%room_id, average = tally.average, votes = tally.total_votes, "votes revealed");
    Ok(GameEvent::named("cards-revealed")
        .with_data("item", item)
        .with_data("votes", serde_json::to_value(&room.votes).unwrap_or_default())
        .with_data("counts", serde_json::to_value(&tally.counts).unwrap_or_default())
        .with_data("average", tally.average)
        .with_data("totalVotes", tally.total_votes)
        .with_data("voters", tally.voters)
        .with_data("isLastItem", is_last_item))
}

/// Re-run the round for the current item. Purges the item's history entry so
/// a repeat never leaves a stale duplicate average behind.
///
/// # Errors
///
/// Returns `BadRequest` if there is no current item, `NotFound` for an
/// unknown room.
pub async fn repeat_voting(state: &AppState, room_id: u32) -> Result<GameEvent, ApiError> {
    let mut rooms = state.rooms.write().await;
    let room = get_mut(&mut rooms, room_id)?;

    let Some(item) = room.current_item().map(str::to_owned) else {
        return Err(ApiError::BadRequest("No item to repeat".into()));
    };

    room.votes.clear();
    room.history.retain(|record| record.item != item);
    room.status = RoomStatus::Voting;

    info!(%room_id, %item, "round repeated");
    Ok(round_start_event(room))
}

/// Advance to the next backlog item and open its round.
///
/// # Errors
///
/// Returns `BadRequest` if fewer than two items remain, `NotFound` for an
/// unknown room.
pub async fn next_item(state: &AppState, room_id: u32) -> Result<GameEvent, ApiError> {
    let mut rooms = state.rooms.write().await;
    let room = get_mut(&mut rooms, room_id)?;

    if room.items.len() < 2 {
        return Err(ApiError::BadRequest("No more items to vote on".into()));
    }

    room.items.pop_front();
    room.votes.clear();
    room.status = RoomStatus::Voting;

    info!(%room_id, item = room.current_item().unwrap_or_default(), "advanced to next item");
    Ok(round_start_event(room))
}

/// Close the session: report every completed round and the overall mean.
/// The caller is expected to schedule room deletion after broadcasting.
///
/// # Errors
///
/// Returns `NotFound` for an unknown room.
pub async fn show_summary(state: &AppState, room_id: u32) -> Result<GameEvent, ApiError> {
    let mut rooms = state.rooms.write().await;
    let room = get_mut(&mut rooms, room_id)?;

    let total_tasks = room.history.len();
    let total_average = if total_tasks == 0 {
        0.0
    } else {
        let sum: f64 = room.history.iter().map(|record| record.average).sum();
        round2(sum / total_tasks as f64)
    };
    room.status = RoomStatus::Completed;

    info!(%room_id, total_average, total_tasks, "summary shown");
    Ok(GameEvent::named("show-summary")
        .with_data("history", serde_json::to_value(&room.history).unwrap_or_default())
        .with_data("totalAverage", total_average)
        .with_data("totalTasks", total_tasks))
}

/// Pure read of the round in progress.
///
/// # Errors
///
/// Returns `NotFound` for an unknown room.
pub async fn vote_status(state: &AppState, room_id: u32) -> Result<VoteStatus, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&room_id)
        .ok_or_else(|| ApiError::NotFound("Room not found".into()))?;
    Ok(vote_status_of(room))
}

// =============================================================================
// TALLYING
// =============================================================================

/// Histogram every raw vote string, average the ones that parse as numbers.
/// Non-numeric votes (a "?" card) stay in the histogram and the total count
/// but never skew the average.
fn tally_votes(votes: &std::collections::HashMap<String, String>) -> Tally {
    let mut counts = std::collections::HashMap::new();
    let mut numeric_sum = 0.0;
    let mut numeric_count = 0u32;

    for value in votes.values() {
        *counts.entry(value.clone()).or_insert(0u32) += 1;
        if let Ok(parsed) = value.trim().parse::<f64>() {
            numeric_sum += parsed;
            numeric_count += 1;
        }
    }

    let average = if numeric_count == 0 {
        0.0
    } else {
        round2(numeric_sum / f64::from(numeric_count))
    };

    Tally {
        counts,
        average,
        total_votes: votes.len(),
        voters: votes.keys().cloned().collect(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// HELPERS
// =============================================================================

fn get_mut(
    rooms: &mut std::collections::HashMap<u32, Room>,
    room_id: u32,
) -> Result<&mut Room, ApiError> {
    rooms
        .get_mut(&room_id)
        .ok_or_else(|| ApiError::NotFound("Room not found".into()))
}

/// The event that opens (or reopens) a round: the item on the table, the
/// scale, and who is at the table.
fn round_start_event(room: &Room) -> GameEvent {
    GameEvent::named("reveal-item")
        .with_data("item", room.current_item().unwrap_or_default())
        .with_data("scale", VOTING_SCALE.to_vec())
        .with_data("totalPlayers", room.player_count())
        .with_data(
            "players",
            serde_json::to_value(player_entries(room)).unwrap_or_default(),
        )
}

fn vote_status_event(room: &Room) -> GameEvent {
    let status = vote_status_of(room);
    GameEvent::named("vote-status-update")
        .with_data("voteCount", status.vote_count)
        .with_data("totalPlayers", status.total_players)
        .with_data("votedPlayers", status.voted_players)
        .with_data(
            "allPlayers",
            serde_json::to_value(status.all_players).unwrap_or_default(),
        )
}

fn vote_status_of(room: &Room) -> VoteStatus {
    VoteStatus {
        vote_count: room.votes.len(),
        total_players: room.player_count(),
        voted_players: room.votes.keys().cloned().collect(),
        all_players: player_entries(room),
    }
}

#[cfg(test)]
#[path = "game_test.rs"]
mod tests;
