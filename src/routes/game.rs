//! Voting round endpoints.
//!
//! DESIGN
//! ======
//! Handlers translate HTTP to engine calls and own the outbound side: every
//! mutation's event is broadcast before the HTTP response returns, so no
//! caller can see its acknowledgment before the room has seen the change.
//! The one composite flow lives here too: a vote that completes the round
//! auto-reveals and carries the reveal event back in the response.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, Path, State};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::event::GameEvent;
use crate::routes::gate;
use crate::routes::rooms::SuccessResponse;
use crate::services::{broadcast, game, room};
use crate::state::AppState;

// =============================================================================
// BODIES
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteBody {
    #[serde(default)]
    pub vote: Option<String>,
    #[serde(default)]
    pub player_name: Option<String>,
}

#[derive(Deserialize)]
pub struct BanBody {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_event: Option<GameEvent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub success: bool,
    pub game_event: GameEvent,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub success: bool,
    pub item: Option<String>,
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /room/{roomId}/start` *(admin)* — open the first round.
pub async fn start(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(room_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let room_id = gate::parse_room_id(&room_id)?;
    gate::require_admin(&state, room_id, addr.ip()).await?;

    let event = game::start_voting(&state, room_id).await?;
    broadcast::broadcast(&state, room_id, &event).await;
    Ok(Json(SuccessResponse { success: true }))
}

/// `POST /room/{roomId}/vote` — cast (or change) a vote. When this vote is
/// the last one outstanding, the round auto-reveals and the reveal event
/// rides back in the response.
pub async fn vote(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<VoteBody>,
) -> Result<Json<VoteResponse>, ApiError> {
    let room_id = gate::parse_room_id(&room_id)?;
    let player_name = body.player_name.unwrap_or_default();
    let vote_value = body.vote.unwrap_or_default();

    let status_event = game::vote(&state, room_id, &player_name, &vote_value).await?;
    broadcast::broadcast(&state, room_id, &status_event).await;

    if game::is_vote_complete(&state, room_id).await {
        let reveal = game::reveal_votes(&state, room_id).await?;
        broadcast::broadcast(&state, room_id, &reveal).await;
        return Ok(Json(VoteResponse { success: true, game_event: Some(reveal) }));
    }

    Ok(Json(VoteResponse { success: true, game_event: None }))
}

/// `GET /room/{roomId}/vote-status` — poll fallback for the push update.
pub async fn vote_status(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<game::VoteStatus>, ApiError> {
    let room_id = gate::parse_room_id(&room_id)?;
    let status = game::vote_status(&state, room_id).await?;
    Ok(Json(status))
}

/// `POST /room/{roomId}/reveal` *(admin)* — tally and show the cards.
pub async fn reveal(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(room_id): Path<String>,
) -> Result<Json<EventResponse>, ApiError> {
    let room_id = gate::parse_room_id(&room_id)?;
    gate::require_admin(&state, room_id, addr.ip()).await?;

    let event = game::reveal_votes(&state, room_id).await?;
    broadcast::broadcast(&state, room_id, &event).await;
    Ok(Json(EventResponse { success: true, game_event: event }))
}

/// `POST /room/{roomId}/repeat` *(admin)* — re-run the current item's round.
pub async fn repeat(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(room_id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let room_id = gate::parse_room_id(&room_id)?;
    gate::require_admin(&state, room_id, addr.ip()).await?;

    let event = game::repeat_voting(&state, room_id).await?;
    broadcast::broadcast(&state, room_id, &event).await;
    Ok(Json(ItemResponse { success: true, item: event_item(&event) }))
}

/// `POST /room/{roomId}/next` *(admin)* — advance to the next backlog item.
pub async fn next(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(room_id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let room_id = gate::parse_room_id(&room_id)?;
    gate::require_admin(&state, room_id, addr.ip()).await?;

    let event = game::next_item(&state, room_id).await?;
    broadcast::broadcast(&state, room_id, &event).await;
    Ok(Json(ItemResponse { success: true, item: event_item(&event) }))
}

/// `POST /room/{roomId}/summary` *(admin)* — close the session. The room is
/// deleted after a grace delay so slow clients still receive the summary.
pub async fn summary(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(room_id): Path<String>,
) -> Result<Json<EventResponse>, ApiError> {
    let room_id = gate::parse_room_id(&room_id)?;
    gate::require_admin(&state, room_id, addr.ip()).await?;

    let event = game::show_summary(&state, room_id).await?;
    broadcast::broadcast(&state, room_id, &event).await;
    let _deletion = room::schedule_delete(&state, room_id);
    Ok(Json(EventResponse { success: true, game_event: event }))
}

/// `POST /room/{roomId}/ban` *(admin)* — eject a participant. Their socket
/// is torn down immediately; the rest of the room learns via `user-banned`.
pub async fn ban(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(room_id): Path<String>,
    Json(body): Json<BanBody>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let room_id = gate::parse_room_id(&room_id)?;
    gate::require_admin(&state, room_id, addr.ip()).await?;

    let name = body.name.unwrap_or_default();
    let banned = room::ban_user(&state, room_id, &name).await?;

    broadcast::disconnect_user(&state, room_id, &banned.name).await;

    let players = room::participants(&state, room_id).await?;
    let event = GameEvent::named("user-banned")
        .with_data("name", banned.name)
        .with_data("totalPlayers", players.len())
        .with_data("players", serde_json::to_value(players).unwrap_or_default());
    broadcast::broadcast(&state, room_id, &event).await;

    Ok(Json(SuccessResponse { success: true }))
}

fn event_item(event: &GameEvent) -> Option<String> {
    event
        .get("item")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
}

#[cfg(test)]
#[path = "game_routes_test.rs"]
mod tests;
