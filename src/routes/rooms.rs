//! Room lifecycle and membership endpoints.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, Path, Query, State};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::event::GameEvent;
use crate::routes::gate;
use crate::services::{broadcast, room};
use crate::state::{AppState, RoomStatus};

// =============================================================================
// BODIES
// =============================================================================

#[derive(Deserialize)]
pub struct CreateBody {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    pub room_id: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub room_id: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateBody {
    pub status: RoomStatus,
    pub current_item: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub success: bool,
    pub is_admin: bool,
    pub name: String,
    pub room_state: RoomStateBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IsAdminResponse {
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct ItemsResponse {
    pub items: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ParticipantsResponse {
    pub participants: Vec<room::PlayerEntry>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /create` — open a room; the caller becomes its admin.
pub async fn create(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<CreateBody>,
) -> Result<Json<CreateResponse>, ApiError> {
    let name = body.name.unwrap_or_default();
    let room_id = room::create_room(&state, &name, addr.ip()).await?;
    Ok(Json(CreateResponse { room_id }))
}

/// `POST /join` — join (or rejoin) a room. Broadcasts `user-joined` so every
/// connected client refreshes its roster before the caller gets its response.
pub async fn join(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<JoinBody>,
) -> Result<Json<JoinResponse>, ApiError> {
    let name = body.name.unwrap_or_default();
    let room_id = gate::room_id_from_value(body.room_id.as_ref())?;

    let outcome = room::join_room(&state, room_id, &name, addr.ip()).await?;

    let players = room::participants(&state, room_id).await?;
    let event = GameEvent::named("user-joined")
        .with_data("name", outcome.name.clone())
        .with_data("isAdmin", outcome.is_admin)
        .with_data("totalPlayers", players.len())
        .with_data("players", serde_json::to_value(players).unwrap_or_default());
    broadcast::broadcast(&state, room_id, &event).await;

    Ok(Json(JoinResponse {
        success: true,
        is_admin: outcome.is_admin,
        name: outcome.name,
        room_state: RoomStateBody { status: outcome.status, current_item: outcome.current_item },
    }))
}

/// `GET /is-admin?roomId=` — whether the caller's address owns the room.
pub async fn is_admin(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<IsAdminResponse>, ApiError> {
    let raw = params
        .get("roomId")
        .ok_or_else(|| ApiError::BadRequest("Room id is required".into()))?;
    let room_id = gate::parse_room_id(raw)?;

    let is_admin = room::is_admin(&state, room_id, addr.ip()).await;
    Ok(Json(IsAdminResponse { is_admin }))
}

/// `GET /room/{roomId}/items` — the remaining backlog, current item first.
pub async fn get_items(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<ItemsResponse>, ApiError> {
    let room_id = gate::parse_room_id(&room_id)?;
    let items = room::get_items(&state, room_id).await?;
    Ok(Json(ItemsResponse { items }))
}

/// `POST /room/{roomId}/items` *(admin)* — replace the backlog wholesale.
/// The body must be `{"items": [string, ...]}`; anything else is a 400, not
/// a deserializer rejection, so the error body stays in contract shape.
pub async fn set_items(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(room_id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let room_id = gate::parse_room_id(&room_id)?;
    gate::require_admin(&state, room_id, addr.ip()).await?;

    let items = body
        .get("items")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| ApiError::BadRequest("Items must be a list of strings".into()))?
        .iter()
        .map(|value| {
            value
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| ApiError::BadRequest("Items must be a list of strings".into()))
        })
        .collect::<Result<Vec<String>, ApiError>>()?;

    room::set_items(&state, room_id, items).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// `GET /room/{roomId}/participants` — admin first, then join order.
pub async fn participants(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<ParticipantsResponse>, ApiError> {
    let room_id = gate::parse_room_id(&room_id)?;
    let participants = room::participants(&state, room_id).await?;
    Ok(Json(ParticipantsResponse { participants }))
}

/// `GET /room/{roomId}/status` — where the room stands.
pub async fn status(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<room::StatusSnapshot>, ApiError> {
    let room_id = gate::parse_room_id(&room_id)?;
    let snapshot = room::room_status(&state, room_id).await?;
    Ok(Json(snapshot))
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
