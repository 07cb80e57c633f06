//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the room-lifecycle and voting endpoints plus the websocket upgrade
//! under a single Axum router. Presentation is someone else's problem — this
//! process only speaks the JSON/event contract.

pub mod game;
pub mod gate;
pub mod rooms;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/create", post(rooms::create))
        .route("/join", post(rooms::join))
        .route("/is-admin", get(rooms::is_admin))
        .route("/room/{room_id}/items", get(rooms::get_items).post(rooms::set_items))
        .route("/room/{room_id}/participants", get(rooms::participants))
        .route("/room/{room_id}/status", get(rooms::status))
        .route("/room/{room_id}/start", post(game::start))
        .route("/room/{room_id}/vote", post(game::vote))
        .route("/room/{room_id}/vote-status", get(game::vote_status))
        .route("/room/{room_id}/reveal", post(game::reveal))
        .route("/room/{room_id}/repeat", post(game::repeat))
        .route("/room/{room_id}/next", post(game::next))
        .route("/room/{room_id}/summary", post(game::summary))
        .route("/room/{room_id}/ban", post(game::ban))
        .route("/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
